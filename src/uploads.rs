//! Multipart form reading. Files are streamed into `UPLOAD_DIR` and served
//! back under `/uploads/`.

use std::collections::HashMap;
use std::path::PathBuf;

use actix_multipart::{Field, Multipart};
use futures_util::TryStreamExt;
use log::{debug, warn};
use tokio::io::AsyncWriteExt;

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{new_id, Attachment};

const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

/// Extensions `/uploads` serves with an image content type.
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub path: PathBuf,
    pub attachment: Attachment,
}

impl UploadedFile {
    /// Both the declared type and the stored extension must say image.
    pub fn is_image(&self) -> bool {
        let extension = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        self.attachment.content_type.starts_with("image/")
            && extension.is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
    }
}

#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl MultipartForm {
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn files_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a UploadedFile> + 'a {
        self.files.iter().filter(move |f| f.field == name)
    }

    /// Remove everything written to disk, for requests that fail after upload.
    pub async fn discard(&self) {
        for file in &self.files {
            remove_quietly(&file.path).await;
        }
    }
}

fn multipart_error(e: actix_multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Invalid multipart body: {}", e))
}

async fn remove_quietly(path: &PathBuf) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Could not remove upload {}: {}", path.display(), e);
    }
}

/// Keeps the extension-bearing tail of a client filename safe for disk.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Streams one part into `out`; the caller owns cleanup on error.
async fn write_field(
    field: &mut Field,
    mut out: tokio::fs::File,
    filename: &str,
    max_bytes: usize,
) -> Result<usize, ApiError> {
    let mut size = 0usize;
    while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
        size += chunk.len();
        if size > max_bytes {
            return Err(ApiError::Validation(format!(
                "File {} exceeds the {} byte limit",
                filename, max_bytes
            )));
        }
        out.write_all(&chunk)
            .await
            .map_err(|e| ApiError::Internal(format!("Cannot store upload: {}", e)))?;
    }
    out.flush()
        .await
        .map_err(|e| ApiError::Internal(format!("Cannot store upload: {}", e)))?;
    Ok(size)
}

async fn save_file(
    field: &mut Field,
    name: String,
    filename: String,
    config: &Config,
) -> Result<UploadedFile, ApiError> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("Cannot create upload dir: {}", e)))?;

    let stored = format!("{}-{}", new_id(), sanitize_filename(&filename));
    let path = PathBuf::from(&config.upload_dir).join(&stored);
    let content_type = field
        .content_type()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let out = tokio::fs::File::create(&path)
        .await
        .map_err(|e| ApiError::Internal(format!("Cannot store upload: {}", e)))?;
    let size = match write_field(field, out, &filename, config.max_upload_bytes).await {
        Ok(size) => size,
        Err(e) => {
            remove_quietly(&path).await;
            return Err(e);
        }
    };
    debug!("Stored upload {} ({} bytes)", stored, size);

    Ok(UploadedFile {
        field: name,
        path,
        attachment: Attachment {
            filename,
            url: format!("/uploads/{}", stored),
            content_type,
            size: size as u64,
        },
    })
}

async fn read_text(field: &mut Field, name: &str) -> Result<String, ApiError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
        buf.extend_from_slice(&chunk);
        if buf.len() > MAX_TEXT_FIELD_BYTES {
            return Err(ApiError::Validation(format!("Field {} is too large", name)));
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Reads every part: named files go to disk, everything else is text.
pub async fn read_multipart(mut payload: Multipart, config: &Config) -> Result<MultipartForm, ApiError> {
    let mut form = MultipartForm::default();
    loop {
        let next = match payload.try_next().await {
            Ok(n) => n,
            Err(e) => {
                form.discard().await;
                return Err(multipart_error(e));
            }
        };
        let Some(mut field) = next else { break };
        let name = field.name().unwrap_or_default().to_string();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .filter(|f| !f.is_empty())
            .map(str::to_string);

        match filename {
            Some(filename) => match save_file(&mut field, name, filename, config).await {
                Ok(file) => form.files.push(file),
                Err(e) => {
                    form.discard().await;
                    return Err(e);
                }
            },
            None => match read_text(&mut field, &name).await {
                Ok(text) => {
                    form.fields.insert(name, text);
                }
                Err(e) => {
                    form.discard().await;
                    return Err(e);
                }
            },
        }
    }
    Ok(form)
}
