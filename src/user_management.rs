use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, info};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::middleware::current_user;
use crate::models::user::ProfileUpdate;
use crate::models::{UserProfile, UserSummary};
use crate::uploads::read_multipart;
use crate::validation::validate_name;

const SEARCH_LIMIT: u64 = 20;

#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    pub search: Option<String>,
    pub q: Option<String>,
}

impl UserSearchQuery {
    fn term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .or(self.q.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// GET /api/users/profile
pub async fn get_profile(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let user = data
        .store
        .find_user(&caller.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(HttpResponse::Ok().json(UserProfile::from(&user)))
}

/// PUT /api/users/profile
pub async fn update_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<ProfileUpdate>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let update = payload.into_inner();
    debug!("Profile update for {}: {:?}", caller.id, update);

    if update.is_empty() {
        return Err(ApiError::Validation("No fields to update".into()));
    }
    if let Some(name) = &update.name {
        validate_name(name).map_err(|m| ApiError::Validation(m.into()))?;
    }
    if let Some(skills) = &update.skills {
        if skills.iter().any(|s| s.name.trim().is_empty()) {
            return Err(ApiError::Validation("Skill name is required".into()));
        }
    }

    let user = data
        .store
        .update_profile(&caller.id, &update)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    info!("Profile updated {}", user.id);
    Ok(HttpResponse::Ok().json(UserProfile::from(&user)))
}

/// POST /api/users/profile/avatar
pub async fn upload_avatar(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let form = read_multipart(payload, &data.config).await?;

    let Some(file) = form.files_named("avatar").next() else {
        form.discard().await;
        return Err(ApiError::Validation("No avatar file provided".into()));
    };
    if !file.is_image() {
        form.discard().await;
        return Err(ApiError::Validation("Only image files are allowed".into()));
    }

    let user = match data.store.set_avatar(&caller.id, &file.attachment.url).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            form.discard().await;
            return Err(ApiError::not_found("User"));
        }
        Err(e) => {
            form.discard().await;
            return Err(e.into());
        }
    };
    info!("Avatar updated for {}", user.id);
    Ok(HttpResponse::Ok().json(UserProfile::from(&user)))
}

/// GET /api/users?search=
/// GET /api/users-search?q=
pub async fn search_users(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<UserSearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let Some(term) = query.term() else {
        return Ok(HttpResponse::Ok().json(Vec::<UserSummary>::new()));
    };
    let users = data
        .store
        .search_users(term, &caller.id, SEARCH_LIMIT)
        .await?;
    let summaries: Vec<UserSummary> = users
        .iter()
        .filter(|u| u.active)
        .map(UserSummary::from)
        .collect();
    Ok(HttpResponse::Ok().json(summaries))
}
