use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub store_backend: StoreBackend,
    pub mongo_uri: Option<String>,
    pub database_name: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub frontend_origin: String,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
    pub admin_emails: Vec<String>,
    pub ai_local_endpoint: Option<String>,
    pub ai_aws_endpoint: Option<String>,
    pub ai_use_local: bool,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let store_backend = match var_or("STORE_BACKEND", "mongo").to_lowercase().as_str() {
            "mongo" => StoreBackend::Mongo,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };
        let mongo_uri = non_empty("MONGO_URI");
        if store_backend == StoreBackend::Mongo && mongo_uri.is_none() {
            return Err(ConfigError::Missing("MONGO_URI"));
        }

        Ok(Self {
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8080"),
            store_backend,
            mongo_uri,
            database_name: var_or("DATABASE_NAME", "collabmate"),
            jwt_secret: non_empty("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            jwt_ttl_hours: parsed("JWT_TTL_HOURS", 24)?,
            bcrypt_cost: parsed("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            frontend_origin: var_or("FRONTEND_ORIGIN", "http://localhost:3000"),
            upload_dir: var_or("UPLOAD_DIR", "uploads"),
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            admin_emails: parse_email_list(&var_or("ADMIN_EMAILS", "")),
            ai_local_endpoint: non_empty("AI_LOCAL_ENDPOINT"),
            ai_aws_endpoint: non_empty("AI_AWS_ENDPOINT"),
            ai_use_local: parsed("AI_USE_LOCAL", true)?,
        })
    }

    /// The AI base URL to call, if one is configured for the selected target.
    pub fn ai_endpoint(&self) -> Option<&str> {
        if self.ai_use_local {
            self.ai_local_endpoint.as_deref()
        } else {
            self.ai_aws_endpoint.as_deref()
        }
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
