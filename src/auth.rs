use actix_web::{web, HttpResponse};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::{new_id, Role, User, UserProfile};
use crate::store::StoreError;
use crate::validation::{LoginForm, RegisterForm};

pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
    pub redirect_to: String,
}

pub fn create_jwt(user_id: &str, role: Role, secret: &str, ttl_hours: i64) -> Result<String, ApiError> {
    let expiration = Utc::now() + Duration::hours(ttl_hours);
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        exp: expiration.timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
        .map_err(|e| ApiError::Internal(format!("Token encoding failed: {}", e)))
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

fn auth_response(user: &User, config: &crate::config::Config) -> Result<AuthResponse, ApiError> {
    Ok(AuthResponse {
        token: create_jwt(&user.id, user.role, &config.jwt_secret, config.jwt_ttl_hours)?,
        user: UserProfile::from(user),
        redirect_to: user.role.home_route().to_string(),
    })
}

/// POST /api/auth/register
pub async fn register(
    data: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    debug!("Register attempt for {}", payload.email);

    // 1) Same rules the client applies; report the first failure
    let form = RegisterForm {
        name: payload.name.clone(),
        email: payload.email.clone(),
        password: payload.password.clone(),
    };
    if let Some(msg) = form.errors().first() {
        return Err(ApiError::Validation(msg.to_string()));
    }

    // 2) Reject duplicates before spending time on the hash
    let email = payload.email.trim().to_lowercase();
    if data.store.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    // 3) Hash and insert
    let cost = data.config.bcrypt_cost;
    let password = payload.password;
    let password_hash = web::block(move || hash(password, cost))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(format!("Error hashing password: {}", e)))?;

    let now = Utc::now();
    let role = if data.config.is_admin_email(&email) {
        Role::Admin
    } else {
        Role::User
    };
    let user = User {
        id: new_id(),
        name: payload.name.trim().to_string(),
        email,
        password_hash,
        role,
        active: true,
        skills: Vec::new(),
        interests: Vec::new(),
        bio: None,
        avatar_url: None,
        created_at: now,
        updated_at: now,
        last_login_at: Some(now),
    };
    match data.store.insert_user(&user).await {
        Ok(()) => {}
        Err(StoreError::AlreadyExists) => {
            return Err(ApiError::Conflict("Email already registered".into()))
        }
        Err(e) => return Err(e.into()),
    }
    info!("User registered {} ({})", user.id, user.role.as_str());

    Ok(HttpResponse::Created().json(auth_response(&user, &data.config)?))
}

/// POST /api/auth/login
pub async fn login(
    data: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let form = LoginForm {
        email: payload.email.clone(),
        password: payload.password.clone(),
    };
    if let Some(msg) = form.errors().first() {
        return Err(ApiError::Validation(msg.to_string()));
    }

    let email = payload.email.trim().to_lowercase();
    let user = data
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.into()))?;

    let password = payload.password;
    let stored_hash = user.password_hash.clone();
    let matches = web::block(move || verify(password, &stored_hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .unwrap_or(false);
    if !matches {
        warn!("Failed login for {}", email);
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()));
    }
    if !user.active {
        return Err(ApiError::Forbidden("Account is deactivated".into()));
    }

    data.store.record_login(&user.id, Utc::now()).await?;
    info!("User logged in {}", user.id);

    Ok(HttpResponse::Ok().json(auth_response(&user, &data.config)?))
}

/// GET /api/auth/email/{email}
pub async fn email_exists(
    data: web::Data<AppState>,
    email: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let email = email.into_inner().trim().to_lowercase();
    let exists = data.store.find_user_by_email(&email).await?.is_some();
    Ok(HttpResponse::Ok().json(serde_json::json!({ "exists": exists })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_subject_and_role() {
        let token = create_jwt("u1", Role::Admin, "secret", 1).unwrap();
        let claims = validate_jwt(&token, "secret").unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let token = create_jwt("u1", Role::User, "secret", 1).unwrap();
        assert!(validate_jwt(&token, "other").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_jwt("u1", Role::User, "secret", -2).unwrap();
        assert!(validate_jwt(&token, "secret").is_err());
    }
}
