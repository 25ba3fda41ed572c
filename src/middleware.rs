use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http, web, Error, HttpMessage, HttpRequest, ResponseError,
};
use futures::future::{ok, Ready};
use log::debug;

use crate::app_state::AppState;
use crate::auth::validate_jwt;
use crate::error::ApiError;
use crate::models::Role;

/// Caller identity, inserted into request extensions by [`Authentication`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

const PUBLIC_PREFIXES: [&str; 4] = ["/api/auth/", "/api/health", "/ws", "/uploads/"];

fn is_public(path: &str) -> bool {
    PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Validates `Authorization: Bearer <jwt>` and resolves the caller against the
/// store, so deleted or deactivated accounts lose access immediately.
#[derive(Debug, Clone)]
pub struct Authentication {
    secret: Rc<str>,
}

impl Authentication {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Rc::from(secret),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware {
            service: Rc::new(service),
            secret: self.secret.clone(),
        })
    }
}

pub struct AuthMiddleware<S> {
    service: Rc<S>,
    secret: Rc<str>,
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    let header = req.headers().get(http::header::AUTHORIZATION)?;
    let value = header.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn reject(req: ServiceRequest, err: ApiError) -> ServiceResponse<BoxBody> {
    req.into_response(err.error_response())
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = Rc::clone(&self.secret);

        Box::pin(async move {
            // Public routes ignore the Authorization header entirely
            if req.method() == http::Method::OPTIONS || is_public(req.path()) {
                let res = service.call(req).await?;
                return Ok(res.map_into_boxed_body());
            }

            let token = match bearer_token(&req) {
                Some(t) => t,
                None => {
                    return Ok(reject(req, ApiError::Unauthorized("Authentication required".into())))
                }
            };

            let claims = match validate_jwt(&token, &secret) {
                Ok(c) => c,
                Err(e) => {
                    debug!("Rejected token: {}", e);
                    return Ok(reject(req, ApiError::Unauthorized("Invalid token".into())));
                }
            };

            // 1) Resolve the current account state
            let state = req.app_data::<web::Data<AppState>>().cloned();
            let role = match state {
                Some(state) => match state.store.find_user(&claims.sub).await {
                    Ok(Some(user)) if user.active => user.role,
                    Ok(Some(_)) => {
                        return Ok(reject(req, ApiError::Forbidden("Account is deactivated".into())))
                    }
                    Ok(None) => {
                        return Ok(reject(req, ApiError::Unauthorized("Account no longer exists".into())))
                    }
                    Err(e) => return Ok(reject(req, e.into())),
                },
                None => claims.role,
            };

            // 2) Hand the identity to the handlers
            req.extensions_mut().insert(AuthUser {
                id: claims.sub,
                role,
            });
            let res = service.call(req).await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

pub fn current_user(req: &HttpRequest) -> Result<AuthUser, ApiError> {
    req.extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".into()))
}

/// The caller, provided they are an active admin.
pub fn require_admin(req: &HttpRequest) -> Result<AuthUser, ApiError> {
    let user = current_user(req)?;
    if !user.is_admin() {
        return Err(ApiError::Forbidden("Admin access required".into()));
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_prefixes() {
        assert!(is_public("/api/auth/login"));
        assert!(is_public("/api/health"));
        assert!(is_public("/uploads/a.png"));
        assert!(!is_public("/api/projects"));
        assert!(!is_public("/api/authz"));
    }
}
