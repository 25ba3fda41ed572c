#![allow(dead_code)]

use std::sync::Arc;

use actix::Actor;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use serde_json::{json, Value};
use tempfile::TempDir;

use collabmate::ai::OfflineAiProvider;
use collabmate::app_state::AppState;
use collabmate::chat_server::ChatServer;
use collabmate::config::{Config, StoreBackend};
use collabmate::store::MemoryStore;

pub const JWT_SECRET: &str = "integration-secret";
pub const ADMIN_EMAIL: &str = "root@collabmate.io";
pub const PASSWORD: &str = "Passw0rd!";

pub struct TestCtx {
    pub state: AppState,
    // removed on drop
    _uploads: TempDir,
}

pub fn config(upload_dir: &str) -> Config {
    Config {
        bind_addr: "127.0.0.1:0".into(),
        store_backend: StoreBackend::Memory,
        mongo_uri: None,
        database_name: "collabmate_test".into(),
        jwt_secret: JWT_SECRET.into(),
        jwt_ttl_hours: 1,
        bcrypt_cost: 4,
        frontend_origin: "http://localhost:3000".into(),
        upload_dir: upload_dir.into(),
        max_upload_bytes: 1024 * 1024,
        admin_emails: vec![ADMIN_EMAIL.into()],
        ai_local_endpoint: None,
        ai_aws_endpoint: None,
        ai_use_local: true,
    }
}

/// Fresh state over an empty in-memory store. Must run inside an actix system.
pub fn ctx() -> TestCtx {
    let uploads = tempfile::tempdir().expect("tempdir");
    let upload_dir = uploads.path().to_string_lossy().to_string();
    TestCtx {
        state: AppState {
            chat_server: ChatServer::new().start(),
            store: Arc::new(MemoryStore::new()),
            ai: Arc::new(OfflineAiProvider),
            config: config(&upload_dir),
        },
        _uploads: uploads,
    }
}

/// Builds the full API the way `main` does, minus CORS and static files.
#[allow(unused_macros)]
macro_rules! app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(collabmate::middleware::Authentication::new(common::JWT_SECRET))
                .app_data(actix_web::web::Data::new($ctx.state.clone()))
                .app_data(
                    actix_web::web::JsonConfig::default()
                        .error_handler(collabmate::error::json_error_handler),
                )
                .app_data(
                    actix_web::web::QueryConfig::default()
                        .error_handler(collabmate::error::query_error_handler),
                )
                .configure(collabmate::configure_api),
        )
        .await
    };
}

/// Sends the request and returns the status with the JSON body (`Null` when empty).
pub async fn call<S, R, B, E>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse<B>, Error = E>,
    B: MessageBody,
    E: std::fmt::Debug,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

pub fn authed(req: TestRequest, token: &str) -> TestRequest {
    req.insert_header(("Authorization", format!("Bearer {}", token)))
}

pub fn get(path: &str, token: &str) -> TestRequest {
    authed(TestRequest::get().uri(path), token)
}

pub fn post(path: &str, token: &str, body: Value) -> TestRequest {
    authed(TestRequest::post().uri(path), token).set_json(body)
}

pub fn put(path: &str, token: &str, body: Value) -> TestRequest {
    authed(TestRequest::put().uri(path), token).set_json(body)
}

pub fn patch(path: &str, token: &str, body: Value) -> TestRequest {
    authed(TestRequest::patch().uri(path), token).set_json(body)
}

pub fn delete(path: &str, token: &str) -> TestRequest {
    authed(TestRequest::delete().uri(path), token)
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub token: String,
}

/// Registers `name` with a valid password and returns its id and token.
pub async fn register<S, B, E>(app: &S, name: &str, email: &str) -> Account
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = E>,
    B: MessageBody,
    E: std::fmt::Debug,
{
    let req = TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "name": name, "email": email, "password": PASSWORD }))
        .to_request();
    let (status, body) = call(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "register {}: {}", email, body);
    Account {
        id: body["user"]["_id"].as_str().expect("user id").to_string(),
        token: body["token"].as_str().expect("token").to_string(),
    }
}

/// Creates a project owned by `owner` and returns its id.
pub async fn create_project<S, B, E>(app: &S, owner: &Account, title: &str) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = E>,
    B: MessageBody,
    E: std::fmt::Debug,
{
    let req = post(
        "/api/projects",
        &owner.token,
        json!({ "title": title, "description": format!("{} description", title) }),
    )
    .to_request();
    let (status, body) = call(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "create project: {}", body);
    body["_id"].as_str().expect("project id").to_string()
}
