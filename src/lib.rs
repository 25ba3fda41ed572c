pub mod admin;
pub mod admin_analytics;
pub mod ai;
pub mod ai_endpoints;
pub mod app_state;
pub mod auth;
pub mod calendar;
pub mod chat_server;
pub mod client;
pub mod collaboration;
pub mod config;
pub mod conversations;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod models;
pub mod project;
pub mod store;
pub mod suggestions;
pub mod task;
pub mod uploads;
pub mod user_management;
pub mod validation;
pub mod web_socket_server;

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::app_state::AppState;
use crate::chat_server::OnlineCount;
use crate::error::ApiError;

/// GET /api/health
pub async fn health(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let online = data
        .chat_server
        .send(OnlineCount)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(HttpResponse::Ok().json(json!({ "status": "ok", "online": online })))
}

/// Registers every REST route under `/api`. Shared by the binary and the
/// integration tests.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health))
            // AUTH
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(auth::register))
                    .route("/login", web::post().to(auth::login))
                    .route("/email/{email}", web::get().to(auth::email_exists)),
            )
            // USERS
            .service(
                web::scope("/users")
                    .route("", web::get().to(user_management::search_users))
                    .route("/profile", web::get().to(user_management::get_profile))
                    .route("/profile", web::put().to(user_management::update_profile))
                    .route("/profile/avatar", web::post().to(user_management::upload_avatar)),
            )
            .route("/users-search", web::get().to(user_management::search_users))
            // PROJECTS
            .service(
                web::scope("/projects")
                    .route("", web::get().to(project::list_projects))
                    .route("", web::post().to(project::create_project))
                    .route("/{id}", web::get().to(project::get_project))
                    .route("/{id}", web::patch().to(project::update_project))
                    .route("/{id}", web::delete().to(project::delete_project)),
            )
            // TASKS
            .service(
                web::scope("/tasks")
                    .route("", web::get().to(task::list_tasks))
                    .route("", web::post().to(task::create_task))
                    .route("/{id}", web::put().to(task::update_task))
                    .route("/{id}", web::delete().to(task::delete_task)),
            )
            // EVENTS
            .service(
                web::scope("/events")
                    .route("", web::get().to(calendar::list_events))
                    .route("", web::post().to(calendar::create_event))
                    .route("/{id}", web::delete().to(calendar::delete_event)),
            )
            // CONVERSATIONS
            .service(
                web::scope("/conversations")
                    .route("", web::get().to(conversations::list_conversations))
                    .route("", web::post().to(conversations::create_conversation))
                    .route("/{id}", web::get().to(conversations::get_conversation)),
            )
            // MESSAGES
            .service(
                web::scope("/messages")
                    .route("", web::get().to(messages::list_messages))
                    .route("", web::post().to(messages::send_message))
                    .route("", web::patch().to(messages::mark_read))
                    .route("/unread/count", web::get().to(messages::unread_count))
                    .route("/thread/{id}", web::get().to(messages::get_thread))
                    .route("/conversations/{id}", web::delete().to(messages::delete_conversation))
                    .route("/{id}/reactions", web::post().to(messages::add_reaction)),
            )
            // AI
            .service(
                web::scope("/ai")
                    .route("/chat/summarize", web::post().to(ai_endpoints::summarize_conversation))
                    .route("/get-suggestions", web::post().to(ai_endpoints::get_suggestions)),
            )
            // COLLABORATIONS
            .service(
                web::scope("/collaborations")
                    .route("/request", web::post().to(collaboration::send_request))
                    .route("/accept/{id}", web::put().to(collaboration::accept_request))
                    .route("/reject/{id}", web::put().to(collaboration::reject_request))
                    .route("/requests", web::get().to(collaboration::list_requests)),
            )
            // SUGGESTIONS
            .service(
                web::scope("/suggestions")
                    .route("/ai", web::get().to(suggestions::ai_suggestions))
                    .route("/saved", web::get().to(suggestions::list_saved))
                    .route("/saved", web::delete().to(suggestions::delete_saved))
                    .route("/save", web::post().to(suggestions::save_suggestion)),
            )
            // ADMIN
            .service(
                web::scope("/admin")
                    .route("/stats", web::get().to(admin::stats))
                    .route("/users", web::get().to(admin::list_users))
                    .route("/users/{id}", web::get().to(admin::get_user))
                    .route("/users/{id}", web::delete().to(admin::delete_user))
                    .route("/users/{id}/activate", web::put().to(admin::activate_user))
                    .route("/users/{id}/deactivate", web::put().to(admin::deactivate_user))
                    .route("/projects", web::get().to(admin::list_projects))
                    .route("/projects/{id}", web::delete().to(admin::delete_project))
                    .route("/projects/{id}/archive", web::put().to(admin::archive_project))
                    .route("/messages", web::get().to(admin::list_messages))
                    .route("/messages/{id}", web::delete().to(admin::delete_message))
                    .route("/messages/{id}/flag", web::put().to(admin::flag_message))
                    .route("/messages/{id}/unflag", web::put().to(admin::unflag_message))
                    .route("/collaborations", web::get().to(admin::list_collaborations))
                    .route("/user-analytics", web::get().to(admin_analytics::user_analytics))
                    .route("/project-analytics", web::get().to(admin_analytics::project_analytics))
                    .route("/message-analytics", web::get().to(admin_analytics::message_analytics)),
            ),
    );
}
