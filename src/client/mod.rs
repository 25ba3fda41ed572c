//! Typed HTTP client for the CollabMate API.
//!
//! Every call attaches the session's bearer token. A `401` from any endpoint
//! clears the session and records `/login` as the pending redirect; the
//! server's message is kept on the error.

pub mod session;
pub mod views;

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::ai::SuggestionRequest;
use crate::ai_endpoints::SummaryResponse;
use crate::auth::AuthResponse;
use crate::models::collaboration::{RequestView, RequestsOverview, SendRequestPayload};
use crate::models::conversation::{ConversationThread, ConversationView, CreateConversationRequest};
use crate::models::event::CreateEventRequest;
use crate::models::message::{MarkReadRequest, ReactionRequest, SendMessageRequest};
use crate::models::project::{ProjectUpdate, ProjectView};
use crate::models::suggestion::SaveSuggestionRequest;
use crate::models::task::{CreateTaskRequest, TaskFilter, UpdateTaskRequest};
use crate::models::user::ProfileUpdate;
use crate::models::{
    CalendarEvent, ListQuery, Message, Page, Project, SavedSuggestion, Task, UserProfile,
    UserSummary,
};
use crate::suggestions::SuggestionsResponse;
use crate::validation::{LoginForm, RegisterForm};

use self::session::SessionStore;
use self::views::last_admin_guard;

pub const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{message}")]
    Unauthorized { message: String },
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error(transparent)]
    Network(#[from] reqwest::Error),
    #[error("{0}")]
    Invalid(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized { .. } => Some(401),
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()))
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Arc<SessionStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> ClientResult<T> {
        let builder = match self.session.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };
        let resp = builder.send().await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            let body = resp.text().await.unwrap_or_default();
            self.session.clear();
            self.session.set_redirect(LOGIN_ROUTE);
            return Err(ClientError::Unauthorized {
                message: error_message(status, &body),
            });
        }
        if !status.is_success() {
            let body = resp.text().await?;
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }
        Ok(resp.json::<T>().await?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send(self.http.get(self.url(path))).await
    }

    pub async fn get_query<Q: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, query: &Q) -> ClientResult<T> {
        self.send(self.http.get(self.url(path)).query(query)).await
    }

    pub async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.send(self.http.request(method, self.url(path)).json(body)).await
    }

    pub async fn send_empty<T: DeserializeOwned>(&self, method: Method, path: &str) -> ClientResult<T> {
        self.send(self.http.request(method, self.url(path))).await
    }

    // ─── auth ────────────────────────────────────────────────────────────────

    pub async fn register(&self, form: &RegisterForm) -> ClientResult<AuthResponse> {
        if let Some(msg) = form.errors().first() {
            return Err(ClientError::Invalid(msg.to_string()));
        }
        let body = json!({ "name": form.name, "email": form.email, "password": form.password });
        let auth: AuthResponse = self.send_json(Method::POST, "/auth/register", &body).await?;
        self.session.persist_login(&auth);
        Ok(auth)
    }

    pub async fn login(&self, form: &LoginForm) -> ClientResult<AuthResponse> {
        if let Some(msg) = form.errors().first() {
            return Err(ClientError::Invalid(msg.to_string()));
        }
        let body = json!({ "email": form.email, "password": form.password });
        let auth: AuthResponse = self.send_json(Method::POST, "/auth/login", &body).await?;
        self.session.persist_login(&auth);
        Ok(auth)
    }

    pub fn logout(&self) {
        self.session.clear();
    }

    pub async fn email_exists(&self, email: &str) -> ClientResult<bool> {
        let mut url = reqwest::Url::parse(&self.url("/auth/email"))
            .map_err(|e| ClientError::Invalid(format!("Invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Invalid("Invalid base URL".into()))?
            .push(email.trim());
        let v: Value = self.send(self.http.get(url)).await?;
        Ok(v.get("exists").and_then(Value::as_bool).unwrap_or(false))
    }

    // ─── users ───────────────────────────────────────────────────────────────

    pub async fn profile(&self) -> ClientResult<UserProfile> {
        self.get("/users/profile").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> ClientResult<UserProfile> {
        self.send_json(Method::PUT, "/users/profile", update).await
    }

    pub async fn search_users(&self, term: &str) -> ClientResult<Vec<UserSummary>> {
        self.get_query("/users", &[("search", term)]).await
    }

    pub async fn find_collaborators(&self, term: &str) -> ClientResult<Vec<UserSummary>> {
        self.get_query("/users-search", &[("q", term)]).await
    }

    // ─── projects, tasks, events ─────────────────────────────────────────────

    pub async fn projects(&self) -> ClientResult<Vec<ProjectView>> {
        self.get("/projects").await
    }

    pub async fn create_project(&self, title: &str, description: &str, category: Option<&str>) -> ClientResult<ProjectView> {
        let body = json!({ "title": title, "description": description, "category": category });
        self.send_json(Method::POST, "/projects", &body).await
    }

    pub async fn project(&self, id: &str) -> ClientResult<ProjectView> {
        self.get(&format!("/projects/{}", id)).await
    }

    pub async fn update_project(&self, id: &str, update: &ProjectUpdate) -> ClientResult<ProjectView> {
        self.send_json(Method::PATCH, &format!("/projects/{}", id), update).await
    }

    pub async fn delete_project(&self, id: &str) -> ClientResult<Value> {
        self.send_empty(Method::DELETE, &format!("/projects/{}", id)).await
    }

    pub async fn tasks(&self, filter: &TaskFilter) -> ClientResult<Vec<Task>> {
        self.get_query("/tasks", filter).await
    }

    pub async fn create_task(&self, task: &CreateTaskRequest) -> ClientResult<Task> {
        self.send_json(Method::POST, "/tasks", task).await
    }

    pub async fn update_task(&self, id: &str, update: &UpdateTaskRequest) -> ClientResult<Task> {
        self.send_json(Method::PUT, &format!("/tasks/{}", id), update).await
    }

    pub async fn delete_task(&self, id: &str) -> ClientResult<Value> {
        self.send_empty(Method::DELETE, &format!("/tasks/{}", id)).await
    }

    pub async fn events(&self, project: Option<&str>) -> ClientResult<Vec<CalendarEvent>> {
        match project {
            Some(p) => self.get_query("/events", &[("project", p)]).await,
            None => self.get("/events").await,
        }
    }

    pub async fn create_event(&self, event: &CreateEventRequest) -> ClientResult<CalendarEvent> {
        self.send_json(Method::POST, "/events", event).await
    }

    pub async fn delete_event(&self, id: &str) -> ClientResult<Value> {
        self.send_empty(Method::DELETE, &format!("/events/{}", id)).await
    }

    // ─── messaging ───────────────────────────────────────────────────────────

    pub async fn conversations(&self) -> ClientResult<Vec<ConversationView>> {
        self.get("/conversations").await
    }

    pub async fn open_conversation(&self, request: &CreateConversationRequest) -> ClientResult<ConversationView> {
        self.send_json(Method::POST, "/conversations", request).await
    }

    pub async fn conversation(&self, id: &str) -> ClientResult<ConversationThread> {
        self.get(&format!("/conversations/{}", id)).await
    }

    pub async fn send_message(&self, message: &SendMessageRequest) -> ClientResult<Message> {
        self.send_json(Method::POST, "/messages", message).await
    }

    pub async fn inbox(&self) -> ClientResult<Vec<Message>> {
        self.get("/messages").await
    }

    pub async fn mark_read(&self, message_ids: Vec<String>) -> ClientResult<Value> {
        self.send_json(Method::PATCH, "/messages", &MarkReadRequest { message_ids })
            .await
    }

    pub async fn thread(&self, id: &str) -> ClientResult<Vec<Message>> {
        self.get(&format!("/messages/thread/{}", id)).await
    }

    pub async fn unread_count(&self) -> ClientResult<u64> {
        let v: Value = self.get("/messages/unread/count").await?;
        Ok(v.get("count").and_then(Value::as_u64).unwrap_or(0))
    }

    pub async fn react(&self, message_id: &str, emoji: &str) -> ClientResult<Message> {
        let body = ReactionRequest {
            emoji: emoji.to_string(),
        };
        self.send_json(Method::POST, &format!("/messages/{}/reactions", message_id), &body)
            .await
    }

    pub async fn delete_conversation(&self, id: &str) -> ClientResult<Value> {
        self.send_empty(Method::DELETE, &format!("/messages/conversations/{}", id))
            .await
    }

    pub async fn summarize(&self, conversation_id: &str) -> ClientResult<SummaryResponse> {
        let body = json!({ "conversationId": conversation_id });
        self.send_json(Method::POST, "/ai/chat/summarize", &body).await
    }

    // ─── collaborations ──────────────────────────────────────────────────────

    pub async fn send_request(&self, payload: &SendRequestPayload) -> ClientResult<RequestView> {
        self.send_json(Method::POST, "/collaborations/request", payload).await
    }

    pub async fn accept_request(&self, id: &str) -> ClientResult<RequestView> {
        self.send_empty(Method::PUT, &format!("/collaborations/accept/{}", id))
            .await
    }

    pub async fn reject_request(&self, id: &str) -> ClientResult<RequestView> {
        self.send_empty(Method::PUT, &format!("/collaborations/reject/{}", id))
            .await
    }

    pub async fn requests(&self) -> ClientResult<RequestsOverview> {
        self.get("/collaborations/requests").await
    }

    // ─── suggestions ─────────────────────────────────────────────────────────

    pub async fn ai_suggestions(&self) -> ClientResult<SuggestionsResponse> {
        self.get("/suggestions/ai").await
    }

    pub async fn generate_suggestions(&self, request: &SuggestionRequest) -> ClientResult<Value> {
        self.send_json(Method::POST, "/ai/get-suggestions", request).await
    }

    pub async fn saved_suggestions(&self) -> ClientResult<Vec<SavedSuggestion>> {
        self.get("/suggestions/saved").await
    }

    pub async fn save_suggestion(&self, request: &SaveSuggestionRequest) -> ClientResult<SavedSuggestion> {
        self.send_json(Method::POST, "/suggestions/save", request).await
    }

    pub async fn delete_saved(&self, id: Option<&str>) -> ClientResult<Value> {
        match id {
            Some(id) => {
                self.send(
                    self.http
                        .delete(self.url("/suggestions/saved"))
                        .query(&[("id", id)]),
                )
                .await
            }
            None => self.send_empty(Method::DELETE, "/suggestions/saved").await,
        }
    }

    // ─── admin ───────────────────────────────────────────────────────────────

    pub async fn admin_stats(&self) -> ClientResult<Value> {
        self.get("/admin/stats").await
    }

    pub async fn admin_users(&self, query: &ListQuery) -> ClientResult<Page<UserProfile>> {
        self.get_query("/admin/users", query).await
    }

    pub async fn admin_user(&self, id: &str) -> ClientResult<Value> {
        self.get(&format!("/admin/users/{}", id)).await
    }

    pub async fn activate_user(&self, id: &str) -> ClientResult<UserProfile> {
        self.send_empty(Method::PUT, &format!("/admin/users/{}/activate", id))
            .await
    }

    /// Applies the page-level last-admin guard before calling the server.
    pub async fn deactivate_user(&self, page: &[UserProfile], id: &str) -> ClientResult<UserProfile> {
        last_admin_guard(page, id).map_err(|m| ClientError::Invalid(m.to_string()))?;
        self.send_empty(Method::PUT, &format!("/admin/users/{}/deactivate", id))
            .await
    }

    pub async fn delete_user(&self, page: &[UserProfile], id: &str) -> ClientResult<Value> {
        last_admin_guard(page, id).map_err(|m| ClientError::Invalid(m.to_string()))?;
        self.send_empty(Method::DELETE, &format!("/admin/users/{}", id)).await
    }

    pub async fn admin_projects(&self, query: &ListQuery) -> ClientResult<Page<Project>> {
        self.get_query("/admin/projects", query).await
    }

    pub async fn archive_project(&self, id: &str) -> ClientResult<Project> {
        self.send_empty(Method::PUT, &format!("/admin/projects/{}/archive", id))
            .await
    }

    pub async fn admin_delete_project(&self, id: &str) -> ClientResult<Value> {
        self.send_empty(Method::DELETE, &format!("/admin/projects/{}", id))
            .await
    }

    pub async fn admin_messages(&self, query: &ListQuery) -> ClientResult<Page<Message>> {
        self.get_query("/admin/messages", query).await
    }

    pub async fn flag_message(&self, id: &str, flagged: bool) -> ClientResult<Message> {
        let action = if flagged { "flag" } else { "unflag" };
        self.send_empty(Method::PUT, &format!("/admin/messages/{}/{}", id, action))
            .await
    }

    pub async fn admin_delete_message(&self, id: &str) -> ClientResult<Value> {
        self.send_empty(Method::DELETE, &format!("/admin/messages/{}", id))
            .await
    }

    pub async fn admin_collaborations(&self, query: &ListQuery) -> ClientResult<Page<RequestView>> {
        self.get_query("/admin/collaborations", query).await
    }

    pub async fn analytics(&self, kind: &str) -> ClientResult<Value> {
        self.get(&format!("/admin/{}-analytics", kind)).await
    }
}
