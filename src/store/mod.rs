//! Persistence port. Handlers talk to `dyn Store`; `MongoStore` backs
//! production and `MemoryStore` backs tests and local development.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::collaboration::RequestFilter;
use crate::models::event::EventFilter;
use crate::models::message::MessageFilter;
use crate::models::project::{ProjectFilter, ProjectUpdate};
use crate::models::task::{TaskFilter, UpdateTaskRequest};
use crate::models::user::{ProfileUpdate, UserFilter};
use crate::models::{
    CalendarEvent, CollaborationRequest, Collaborator, Conversation, Message, PageRequest,
    Project, Reaction, RequestStatus, SavedSuggestion, Task, User,
};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("conflict")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    // ─── users ───────────────────────────────────────────────────────────────
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn find_user(&self, id: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_users(&self, ids: &[String]) -> StoreResult<Vec<User>>;
    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> StoreResult<Option<User>>;
    async fn set_avatar(&self, id: &str, url: &str) -> StoreResult<Option<User>>;
    async fn record_login(&self, id: &str, at: DateTime<Utc>) -> StoreResult<()>;
    /// Case-insensitive match on name, email, skill names and interests.
    async fn search_users(&self, term: &str, exclude: &str, limit: u64) -> StoreResult<Vec<User>>;
    /// Active users sharing at least one interest or skill name, compared
    /// case-insensitively. Unordered and unbounded; callers rank and cut.
    async fn users_sharing(
        &self,
        interests: &[String],
        skills: &[String],
        exclude: &str,
    ) -> StoreResult<Vec<User>>;
    async fn list_users(&self, filter: &UserFilter, page: &PageRequest) -> StoreResult<(Vec<User>, u64)>;
    async fn count_users(&self, filter: &UserFilter) -> StoreResult<u64>;
    async fn set_user_active(&self, id: &str, active: bool) -> StoreResult<bool>;
    /// Deactivates the account unless that would leave no active admin, in
    /// which case it fails with `StoreError::Conflict`. The check and the
    /// write are one step. `false` when the id is unknown.
    async fn deactivate_user(&self, id: &str) -> StoreResult<bool>;
    async fn delete_user(&self, id: &str) -> StoreResult<bool>;

    // ─── projects ────────────────────────────────────────────────────────────
    async fn insert_project(&self, project: &Project) -> StoreResult<()>;
    async fn find_project(&self, id: &str) -> StoreResult<Option<Project>>;
    async fn find_projects(&self, ids: &[String]) -> StoreResult<Vec<Project>>;
    /// Projects the user owns or collaborates on.
    async fn projects_for_member(&self, user_id: &str) -> StoreResult<Vec<Project>>;
    async fn update_project(&self, id: &str, update: &ProjectUpdate) -> StoreResult<Option<Project>>;
    /// Adds the collaborator, or updates the role of an existing entry.
    async fn upsert_collaborator(&self, project_id: &str, collaborator: &Collaborator) -> StoreResult<bool>;
    async fn remove_user_from_projects(&self, user_id: &str) -> StoreResult<u64>;
    async fn delete_project(&self, id: &str) -> StoreResult<bool>;
    async fn list_projects(&self, filter: &ProjectFilter, page: &PageRequest) -> StoreResult<(Vec<Project>, u64)>;
    async fn count_projects(&self, filter: &ProjectFilter) -> StoreResult<u64>;
    async fn project_categories(&self) -> StoreResult<Vec<String>>;

    // ─── tasks ───────────────────────────────────────────────────────────────
    async fn insert_task(&self, task: &Task) -> StoreResult<()>;
    async fn find_task(&self, id: &str) -> StoreResult<Option<Task>>;
    async fn find_tasks(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>>;
    async fn update_task(&self, id: &str, update: &UpdateTaskRequest) -> StoreResult<Option<Task>>;
    async fn delete_task(&self, id: &str) -> StoreResult<bool>;
    async fn delete_project_tasks(&self, project_id: &str) -> StoreResult<u64>;

    // ─── calendar events ─────────────────────────────────────────────────────
    async fn insert_event(&self, event: &CalendarEvent) -> StoreResult<()>;
    async fn find_event(&self, id: &str) -> StoreResult<Option<CalendarEvent>>;
    async fn find_events(&self, filter: &EventFilter) -> StoreResult<Vec<CalendarEvent>>;
    async fn delete_event(&self, id: &str) -> StoreResult<bool>;
    async fn delete_project_events(&self, project_id: &str) -> StoreResult<u64>;

    // ─── conversations ───────────────────────────────────────────────────────
    async fn insert_conversation(&self, conversation: &Conversation) -> StoreResult<()>;
    async fn find_conversation(&self, id: &str) -> StoreResult<Option<Conversation>>;
    /// Exact match on an already-normalized participant list.
    async fn find_conversation_with(&self, participants: &[String]) -> StoreResult<Option<Conversation>>;
    /// Newest activity first.
    async fn conversations_for_user(&self, user_id: &str) -> StoreResult<Vec<Conversation>>;
    /// Bumps activity and marks the summary stale.
    async fn touch_conversation(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool>;
    /// Replaces the summary and clears the stale flag, but only while
    /// `lastMessageAt` still equals `seen_last_message`. `None` when the
    /// conversation is gone or a newer message arrived.
    async fn set_conversation_summary(
        &self,
        id: &str,
        summary: &str,
        at: DateTime<Utc>,
        seen_last_message: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<Conversation>>;
    async fn delete_conversation(&self, id: &str) -> StoreResult<bool>;
    async fn count_conversations(&self) -> StoreResult<u64>;

    // ─── messages ────────────────────────────────────────────────────────────
    async fn insert_message(&self, message: &Message) -> StoreResult<()>;
    async fn find_message(&self, id: &str) -> StoreResult<Option<Message>>;
    /// Oldest first.
    async fn conversation_messages(&self, conversation_id: &str) -> StoreResult<Vec<Message>>;
    /// Sent or received, newest first.
    async fn messages_for_user(&self, user_id: &str) -> StoreResult<Vec<Message>>;
    async fn mark_read(&self, ids: &[String], user_id: &str) -> StoreResult<u64>;
    async fn count_unread(&self, conversation_ids: &[String], user_id: &str) -> StoreResult<u64>;
    /// `None` when the message is gone; unchanged when the reaction exists.
    async fn add_reaction(&self, id: &str, reaction: &Reaction) -> StoreResult<Option<Message>>;
    async fn delete_conversation_messages(&self, conversation_id: &str) -> StoreResult<u64>;
    async fn list_messages(&self, filter: &MessageFilter, page: &PageRequest) -> StoreResult<(Vec<Message>, u64)>;
    async fn count_messages(&self, filter: &MessageFilter) -> StoreResult<u64>;
    async fn set_message_flag(&self, id: &str, flagged: bool) -> StoreResult<bool>;
    async fn delete_message(&self, id: &str) -> StoreResult<bool>;

    // ─── collaboration requests ──────────────────────────────────────────────
    async fn insert_request(&self, request: &CollaborationRequest) -> StoreResult<()>;
    async fn find_request(&self, id: &str) -> StoreResult<Option<CollaborationRequest>>;
    async fn find_pending_request(
        &self,
        sender: &str,
        receiver: &str,
        project: &str,
    ) -> StoreResult<Option<CollaborationRequest>>;
    /// Requests the user sent or received, newest first.
    async fn requests_for_user(&self, user_id: &str) -> StoreResult<Vec<CollaborationRequest>>;
    /// Moves the request from `from` to `to` only if it is still in `from`.
    async fn transition_request(
        &self,
        id: &str,
        from: RequestStatus,
        to: RequestStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<CollaborationRequest>>;
    async fn list_requests(
        &self,
        filter: &RequestFilter,
        page: &PageRequest,
    ) -> StoreResult<(Vec<CollaborationRequest>, u64)>;
    async fn count_requests(&self, filter: &RequestFilter) -> StoreResult<u64>;
    async fn delete_project_requests(&self, project_id: &str) -> StoreResult<u64>;
    async fn delete_user_requests(&self, user_id: &str) -> StoreResult<u64>;

    // ─── saved suggestions ───────────────────────────────────────────────────
    async fn insert_suggestion(&self, suggestion: &SavedSuggestion) -> StoreResult<()>;
    async fn saved_suggestions(&self, user_id: &str) -> StoreResult<Vec<SavedSuggestion>>;
    async fn delete_suggestion(&self, user_id: &str, id: &str) -> StoreResult<bool>;
    async fn clear_suggestions(&self, user_id: &str) -> StoreResult<u64>;
}
