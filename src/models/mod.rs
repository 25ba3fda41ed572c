pub mod collaboration;
pub mod conversation;
pub mod event;
pub mod message;
pub mod page;
pub mod project;
pub mod suggestion;
pub mod task;
pub mod user;

pub use collaboration::{CollaborationRequest, CollaborationRole, RequestStatus};
pub use conversation::Conversation;
pub use event::CalendarEvent;
pub use message::{Attachment, Message, Reaction};
pub use page::{ListQuery, Page, PageRequest, SortKey};
pub use project::{Collaborator, Project, ProjectRole, ProjectStatus};
pub use suggestion::{SavedSuggestion, Suggestion, SuggestionKind};
pub use task::Task;
pub use user::{Role, Skill, SkillLevel, User, UserProfile, UserSummary};

/// Fresh document id. All collections key on UUID strings under `_id`.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
