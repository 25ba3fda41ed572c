use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;
use super::user::UserSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: String,
    /// Sorted and de-duplicated so a participant set has one spelling.
    pub participants: Vec<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub ai_summary: Option<String>,
    #[serde(default)]
    pub ai_summary_generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ai_summary_needs_update: bool,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn normalize_participants(mut ids: Vec<String>) -> Vec<String> {
        ids.retain(|id| !id.trim().is_empty());
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// Other side of a two-party conversation.
    pub fn counterpart(&self, user_id: &str) -> Option<&str> {
        if self.participants.len() != 2 {
            return None;
        }
        self.participants
            .iter()
            .find(|p| p.as_str() != user_id)
            .map(String::as_str)
    }
}

/// Conversation as returned by the API, with populated participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub participant_details: Vec<UserSummary>,
    pub unread_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationThread {
    #[serde(flatten)]
    pub conversation: ConversationView,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub participants: Vec<String>,
    pub subject: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Conversation {
        let now = Utc::now();
        Conversation {
            id: "c1".into(),
            participants: vec!["a".into(), "b".into()],
            subject: None,
            ai_summary: Some("They agreed on Friday.".into()),
            ai_summary_generated_at: Some(now),
            ai_summary_needs_update: false,
            last_message_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn participants_are_normalized() {
        let ids = vec!["b".to_string(), "a".to_string(), "b".to_string(), " ".to_string()];
        assert_eq!(Conversation::normalize_participants(ids), vec!["a", "b"]);
    }

    #[test]
    fn counterpart_only_for_pairs() {
        let mut c = conversation();
        assert_eq!(c.counterpart("a"), Some("b"));
        c.participants.push("c".into());
        assert_eq!(c.counterpart("a"), None);
    }
}
