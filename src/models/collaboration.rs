use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::project::ProjectRole;
use super::user::UserSummary;

/// Role a collaboration request grants on acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaborationRole {
    #[default]
    Viewer,
    Editor,
}

impl CollaborationRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
        }
    }
}

impl From<CollaborationRole> for ProjectRole {
    fn from(role: CollaborationRole) -> Self {
        match role {
            CollaborationRole::Viewer => ProjectRole::Viewer,
            CollaborationRole::Editor => ProjectRole::Editor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationRequest {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub project: String,
    #[serde(default)]
    pub role: CollaborationRole,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
}

impl CollaborationRequest {
    /// The party that joins the project once the request is accepted.
    pub fn joining_user(&self, project_owner: &str) -> &str {
        if self.sender == project_owner {
            &self.receiver
        } else {
            &self.sender
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequestPayload {
    pub project_id: String,
    pub receiver_id: String,
    #[serde(default)]
    pub role: CollaborationRole,
    pub message: Option<String>,
}

/// Minimal project reference carried on a request view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
}

impl ProjectSummary {
    pub fn unknown(id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: "Deleted project".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender: UserSummary,
    pub receiver: UserSummary,
    pub project: ProjectSummary,
    pub role: CollaborationRole,
    pub message: Option<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Requests of one direction, split by status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBuckets {
    pub pending: Vec<RequestView>,
    pub accepted: Vec<RequestView>,
    pub rejected: Vec<RequestView>,
}

impl RequestBuckets {
    pub fn push(&mut self, view: RequestView) {
        match view.status {
            RequestStatus::Pending => self.pending.push(view),
            RequestStatus::Accepted => self.accepted.push(view),
            RequestStatus::Rejected => self.rejected.push(view),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestsOverview {
    pub incoming: RequestBuckets,
    pub outgoing: RequestBuckets,
}

#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
}
