use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Archived,
    Completed,
    InProgress,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 4] = [
        ProjectStatus::Active,
        ProjectStatus::Archived,
        ProjectStatus::Completed,
        ProjectStatus::InProgress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Archived => "archived",
            ProjectStatus::Completed => "completed",
            ProjectStatus::InProgress => "inProgress",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }
}

/// Per-project permission tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Owner,
    Admin,
    Editor,
    Viewer,
}

impl ProjectRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Owner => "owner",
            ProjectRole::Admin => "admin",
            ProjectRole::Editor => "editor",
            ProjectRole::Viewer => "viewer",
        }
    }

    /// Title, description and category edits.
    pub fn can_edit(&self) -> bool {
        !matches!(self, ProjectRole::Viewer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub user: String,
    pub role: ProjectRole,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    pub owner: String,
    #[serde(default)]
    pub collaborators: Vec<Collaborator>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// The caller's effective role, `None` for outsiders.
    pub fn role_of(&self, user_id: &str) -> Option<ProjectRole> {
        if self.owner == user_id {
            return Some(ProjectRole::Owner);
        }
        self.collaborators
            .iter()
            .find(|c| c.user == user_id)
            .map(|c| c.role)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.role_of(user_id).is_some()
    }

    /// Owner plus every collaborator.
    pub fn member_ids(&self) -> Vec<String> {
        let mut ids = vec![self.owner.clone()];
        ids.extend(self.collaborators.iter().map(|c| c.user.clone()));
        ids
    }
}

/// A project as listed for one caller, tagged with the caller's role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    pub user_role: ProjectRole,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<ProjectStatus>,
}

impl ProjectUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.status.is_none()
    }
}

/// Admin list filter.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub search: Option<String>,
    pub status: Option<ProjectStatus>,
    pub category: Option<String>,
    pub owner: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        let now = Utc::now();
        Project {
            id: "p1".into(),
            title: "Atlas".into(),
            description: String::new(),
            category: None,
            status: ProjectStatus::Active,
            owner: "owner".into(),
            collaborators: vec![Collaborator {
                user: "viewer".into(),
                role: ProjectRole::Viewer,
                added_at: now,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn role_of_distinguishes_owner_collaborator_and_outsider() {
        let p = project();
        assert_eq!(p.role_of("owner"), Some(ProjectRole::Owner));
        assert_eq!(p.role_of("viewer"), Some(ProjectRole::Viewer));
        assert_eq!(p.role_of("stranger"), None);
        assert!(!ProjectRole::Viewer.can_edit());
    }

    #[test]
    fn status_uses_camel_case_on_the_wire() {
        let s = serde_json::to_string(&ProjectStatus::InProgress).unwrap();
        assert_eq!(s, "\"inProgress\"");
        assert_eq!(ProjectStatus::parse("inProgress"), Some(ProjectStatus::InProgress));
        assert_eq!(ProjectStatus::parse("paused"), None);
    }

    #[test]
    fn view_flattens_project_fields() {
        let view = ProjectView {
            project: project(),
            user_role: ProjectRole::Owner,
        };
        let v = serde_json::to_value(&view).unwrap();
        assert_eq!(v["title"], "Atlas");
        assert_eq!(v["userRole"], "owner");
    }
}
