//! View-model rules the dashboard screens apply before touching the API.

use crate::models::project::ProjectView;
use crate::models::{Conversation, ProjectRole, Role, UserProfile};

use super::session::SessionStore;

pub const LAST_ADMIN_GUARD_MESSAGE: &str =
    "This is the only active admin on this page and cannot be deactivated or deleted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectTab {
    #[default]
    All,
    Owned,
    Shared,
}

/// Projects visible under `tab` whose title or description contains `query`.
pub fn filter_projects<'a>(projects: &'a [ProjectView], tab: ProjectTab, query: &str) -> Vec<&'a ProjectView> {
    let needle = query.trim().to_lowercase();
    projects
        .iter()
        .filter(|p| match tab {
            ProjectTab::All => true,
            ProjectTab::Owned => p.user_role == ProjectRole::Owner,
            ProjectTab::Shared => p.user_role != ProjectRole::Owner,
        })
        .filter(|p| {
            needle.is_empty()
                || p.project.title.to_lowercase().contains(&needle)
                || p.project.description.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Rejects deactivating or deleting the only active admin among the loaded
/// rows. The server enforces the same rule across all users.
pub fn last_admin_guard(page: &[UserProfile], target_id: &str) -> Result<(), &'static str> {
    let Some(target) = page.iter().find(|u| u.id == target_id) else {
        return Ok(());
    };
    if !(target.active && target.role == Role::Admin) {
        return Ok(());
    }
    let active_admins = page
        .iter()
        .filter(|u| u.active && u.role == Role::Admin)
        .count();
    if active_admins <= 1 {
        Err(LAST_ADMIN_GUARD_MESSAGE)
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(&'static str),
}

pub fn guard_route(path: &str, session: &SessionStore) -> RouteDecision {
    let needs_admin = path == "/admin" || path.starts_with("/admin/");
    let needs_session = needs_admin || path == "/dashboard" || path.starts_with("/dashboard/");
    if !needs_session {
        return RouteDecision::Allow;
    }
    if !session.is_authenticated() {
        return RouteDecision::Redirect("/login");
    }
    if needs_admin && session.role() != Some(Role::Admin) {
        return RouteDecision::Redirect("/dashboard/projects");
    }
    RouteDecision::Allow
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryState<'a> {
    Fresh(&'a str),
    /// A summary exists but newer messages arrived.
    Stale,
    Missing,
}

pub fn summary_state(conversation: &Conversation) -> SummaryState<'_> {
    match (conversation.ai_summary.as_deref(), conversation.ai_summary_needs_update) {
        (Some(summary), false) => SummaryState::Fresh(summary),
        (_, true) if conversation.ai_summary_generated_at.is_some() => SummaryState::Stale,
        _ => SummaryState::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Project, ProjectStatus};
    use chrono::Utc;

    fn view(title: &str, role: ProjectRole) -> ProjectView {
        let now = Utc::now();
        ProjectView {
            project: Project {
                id: title.into(),
                title: title.into(),
                description: format!("About {}", title),
                category: None,
                status: ProjectStatus::Active,
                owner: "o".into(),
                collaborators: vec![],
                created_at: now,
                updated_at: now,
            },
            user_role: role,
        }
    }

    fn profile(id: &str, role: Role, active: bool) -> UserProfile {
        UserProfile {
            id: id.into(),
            name: id.into(),
            email: format!("{}@x.io", id),
            role,
            active,
            skills: vec![],
            interests: vec![],
            bio: None,
            avatar_url: None,
            created_at: Utc::now(),
            last_login_at: None,
        }
    }

    #[test]
    fn summary_state_tells_stale_from_missing() {
        let now = Utc::now();
        let mut c = Conversation {
            id: "c".into(),
            participants: vec!["a".into(), "b".into()],
            subject: None,
            ai_summary: None,
            ai_summary_generated_at: None,
            ai_summary_needs_update: false,
            last_message_at: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(summary_state(&c), SummaryState::Missing);

        c.ai_summary = Some("Ship on Friday".into());
        c.ai_summary_generated_at = Some(now);
        assert_eq!(summary_state(&c), SummaryState::Fresh("Ship on Friday"));

        // the server drops the text of a stale summary
        c.ai_summary = None;
        c.ai_summary_needs_update = true;
        assert_eq!(summary_state(&c), SummaryState::Stale);
    }

    #[test]
    fn tabs_partition_by_role() {
        let projects = vec![
            view("Atlas", ProjectRole::Owner),
            view("Borealis", ProjectRole::Editor),
            view("Comet", ProjectRole::Viewer),
        ];
        assert_eq!(filter_projects(&projects, ProjectTab::All, "").len(), 3);
        assert_eq!(filter_projects(&projects, ProjectTab::Owned, "").len(), 1);
        assert_eq!(filter_projects(&projects, ProjectTab::Shared, "").len(), 2);
        let hits = filter_projects(&projects, ProjectTab::All, "about bore");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].project.title, "Borealis");
    }

    #[test]
    fn only_admin_on_page_is_protected() {
        let page = vec![profile("root", Role::Admin, true), profile("u", Role::User, true)];
        assert_eq!(last_admin_guard(&page, "root"), Err(LAST_ADMIN_GUARD_MESSAGE));
        assert_eq!(last_admin_guard(&page, "u"), Ok(()));

        let page = vec![profile("a", Role::Admin, true), profile("b", Role::Admin, true)];
        assert_eq!(last_admin_guard(&page, "a"), Ok(()));
    }

    #[test]
    fn routes_require_session_and_role() {
        let session = SessionStore::new();
        assert_eq!(guard_route("/login", &session), RouteDecision::Allow);
        assert_eq!(guard_route("/dashboard/projects", &session), RouteDecision::Redirect("/login"));
        session.set(super::super::session::TOKEN, "t");
        session.set(super::super::session::ROLE, "user");
        assert_eq!(guard_route("/dashboard/projects", &session), RouteDecision::Allow);
        assert_eq!(
            guard_route("/admin/users", &session),
            RouteDecision::Redirect("/dashboard/projects")
        );
        session.set(super::super::session::ROLE, "admin");
        assert_eq!(guard_route("/admin", &session), RouteDecision::Allow);
    }
}
