use actix_web::{web, HttpRequest, HttpResponse};
use log::{info, warn};
use serde::Serialize;

use crate::app_state::AppState;
use crate::chat_server::OnlineCount;
use crate::collaboration::build_request_views;
use crate::error::ApiError;
use crate::middleware::require_admin;
use crate::models::collaboration::RequestFilter;
use crate::models::message::MessageFilter;
use crate::models::project::{ProjectFilter, ProjectUpdate, ProjectView};
use crate::models::user::UserFilter;
use crate::models::{ListQuery, Page, ProjectStatus, RequestStatus, Role, User, UserProfile};
use crate::project::delete_project_cascade;
use crate::store::{Store, StoreError};

const USER_SORTS: &[&str] = &["createdAt", "name", "email", "role", "lastLoginAt"];
const PROJECT_SORTS: &[&str] = &["createdAt", "updatedAt", "title", "status", "category"];
const MESSAGE_SORTS: &[&str] = &["createdAt"];
const REQUEST_SORTS: &[&str] = &["createdAt"];

pub const LAST_ADMIN_MESSAGE: &str = "Cannot remove the last active admin";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: u64,
    pub active_users: u64,
    pub admins: u64,
    pub total_projects: u64,
    pub active_projects: u64,
    pub archived_projects: u64,
    pub total_messages: u64,
    pub flagged_messages: u64,
    pub conversations: u64,
    pub pending_requests: u64,
    pub online_sessions: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub user: UserProfile,
    pub projects: Vec<ProjectView>,
    pub owned_projects: usize,
}

/// Deactivates `id`, refusing to take away the only remaining active admin.
/// Counts across all users, not whatever page the caller has loaded.
pub async fn deactivate_guarded(store: &dyn Store, id: &str) -> Result<(), ApiError> {
    match store.deactivate_user(id).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(ApiError::not_found("User")),
        Err(StoreError::Conflict) => Err(ApiError::Conflict(LAST_ADMIN_MESSAGE.into())),
        Err(e) => Err(e.into()),
    }
}

fn parse_term<T>(term: Option<String>, parse: impl Fn(&str) -> Option<T>, what: &str) -> Result<Option<T>, ApiError> {
    match term {
        Some(t) => parse(&t)
            .map(Some)
            .ok_or_else(|| ApiError::Validation(format!("Unknown {}: {}", what, t))),
        None => Ok(None),
    }
}

async fn load_user(store: &dyn Store, id: &str) -> Result<User, ApiError> {
    store
        .find_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}

/// GET /api/admin/stats
pub async fn stats(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    require_admin(&req)?;
    let store = data.store.as_ref();

    let online_sessions = match data.chat_server.send(OnlineCount).await {
        Ok(n) => n,
        Err(e) => {
            warn!("Chat server unavailable for stats: {}", e);
            0
        }
    };

    let stats = AdminStats {
        total_users: store.count_users(&UserFilter::default()).await?,
        active_users: store
            .count_users(&UserFilter {
                active: Some(true),
                ..Default::default()
            })
            .await?,
        admins: store
            .count_users(&UserFilter {
                role: Some(Role::Admin),
                ..Default::default()
            })
            .await?,
        total_projects: store.count_projects(&ProjectFilter::default()).await?,
        active_projects: store
            .count_projects(&ProjectFilter {
                status: Some(ProjectStatus::Active),
                ..Default::default()
            })
            .await?,
        archived_projects: store
            .count_projects(&ProjectFilter {
                status: Some(ProjectStatus::Archived),
                ..Default::default()
            })
            .await?,
        total_messages: store.count_messages(&MessageFilter::default()).await?,
        flagged_messages: store
            .count_messages(&MessageFilter {
                flagged: Some(true),
                ..Default::default()
            })
            .await?,
        conversations: store.count_conversations().await?,
        pending_requests: store
            .count_requests(&RequestFilter {
                status: Some(RequestStatus::Pending),
            })
            .await?,
        online_sessions,
    };
    Ok(HttpResponse::Ok().json(stats))
}

// ─── users ───────────────────────────────────────────────────────────────────

/// GET /api/admin/users
pub async fn list_users(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req)?;
    let active = match query.status_term().as_deref() {
        Some("active") => Some(true),
        Some("inactive") => Some(false),
        Some(other) => {
            return Err(ApiError::Validation(format!("Unknown status: {}", other)))
        }
        None => None,
    };
    let filter = UserFilter {
        search: query.search_term(),
        role: parse_term(query.role_term(), Role::parse, "role")?,
        active,
        ..Default::default()
    };
    let page_req = query.page_request(USER_SORTS);
    let (users, total) = data.store.list_users(&filter, &page_req).await?;
    let page = Page::new(users, total, &page_req).map_items(|u| UserProfile::from(&u));
    Ok(HttpResponse::Ok().json(page))
}

/// GET /api/admin/users/{id}
pub async fn get_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req)?;
    let user = load_user(data.store.as_ref(), &path).await?;
    let projects: Vec<ProjectView> = data
        .store
        .projects_for_member(&user.id)
        .await?
        .into_iter()
        .filter_map(|p| {
            let role = p.role_of(&user.id)?;
            Some(ProjectView {
                project: p,
                user_role: role,
            })
        })
        .collect();
    let owned_projects = projects
        .iter()
        .filter(|p| p.project.owner == user.id)
        .count();
    Ok(HttpResponse::Ok().json(UserDetail {
        user: UserProfile::from(&user),
        projects,
        owned_projects,
    }))
}

async fn set_active(
    req: HttpRequest,
    data: web::Data<AppState>,
    user_id: String,
    active: bool,
) -> Result<HttpResponse, ApiError> {
    let admin = require_admin(&req)?;
    let target = load_user(data.store.as_ref(), &user_id).await?;
    if active {
        if !data.store.set_user_active(&target.id, true).await? {
            return Err(ApiError::not_found("User"));
        }
    } else {
        deactivate_guarded(data.store.as_ref(), &target.id).await?;
    }
    info!(
        "User {} {} by admin {}",
        target.id,
        if active { "activated" } else { "deactivated" },
        admin.id
    );
    let user = load_user(data.store.as_ref(), &target.id).await?;
    Ok(HttpResponse::Ok().json(UserProfile::from(&user)))
}

/// PUT /api/admin/users/{id}/activate
pub async fn activate_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    set_active(req, data, path.into_inner(), true).await
}

/// PUT /api/admin/users/{id}/deactivate
pub async fn deactivate_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    set_active(req, data, path.into_inner(), false).await
}

/// DELETE /api/admin/users/{id}
/// Removes the account, the projects it owns and its memberships and requests.
pub async fn delete_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let admin = require_admin(&req)?;
    let store = data.store.as_ref();
    let target = load_user(store, &path).await?;
    // 0) Lock the account; this is where the last-admin check happens
    deactivate_guarded(store, &target.id).await?;

    // 1) Owned projects go with their tasks, events and requests
    let owned: Vec<String> = store
        .projects_for_member(&target.id)
        .await?
        .into_iter()
        .filter(|p| p.owner == target.id)
        .map(|p| p.id)
        .collect();
    for project_id in &owned {
        delete_project_cascade(store, project_id).await?;
    }

    // 2) Memberships, requests and saved suggestions
    let memberships = store.remove_user_from_projects(&target.id).await?;
    let requests = store.delete_user_requests(&target.id).await?;
    store.clear_suggestions(&target.id).await?;

    // 3) The account itself
    if !store.delete_user(&target.id).await? {
        return Err(ApiError::not_found("User"));
    }
    info!(
        "User {} deleted by admin {} ({} projects, {} memberships, {} requests)",
        target.id,
        admin.id,
        owned.len(),
        memberships,
        requests
    );
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "User deleted",
        "deletedProjects": owned.len()
    })))
}

// ─── projects ────────────────────────────────────────────────────────────────

/// GET /api/admin/projects
pub async fn list_projects(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req)?;
    let filter = ProjectFilter {
        search: query.search_term(),
        status: parse_term(query.status_term(), ProjectStatus::parse, "status")?,
        category: query.category_term(),
        ..Default::default()
    };
    let page_req = query.page_request(PROJECT_SORTS);
    let (projects, total) = data.store.list_projects(&filter, &page_req).await?;
    Ok(HttpResponse::Ok().json(Page::new(projects, total, &page_req)))
}

/// PUT /api/admin/projects/{id}/archive
pub async fn archive_project(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let admin = require_admin(&req)?;
    let update = ProjectUpdate {
        status: Some(ProjectStatus::Archived),
        ..Default::default()
    };
    let project = data
        .store
        .update_project(&path, &update)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    info!("Project {} archived by admin {}", project.id, admin.id);
    Ok(HttpResponse::Ok().json(project))
}

/// DELETE /api/admin/projects/{id}
pub async fn delete_project(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let admin = require_admin(&req)?;
    delete_project_cascade(data.store.as_ref(), &path)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    info!("Project {} deleted by admin {}", path, admin.id);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Project deleted" })))
}

// ─── messages ────────────────────────────────────────────────────────────────

/// GET /api/admin/messages
pub async fn list_messages(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req)?;
    let filter = MessageFilter {
        search: query.search_term(),
        flagged: query.flagged,
        ..Default::default()
    };
    let page_req = query.page_request(MESSAGE_SORTS);
    let (messages, total) = data.store.list_messages(&filter, &page_req).await?;
    Ok(HttpResponse::Ok().json(Page::new(messages, total, &page_req)))
}

async fn set_flag(
    req: HttpRequest,
    data: web::Data<AppState>,
    message_id: String,
    flagged: bool,
) -> Result<HttpResponse, ApiError> {
    let admin = require_admin(&req)?;
    if !data.store.set_message_flag(&message_id, flagged).await? {
        return Err(ApiError::not_found("Message"));
    }
    info!(
        "Message {} {} by admin {}",
        message_id,
        if flagged { "flagged" } else { "unflagged" },
        admin.id
    );
    let message = data
        .store
        .find_message(&message_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message"))?;
    Ok(HttpResponse::Ok().json(message))
}

/// PUT /api/admin/messages/{id}/flag
pub async fn flag_message(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    set_flag(req, data, path.into_inner(), true).await
}

/// PUT /api/admin/messages/{id}/unflag
pub async fn unflag_message(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    set_flag(req, data, path.into_inner(), false).await
}

/// DELETE /api/admin/messages/{id}
pub async fn delete_message(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let admin = require_admin(&req)?;
    if !data.store.delete_message(&path).await? {
        return Err(ApiError::not_found("Message"));
    }
    info!("Message {} deleted by admin {}", path, admin.id);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Message deleted" })))
}

// ─── collaborations ──────────────────────────────────────────────────────────

/// GET /api/admin/collaborations
pub async fn list_collaborations(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req)?;
    let filter = RequestFilter {
        status: parse_term(query.status_term(), RequestStatus::parse, "status")?,
    };
    let page_req = query.page_request(REQUEST_SORTS);
    let (requests, total) = data.store.list_requests(&filter, &page_req).await?;
    let views = build_request_views(data.store.as_ref(), &requests).await?;
    Ok(HttpResponse::Ok().json(Page::new(views, total, &page_req)))
}
