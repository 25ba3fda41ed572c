use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{debug, info};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::middleware::current_user;
use crate::models::project::{ProjectUpdate, ProjectView};
use crate::models::{new_id, Project, ProjectRole, ProjectStatus};
use crate::store::{Store, StoreResult};

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub title: Option<String>,
    // older clients send `name`
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CascadeReport {
    pub tasks: u64,
    pub events: u64,
    pub requests: u64,
}

/// Deletes a project together with its tasks, events and collaboration
/// requests. Returns `None` when the project did not exist.
pub async fn delete_project_cascade(store: &dyn Store, project_id: &str) -> StoreResult<Option<CascadeReport>> {
    if !store.delete_project(project_id).await? {
        return Ok(None);
    }
    Ok(Some(CascadeReport {
        tasks: store.delete_project_tasks(project_id).await?,
        events: store.delete_project_events(project_id).await?,
        requests: store.delete_project_requests(project_id).await?,
    }))
}

/// Loads a project and the caller's role in it; outsiders get 403.
pub async fn load_membership(
    store: &dyn Store,
    project_id: &str,
    user_id: &str,
) -> Result<(Project, ProjectRole), ApiError> {
    let project = store
        .find_project(project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    let role = project
        .role_of(user_id)
        .ok_or_else(|| ApiError::Forbidden("Not a member of this project".into()))?;
    Ok((project, role))
}

/// GET /api/projects
/// Projects the caller owns or collaborates on, tagged with their role.
pub async fn list_projects(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let projects = data.store.projects_for_member(&caller.id).await?;
    let views: Vec<ProjectView> = projects
        .into_iter()
        .filter_map(|p| {
            let role = p.role_of(&caller.id)?;
            Some(ProjectView {
                project: p,
                user_role: role,
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(views))
}

/// POST /api/projects
pub async fn create_project(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateProjectRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let payload = payload.into_inner();
    debug!("Create project by {}: {:?}", caller.id, payload);

    let title = payload
        .title
        .or(payload.name)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("Project title is required".into()))?;

    let now = Utc::now();
    let project = Project {
        id: new_id(),
        title,
        description: payload.description.trim().to_string(),
        category: payload
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
        status: ProjectStatus::Active,
        owner: caller.id.clone(),
        collaborators: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    data.store.insert_project(&project).await?;
    info!("Project created {} by {}", project.id, caller.id);

    Ok(HttpResponse::Created().json(ProjectView {
        project,
        user_role: ProjectRole::Owner,
    }))
}

/// GET /api/projects/{id}
pub async fn get_project(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let (project, role) = load_membership(data.store.as_ref(), &path, &caller.id).await?;
    Ok(HttpResponse::Ok().json(ProjectView {
        project,
        user_role: role,
    }))
}

/// PATCH /api/projects/{id}
/// Status changes are owner-only; content edits need an editing role.
pub async fn update_project(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<ProjectUpdate>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let project_id = path.into_inner();
    let update = payload.into_inner();

    if update.is_empty() {
        return Err(ApiError::Validation("No fields to update".into()));
    }
    if let Some(title) = &update.title {
        if title.trim().is_empty() {
            return Err(ApiError::Validation("Project title is required".into()));
        }
    }

    // 1) Authorize against the caller's project role
    let (_, role) = load_membership(data.store.as_ref(), &project_id, &caller.id).await?;
    if update.status.is_some() && role != ProjectRole::Owner {
        return Err(ApiError::Forbidden(
            "Only the project owner can change its status".into(),
        ));
    }
    let edits_content =
        update.title.is_some() || update.description.is_some() || update.category.is_some();
    if edits_content && !role.can_edit() {
        return Err(ApiError::Forbidden(
            "You do not have permission to edit this project".into(),
        ));
    }

    // 2) Apply
    let project = data
        .store
        .update_project(&project_id, &update)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    info!("Project {} updated by {}", project_id, caller.id);

    Ok(HttpResponse::Ok().json(ProjectView {
        project,
        user_role: role,
    }))
}

/// DELETE /api/projects/{id}
pub async fn delete_project(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let project_id = path.into_inner();

    let (_, role) = load_membership(data.store.as_ref(), &project_id, &caller.id).await?;
    if role != ProjectRole::Owner {
        return Err(ApiError::Forbidden(
            "Only the project owner can delete it".into(),
        ));
    }

    let report = delete_project_cascade(data.store.as_ref(), &project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    info!(
        "Project {} deleted by {} ({} tasks, {} events, {} requests)",
        project_id, caller.id, report.tasks, report.events, report.requests
    );
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Project deleted" })))
}
