use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{debug, info};

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::middleware::{current_user, AuthUser};
use crate::models::task::{CreateTaskRequest, TaskFilter, UpdateTaskRequest};
use crate::models::{new_id, Task};
use crate::project::load_membership;
use crate::store::Store;

/// Assignee, creator, or any member of the task's project. The same rule
/// decides who may see a task and who may change it.
async fn can_access(store: &dyn Store, task: &Task, caller_id: &str) -> Result<bool, ApiError> {
    if task.assigned_to == caller_id || task.created_by == caller_id {
        return Ok(true);
    }
    if let Some(project_id) = &task.project {
        if let Some(project) = store.find_project(project_id).await? {
            return Ok(project.is_member(caller_id));
        }
    }
    Ok(false)
}

async fn ensure_can_modify(store: &dyn Store, task: &Task, caller: &AuthUser) -> Result<(), ApiError> {
    if can_access(store, task, &caller.id).await? {
        return Ok(());
    }
    Err(ApiError::Forbidden(
        "You do not have permission to modify this task".into(),
    ))
}

/// POST /api/tasks
pub async fn create_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let payload = payload.into_inner();
    debug!("Create task by {}: {:?}", caller.id, payload);

    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::Validation("Task title is required".into()));
    }
    let project = payload.project.filter(|p| !p.trim().is_empty());
    if let Some(project_id) = &project {
        load_membership(data.store.as_ref(), project_id, &caller.id).await?;
    }

    let now = Utc::now();
    let task = Task {
        id: new_id(),
        title,
        description: payload.description.unwrap_or_default(),
        due_date: payload.due_date,
        project,
        assigned_to: payload
            .assigned_to
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| caller.id.clone()),
        created_by: caller.id.clone(),
        completed: payload.completed.unwrap_or(false),
        created_at: now,
        updated_at: now,
    };
    data.store.insert_task(&task).await?;
    info!("Task created {} assigned to {}", task.id, task.assigned_to);

    Ok(HttpResponse::Created().json(task))
}

/// GET /api/tasks?project=&assignedTo=
/// Without filters, the caller's own assignments. Someone else's assignments
/// only include tasks the caller could open anyway.
pub async fn list_tasks(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<TaskFilter>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let mut filter = query.into_inner();

    match &filter.project {
        Some(project_id) => {
            load_membership(data.store.as_ref(), project_id, &caller.id).await?;
        }
        None => {
            if filter.assigned_to.is_none() {
                filter.assigned_to = Some(caller.id.clone());
            }
        }
    }

    let tasks = data.store.find_tasks(&filter).await?;
    if filter.project.is_some() || filter.assigned_to.as_deref() == Some(caller.id.as_str()) {
        return Ok(HttpResponse::Ok().json(tasks));
    }

    let mut visible = Vec::with_capacity(tasks.len());
    for task in tasks {
        if can_access(data.store.as_ref(), &task, &caller.id).await? {
            visible.push(task);
        }
    }
    Ok(HttpResponse::Ok().json(visible))
}

/// PUT /api/tasks/{id}
pub async fn update_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let task_id = path.into_inner();
    let update = payload.into_inner();

    // 1) Existence first, then permission, then the payload
    let task = data
        .store
        .find_task(&task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;
    ensure_can_modify(data.store.as_ref(), &task, &caller).await?;

    if update.is_empty() {
        return Err(ApiError::Validation("No fields to update".into()));
    }
    if let Some(title) = &update.title {
        if title.trim().is_empty() {
            return Err(ApiError::Validation("Task title is required".into()));
        }
    }
    if let Some(assignee) = &update.assigned_to {
        if assignee.trim().is_empty() {
            return Err(ApiError::Validation("assignedTo cannot be empty".into()));
        }
    }
    // moving a task into a project needs membership there too
    if let Some(target) = update.project.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        if task.project.as_deref() != Some(target) {
            load_membership(data.store.as_ref(), target, &caller.id).await?;
        }
    }

    let updated = data
        .store
        .update_task(&task_id, &update)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;
    info!("Task {} updated by {}", task_id, caller.id);
    Ok(HttpResponse::Ok().json(updated))
}

/// DELETE /api/tasks/{id}
pub async fn delete_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let task_id = path.into_inner();

    let task = data
        .store
        .find_task(&task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;
    ensure_can_modify(data.store.as_ref(), &task, &caller).await?;

    if !data.store.delete_task(&task_id).await? {
        return Err(ApiError::not_found("Task"));
    }
    info!("Task {} deleted by {}", task_id, caller.id);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Task deleted" })))
}
