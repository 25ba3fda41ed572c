use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{debug, info};

use crate::app_state::AppState;
use crate::chat_server::{Notification, Notify};
use crate::error::ApiError;
use crate::middleware::current_user;
use crate::models::event::{CreateEventRequest, EventFilter};
use crate::models::{new_id, CalendarEvent, ProjectRole};
use crate::project::load_membership;

/// POST /api/events
/// Creates an event and notifies the other members of its project.
pub async fn create_event(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateEventRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let payload = payload.into_inner();
    debug!("Create event by {}: {:?}", caller.id, payload);

    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::Validation("Event title is required".into()));
    }
    if let Some(end) = payload.end {
        if end < payload.start {
            return Err(ApiError::Validation("Event cannot end before it starts".into()));
        }
    }

    let project = payload.project.filter(|p| !p.trim().is_empty());
    let mut recipients = Vec::new();
    if let Some(project_id) = &project {
        let (p, _) = load_membership(data.store.as_ref(), project_id, &caller.id).await?;
        recipients = p
            .member_ids()
            .into_iter()
            .filter(|id| *id != caller.id)
            .collect();
    }

    let event = CalendarEvent {
        id: new_id(),
        title,
        description: payload.description.unwrap_or_default(),
        start: payload.start,
        end: payload.end,
        all_day: payload.all_day,
        project,
        created_by: caller.id.clone(),
        created_at: Utc::now(),
    };
    data.store.insert_event(&event).await?;
    info!("Event created {} by {}", event.id, caller.id);

    if !recipients.is_empty() {
        data.chat_server.do_send(Notify {
            user_ids: recipients,
            notification: Notification::CalendarEvent {
                event: event.clone(),
            },
        });
    }

    Ok(HttpResponse::Created().json(event))
}

/// GET /api/events?project=
/// Project events for members; otherwise the caller's own events.
pub async fn list_events(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<EventFilter>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let filter = match query.into_inner().project.filter(|p| !p.trim().is_empty()) {
        Some(project_id) => {
            load_membership(data.store.as_ref(), &project_id, &caller.id).await?;
            EventFilter {
                project: Some(project_id),
                created_by: None,
            }
        }
        None => EventFilter {
            project: None,
            created_by: Some(caller.id.clone()),
        },
    };
    let events = data.store.find_events(&filter).await?;
    Ok(HttpResponse::Ok().json(events))
}

/// DELETE /api/events/{id}
/// Creator or project owner only.
pub async fn delete_event(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let event_id = path.into_inner();

    let event = data
        .store
        .find_event(&event_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event"))?;

    let mut allowed = event.created_by == caller.id;
    if !allowed {
        if let Some(project_id) = &event.project {
            if let Some(project) = data.store.find_project(project_id).await? {
                allowed = project.role_of(&caller.id) == Some(ProjectRole::Owner);
            }
        }
    }
    if !allowed {
        return Err(ApiError::Forbidden(
            "You do not have permission to delete this event".into(),
        ));
    }

    data.store.delete_event(&event_id).await?;
    info!("Event {} deleted by {}", event_id, caller.id);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Event deleted" })))
}
