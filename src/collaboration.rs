use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{debug, error, info, warn};

use crate::app_state::AppState;
use crate::chat_server::{Notification, Notify};
use crate::error::ApiError;
use crate::middleware::current_user;
use crate::models::collaboration::{
    ProjectSummary, RequestView, RequestsOverview, SendRequestPayload,
};
use crate::models::{
    new_id, CollaborationRequest, Collaborator, RequestStatus, UserSummary,
};
use crate::store::{Store, StoreResult};

/// Populates user and project references; missing ones become placeholders.
pub async fn build_request_views(
    store: &dyn Store,
    requests: &[CollaborationRequest],
) -> StoreResult<Vec<RequestView>> {
    let mut user_ids: Vec<String> = requests
        .iter()
        .flat_map(|r| [r.sender.clone(), r.receiver.clone()])
        .collect();
    user_ids.sort();
    user_ids.dedup();
    let mut project_ids: Vec<String> = requests.iter().map(|r| r.project.clone()).collect();
    project_ids.sort();
    project_ids.dedup();

    let users: HashMap<String, UserSummary> = store
        .find_users(&user_ids)
        .await?
        .iter()
        .map(|u| (u.id.clone(), UserSummary::from(u)))
        .collect();
    let projects: HashMap<String, ProjectSummary> = store
        .find_projects(&project_ids)
        .await?
        .into_iter()
        .map(|p| {
            (
                p.id.clone(),
                ProjectSummary {
                    id: p.id,
                    title: p.title,
                },
            )
        })
        .collect();

    let user = |id: &str| users.get(id).cloned().unwrap_or_else(|| UserSummary::unknown(id));
    Ok(requests
        .iter()
        .map(|r| RequestView {
            id: r.id.clone(),
            sender: user(&r.sender),
            receiver: user(&r.receiver),
            project: projects
                .get(&r.project)
                .cloned()
                .unwrap_or_else(|| ProjectSummary::unknown(&r.project)),
            role: r.role,
            message: r.message.clone(),
            status: r.status,
            created_at: r.created_at,
            responded_at: r.responded_at,
        })
        .collect())
}

/// POST /api/collaborations/request
/// An owner inviting someone, or someone asking the owner to join.
pub async fn send_request(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<SendRequestPayload>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let payload = payload.into_inner();
    debug!("Collaboration request by {}: {:?}", caller.id, payload);

    if payload.receiver_id.trim().is_empty() || payload.project_id.trim().is_empty() {
        return Err(ApiError::Validation("projectId and receiverId are required".into()));
    }
    if payload.receiver_id == caller.id {
        return Err(ApiError::Validation(
            "You cannot send a request to yourself".into(),
        ));
    }

    // 1) Validate both parties against the project
    let receiver = data
        .store
        .find_user(&payload.receiver_id)
        .await?
        .filter(|u| u.active)
        .ok_or_else(|| ApiError::not_found("Receiver"))?;
    let project = data
        .store
        .find_project(&payload.project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;
    let invitation = project.owner == caller.id;
    if !invitation && project.owner != receiver.id {
        return Err(ApiError::Forbidden(
            "Requests must involve the project owner".into(),
        ));
    }
    let joining = if invitation { &receiver.id } else { &caller.id };
    if project.is_member(joining) {
        return Err(ApiError::Conflict(
            "User is already a member of this project".into(),
        ));
    }

    // 2) One pending request per sender, receiver and project
    if data
        .store
        .find_pending_request(&caller.id, &receiver.id, &project.id)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "A pending request already exists".into(),
        ));
    }

    let now = Utc::now();
    let request = CollaborationRequest {
        id: new_id(),
        sender: caller.id.clone(),
        receiver: receiver.id.clone(),
        project: project.id.clone(),
        role: payload.role,
        message: payload
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty()),
        status: RequestStatus::Pending,
        created_at: now,
        updated_at: now,
        responded_at: None,
    };
    data.store.insert_request(&request).await?;
    info!(
        "Collaboration request {} from {} to {} on {}",
        request.id, request.sender, request.receiver, request.project
    );

    data.chat_server.do_send(Notify {
        user_ids: vec![receiver.id],
        notification: Notification::CollaborationRequest {
            request_id: request.id.clone(),
            project_id: request.project.clone(),
            sender_id: request.sender.clone(),
        },
    });

    let view = build_request_views(data.store.as_ref(), std::slice::from_ref(&request))
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal("request view missing".into()))?;
    Ok(HttpResponse::Created().json(view))
}

async fn respond(
    req: HttpRequest,
    data: web::Data<AppState>,
    request_id: String,
    decision: RequestStatus,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;

    let request = data
        .store
        .find_request(&request_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Request"))?;
    if request.receiver != caller.id {
        return Err(ApiError::Forbidden(
            "Only the receiver can respond to this request".into(),
        ));
    }
    if request.status != RequestStatus::Pending {
        return Err(ApiError::Conflict(format!(
            "Request has already been {}",
            request.status.as_str()
        )));
    }

    let project = match decision {
        RequestStatus::Accepted => Some(
            data.store
                .find_project(&request.project)
                .await?
                .ok_or_else(|| ApiError::not_found("Project"))?,
        ),
        _ => None,
    };

    // 1) Conditional transition; losing a race means someone else responded
    let now = Utc::now();
    let updated = data
        .store
        .transition_request(&request.id, RequestStatus::Pending, decision, now)
        .await?
        .ok_or_else(|| ApiError::Conflict("Request is no longer pending".into()))?;

    // 2) Acceptance adds the joining user; undo the transition if that fails
    if let Some(project) = project {
        let collaborator = Collaborator {
            user: updated.joining_user(&project.owner).to_string(),
            role: updated.role.into(),
            added_at: now,
        };
        let added = data.store.upsert_collaborator(&project.id, &collaborator).await;
        if !matches!(added, Ok(true)) {
            error!(
                "Adding collaborator for request {} failed: {:?}",
                updated.id, added
            );
            if let Err(e) = data
                .store
                .transition_request(&updated.id, RequestStatus::Accepted, RequestStatus::Pending, now)
                .await
            {
                warn!("Rolling back request {} failed: {}", updated.id, e);
            }
            return Err(match added {
                Err(e) => e.into(),
                Ok(_) => ApiError::not_found("Project"),
            });
        }
        info!(
            "User {} joined project {} as {}",
            collaborator.user,
            project.id,
            updated.role.as_str()
        );
    }

    info!("Request {} {}", updated.id, updated.status.as_str());
    data.chat_server.do_send(Notify {
        user_ids: vec![updated.sender.clone()],
        notification: Notification::CollaborationResolved {
            request_id: updated.id.clone(),
            project_id: updated.project.clone(),
            status: updated.status,
        },
    });

    let view = build_request_views(data.store.as_ref(), std::slice::from_ref(&updated))
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal("request view missing".into()))?;
    Ok(HttpResponse::Ok().json(view))
}

/// PUT /api/collaborations/accept/{id}
pub async fn accept_request(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    respond(req, data, path.into_inner(), RequestStatus::Accepted).await
}

/// PUT /api/collaborations/reject/{id}
pub async fn reject_request(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    respond(req, data, path.into_inner(), RequestStatus::Rejected).await
}

/// GET /api/collaborations/requests
pub async fn list_requests(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let requests = data.store.requests_for_user(&caller.id).await?;
    let views = build_request_views(data.store.as_ref(), &requests).await?;

    let mut overview = RequestsOverview::default();
    for view in views {
        if view.receiver.id == caller.id {
            overview.incoming.push(view);
        } else {
            overview.outgoing.push(view);
        }
    }
    Ok(HttpResponse::Ok().json(overview))
}
