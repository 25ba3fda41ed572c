use actix_multipart::Multipart;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use chrono::Utc;
use futures_util::StreamExt;
use log::{debug, info};

use crate::app_state::AppState;
use crate::chat_server::{Notification, Notify};
use crate::conversations::{find_or_create, load_for_participant};
use crate::error::ApiError;
use crate::middleware::{current_user, AuthUser};
use crate::models::message::{MarkReadRequest, ReactionRequest, SendMessageRequest};
use crate::models::{new_id, Message, Reaction};
use crate::uploads::{read_multipart, MultipartForm};

const MAX_JSON_BODY: usize = 256 * 1024;

async fn read_json_body(mut payload: web::Payload) -> Result<SendMessageRequest, ApiError> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?;
        if body.len() + chunk.len() > MAX_JSON_BODY {
            return Err(ApiError::Validation("Request body is too large".into()));
        }
        body.extend_from_slice(&chunk);
    }
    serde_json::from_slice(&body).map_err(|e| ApiError::Validation(format!("Invalid request body: {}", e)))
}

fn from_form(form: &MultipartForm) -> SendMessageRequest {
    SendMessageRequest {
        conversation_id: form.text("conversationId"),
        recipient: form.text("recipient"),
        subject: form.text("subject"),
        content: form.text("content").unwrap_or_default(),
    }
}

async fn append_message(
    data: &AppState,
    caller: &AuthUser,
    request: SendMessageRequest,
    form: Option<&MultipartForm>,
) -> Result<Message, ApiError> {
    let attachments: Vec<_> = form
        .map(|f| f.files.iter().map(|u| u.attachment.clone()).collect())
        .unwrap_or_default();
    let content = request.content.trim().to_string();
    if content.is_empty() && attachments.is_empty() {
        return Err(ApiError::Validation("Message content is required".into()));
    }
    let subject = request
        .subject
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    // 1) Resolve the conversation: explicit id, or the pair with the recipient
    let conversation = match (request.conversation_id, request.recipient) {
        (Some(conversation_id), _) => {
            load_for_participant(data.store.as_ref(), &conversation_id, &caller.id).await?
        }
        (None, Some(recipient)) => {
            if recipient == caller.id {
                return Err(ApiError::Validation("You cannot message yourself".into()));
            }
            let target = data
                .store
                .find_user(&recipient)
                .await?
                .ok_or_else(|| ApiError::not_found("Recipient"))?;
            let (conversation, created) = find_or_create(
                data.store.as_ref(),
                vec![caller.id.clone(), target.id],
                subject.clone(),
            )
            .await?;
            if created {
                info!("Conversation created {} for direct message", conversation.id);
            }
            conversation
        }
        (None, None) => {
            return Err(ApiError::Validation(
                "conversationId or recipient is required".into(),
            ))
        }
    };

    // 2) Append, then mark the summary stale
    let now = Utc::now();
    let message = Message {
        id: new_id(),
        conversation: conversation.id.clone(),
        sender: caller.id.clone(),
        recipient: conversation.counterpart(&caller.id).map(str::to_string),
        subject: subject.or_else(|| conversation.subject.clone()),
        content,
        attachments,
        reactions: Vec::new(),
        read_by: Vec::new(),
        flagged: false,
        created_at: now,
    };
    data.store.insert_message(&message).await?;
    data.store.touch_conversation(&conversation.id, now).await?;
    info!("Message {} appended to {}", message.id, conversation.id);

    // 3) Push to everyone else
    let others: Vec<String> = conversation
        .participants
        .iter()
        .filter(|p| **p != caller.id)
        .cloned()
        .collect();
    data.chat_server.do_send(Notify {
        user_ids: others,
        notification: Notification::NewMessage {
            conversation_id: conversation.id.clone(),
            message: message.clone(),
        },
    });

    Ok(message)
}

/// POST /api/messages
/// Accepts JSON or multipart/form-data with files under `attachments`.
pub async fn send_message(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;

    let message = if req.content_type().starts_with("multipart/") {
        let form = read_multipart(Multipart::new(req.headers(), payload), &data.config).await?;
        let request = from_form(&form);
        match append_message(&data, &caller, request, Some(&form)).await {
            Ok(m) => m,
            Err(e) => {
                form.discard().await;
                return Err(e);
            }
        }
    } else {
        let request = read_json_body(payload).await?;
        debug!("Send message by {}: {:?}", caller.id, request);
        append_message(&data, &caller, request, None).await?
    };

    Ok(HttpResponse::Created().json(message))
}

/// GET /api/messages
/// Everything the caller sent or received, newest first.
pub async fn list_messages(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let messages = data.store.messages_for_user(&caller.id).await?;
    Ok(HttpResponse::Ok().json(messages))
}

/// PATCH /api/messages
pub async fn mark_read(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<MarkReadRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    if payload.message_ids.is_empty() {
        return Err(ApiError::Validation("messageIds is required".into()));
    }
    let modified = data.store.mark_read(&payload.message_ids, &caller.id).await?;
    debug!("{} marked {} messages read", caller.id, modified);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "modified": modified })))
}

/// GET /api/messages/thread/{id}
/// `{id}` is a conversation id, or the other user of a direct thread.
pub async fn get_thread(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let id = path.into_inner();

    let conversation = match data.store.find_conversation(&id).await? {
        Some(c) => Some(load_for_participant(data.store.as_ref(), &c.id, &caller.id).await?),
        None => {
            let pair = crate::models::Conversation::normalize_participants(vec![
                caller.id.clone(),
                id,
            ]);
            data.store.find_conversation_with(&pair).await?
        }
    };
    let messages = match conversation {
        Some(c) => data.store.conversation_messages(&c.id).await?,
        None => Vec::new(),
    };
    Ok(HttpResponse::Ok().json(messages))
}

/// GET /api/messages/unread/count
pub async fn unread_count(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let ids: Vec<String> = data
        .store
        .conversations_for_user(&caller.id)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    let count = if ids.is_empty() {
        0
    } else {
        data.store.count_unread(&ids, &caller.id).await?
    };
    Ok(HttpResponse::Ok().json(serde_json::json!({ "count": count })))
}

/// POST /api/messages/{id}/reactions
/// One reaction per user and emoji; repeats leave the message unchanged.
pub async fn add_reaction(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<ReactionRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let message_id = path.into_inner();
    let emoji = payload.emoji.trim().to_string();
    if emoji.is_empty() {
        return Err(ApiError::Validation("emoji is required".into()));
    }

    let message = data
        .store
        .find_message(&message_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message"))?;
    load_for_participant(data.store.as_ref(), &message.conversation, &caller.id).await?;

    let reaction = Reaction {
        user: caller.id.clone(),
        emoji,
        created_at: Utc::now(),
    };
    let updated = data
        .store
        .add_reaction(&message_id, &reaction)
        .await?
        .ok_or_else(|| ApiError::not_found("Message"))?;
    Ok(HttpResponse::Ok().json(updated))
}

/// DELETE /api/messages/conversations/{id}
pub async fn delete_conversation(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let conversation = load_for_participant(data.store.as_ref(), &path, &caller.id).await?;

    let deleted = data
        .store
        .delete_conversation_messages(&conversation.id)
        .await?;
    data.store.delete_conversation(&conversation.id).await?;
    info!(
        "Conversation {} deleted by {} ({} messages)",
        conversation.id, caller.id, deleted
    );
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Conversation deleted",
        "deletedMessages": deleted
    })))
}
