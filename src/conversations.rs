use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{debug, info};

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::middleware::current_user;
use crate::models::conversation::{ConversationThread, ConversationView, CreateConversationRequest};
use crate::models::{new_id, Conversation, UserSummary};
use crate::store::{Store, StoreResult};

/// Hides a summary that newer messages have made stale.
fn presentable(mut conversation: Conversation) -> Conversation {
    if conversation.ai_summary_needs_update {
        conversation.ai_summary = None;
    }
    conversation
}

pub async fn build_views(
    store: &dyn Store,
    conversations: Vec<Conversation>,
    user_id: &str,
) -> StoreResult<Vec<ConversationView>> {
    let mut ids: Vec<String> = conversations
        .iter()
        .flat_map(|c| c.participants.iter().cloned())
        .collect();
    ids.sort();
    ids.dedup();
    let users: HashMap<String, UserSummary> = store
        .find_users(&ids)
        .await?
        .iter()
        .map(|u| (u.id.clone(), UserSummary::from(u)))
        .collect();

    let mut views = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let unread_count = store
            .count_unread(std::slice::from_ref(&conversation.id), user_id)
            .await?;
        let participant_details = conversation
            .participants
            .iter()
            .map(|id| {
                users
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| UserSummary::unknown(id))
            })
            .collect();
        views.push(ConversationView {
            conversation: presentable(conversation),
            participant_details,
            unread_count,
        });
    }
    Ok(views)
}

/// Returns the conversation for exactly this participant set, creating it if
/// needed. The flag says whether it was created.
pub async fn find_or_create(
    store: &dyn Store,
    participants: Vec<String>,
    subject: Option<String>,
) -> StoreResult<(Conversation, bool)> {
    let participants = Conversation::normalize_participants(participants);
    if let Some(existing) = store.find_conversation_with(&participants).await? {
        return Ok((existing, false));
    }
    let now = Utc::now();
    let conversation = Conversation {
        id: new_id(),
        participants,
        subject,
        ai_summary: None,
        ai_summary_generated_at: None,
        ai_summary_needs_update: false,
        last_message_at: None,
        created_at: now,
        updated_at: now,
    };
    store.insert_conversation(&conversation).await?;
    Ok((conversation, true))
}

/// Loads a conversation the caller takes part in.
pub async fn load_for_participant(
    store: &dyn Store,
    conversation_id: &str,
    user_id: &str,
) -> Result<Conversation, ApiError> {
    let conversation = store
        .find_conversation(conversation_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Conversation"))?;
    if !conversation.has_participant(user_id) {
        return Err(ApiError::Forbidden(
            "You are not a participant in this conversation".into(),
        ));
    }
    Ok(conversation)
}

/// GET /api/conversations
pub async fn list_conversations(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let conversations = data.store.conversations_for_user(&caller.id).await?;
    let views = build_views(data.store.as_ref(), conversations, &caller.id).await?;
    Ok(HttpResponse::Ok().json(views))
}

/// POST /api/conversations
/// Reuses the conversation with the same participant set when one exists.
pub async fn create_conversation(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateConversationRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let payload = payload.into_inner();
    debug!("Create conversation by {}: {:?}", caller.id, payload);

    let mut participants = payload.participants;
    participants.push(caller.id.clone());
    let participants = Conversation::normalize_participants(participants);
    if participants.len() < 2 {
        return Err(ApiError::Validation(
            "A conversation needs at least one other participant".into(),
        ));
    }
    let found = data.store.find_users(&participants).await?;
    if found.len() != participants.len() {
        return Err(ApiError::not_found("User"));
    }

    let subject = payload
        .subject
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let (conversation, created) = find_or_create(data.store.as_ref(), participants, subject).await?;
    if created {
        info!("Conversation created {} by {}", conversation.id, caller.id);
    }

    let view = build_views(data.store.as_ref(), vec![conversation], &caller.id)
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal("conversation view missing".into()))?;
    let mut resp = if created {
        HttpResponse::Created()
    } else {
        HttpResponse::Ok()
    };
    Ok(resp.json(view))
}

/// GET /api/conversations/{id}
pub async fn get_conversation(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let conversation = load_for_participant(data.store.as_ref(), &path, &caller.id).await?;
    let messages = data.store.conversation_messages(&conversation.id).await?;
    let view = build_views(data.store.as_ref(), vec![conversation], &caller.id)
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal("conversation view missing".into()))?;
    Ok(HttpResponse::Ok().json(ConversationThread {
        conversation: view,
        messages,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[actix_web::test]
    async fn same_participants_in_any_order_share_a_conversation() {
        let store = MemoryStore::new();
        let (first, created) = find_or_create(&store, vec!["b".into(), "a".into()], None)
            .await
            .unwrap();
        assert!(created);
        let (second, created) = find_or_create(&store, vec!["a".into(), "b".into(), "a".into()], None)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn stale_summary_is_not_presented() {
        let now = Utc::now();
        let c = Conversation {
            id: "c".into(),
            participants: vec!["a".into(), "b".into()],
            subject: None,
            ai_summary: Some("old".into()),
            ai_summary_generated_at: Some(now),
            ai_summary_needs_update: true,
            last_message_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(presentable(c).ai_summary, None);
    }
}
