use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};

use crate::ai::{SuggestionRequest, TranscriptLine};
use crate::app_state::AppState;
use crate::conversations::load_for_participant;
use crate::error::ApiError;
use crate::middleware::current_user;

pub const SUMMARY_RACE_MESSAGE: &str =
    "New messages arrived while summarizing, please try again";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    pub conversation_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub conversation_id: String,
    pub summary: String,
    pub generated_at: chrono::DateTime<Utc>,
}

/// POST /api/ai/chat/summarize
/// Regenerates the conversation summary and clears its stale flag.
pub async fn summarize_conversation(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<SummarizeRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let conversation =
        load_for_participant(data.store.as_ref(), &payload.conversation_id, &caller.id).await?;

    let messages = data.store.conversation_messages(&conversation.id).await?;
    if messages.is_empty() {
        return Err(ApiError::Validation("Conversation has no messages".into()));
    }
    let names: HashMap<String, String> = data
        .store
        .find_users(&conversation.participants)
        .await?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();
    let transcript: Vec<TranscriptLine> = messages
        .iter()
        .map(|m| TranscriptLine {
            speaker: names
                .get(&m.sender)
                .cloned()
                .unwrap_or_else(|| "Unknown user".to_string()),
            content: m.content.clone(),
        })
        .collect();

    let summary = data.ai.summarize(&transcript).await?;
    let generated_at = Utc::now();
    let stored = data
        .store
        .set_conversation_summary(
            &conversation.id,
            &summary,
            generated_at,
            conversation.last_message_at,
        )
        .await?;
    if stored.is_none() {
        // Either deleted meanwhile or a message arrived; the flag stays set.
        return match data.store.find_conversation(&conversation.id).await? {
            Some(_) => Err(ApiError::Conflict(SUMMARY_RACE_MESSAGE.into())),
            None => Err(ApiError::not_found("Conversation")),
        };
    }
    info!("Summary regenerated for {}", conversation.id);

    Ok(HttpResponse::Ok().json(SummaryResponse {
        conversation_id: conversation.id,
        summary,
        generated_at,
    }))
}

/// POST /api/ai/get-suggestions
/// Missing skills or interests are taken from the caller's profile.
pub async fn get_suggestions(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<SuggestionRequest>,
) -> Result<HttpResponse, ApiError> {
    let caller = current_user(&req)?;
    let mut request = payload.into_inner();

    if request.skills.is_empty() || request.interests.is_empty() {
        if let Some(user) = data.store.find_user(&caller.id).await? {
            if request.skills.is_empty() {
                request.skills = user.skills.into_iter().map(|s| s.name).collect();
            }
            if request.interests.is_empty() {
                request.interests = user.interests;
            }
        }
    }

    let suggestions = data.ai.suggest(&request).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "suggestions": suggestions })))
}
