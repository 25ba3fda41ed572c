#[macro_use]
mod common;

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;

use collabmate::ai::{AiError, AiProvider, SuggestionRequest, TranscriptLine};
use collabmate::ai_endpoints::SUMMARY_RACE_MESSAGE;
use collabmate::models::Suggestion;
use collabmate::store::Store;

use common::{authed, call, delete, get, patch, post, register};

/// Summarizer during which another message lands in `conversation`.
struct BusyConversation {
    store: Arc<dyn Store>,
    conversation: Mutex<Option<String>>,
}

#[async_trait]
impl AiProvider for BusyConversation {
    async fn summarize(&self, transcript: &[TranscriptLine]) -> Result<String, AiError> {
        let busy = self.conversation.lock().clone();
        if let Some(id) = busy {
            self.store
                .touch_conversation(&id, Utc::now())
                .await
                .expect("touch");
        }
        Ok(format!("{} lines", transcript.len()))
    }

    async fn suggest(&self, _request: &SuggestionRequest) -> Result<Vec<Suggestion>, AiError> {
        Ok(Vec::new())
    }
}

#[actix_web::test]
async fn opening_the_same_pair_twice_reuses_the_conversation() {
    let ctx = common::ctx();
    let app = app!(ctx);
    let ada = register(&app, "Ada", "ada@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;

    let req = post("/api/conversations", &ada.token, json!({ "participants": [bob.id] })).to_request();
    let (status, first) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["participantDetails"].as_array().map(Vec::len), Some(2));

    let req = post("/api/conversations", &bob.token, json!({ "participants": [ada.id, bob.id] })).to_request();
    let (status, second) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["_id"], second["_id"]);

    let req = post("/api/conversations", &ada.token, json!({ "participants": [] })).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = post("/api/conversations", &ada.token, json!({ "participants": ["ghost"] })).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn messages_flow_through_unread_counts_and_reads() {
    let ctx = common::ctx();
    let app = app!(ctx);
    let ada = register(&app, "Ada", "ada@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;

    // direct message by recipient opens the pair conversation
    let req = post("/api/messages", &ada.token, json!({ "recipient": bob.id, "content": "Hi Bob" })).to_request();
    let (status, message) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["recipient"], bob.id.as_str());
    let conversation_id = message["conversation"].as_str().unwrap().to_string();

    let req = post(
        "/api/messages",
        &ada.token,
        json!({ "conversationId": conversation_id, "content": "Are you there?" }),
    )
    .to_request();
    let (status, second) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = call(&app, get("/api/messages/unread/count", &bob.token).to_request()).await;
    assert_eq!(body["count"], 2);
    let (_, body) = call(&app, get("/api/messages/unread/count", &ada.token).to_request()).await;
    assert_eq!(body["count"], 0);

    let (_, list) = call(&app, get("/api/conversations", &bob.token).to_request()).await;
    assert_eq!(list[0]["unreadCount"], 2);

    let req = patch("/api/messages", &bob.token, json!({ "messageIds": [message["_id"], second["_id"]] })).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modified"], 2);
    let (_, body) = call(&app, get("/api/messages/unread/count", &bob.token).to_request()).await;
    assert_eq!(body["count"], 0);

    let req = patch("/api/messages", &bob.token, json!({ "messageIds": [] })).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // thread by the other user's id resolves the pair
    let (status, thread) = call(&app, get(&format!("/api/messages/thread/{}", ada.id), &bob.token).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread.as_array().map(Vec::len), Some(2));
    assert_eq!(thread[0]["content"], "Hi Bob");

    let (_, inbox) = call(&app, get("/api/messages", &bob.token).to_request()).await;
    assert_eq!(inbox.as_array().map(Vec::len), Some(2));
}

#[actix_web::test]
async fn message_needs_content_and_a_target() {
    let ctx = common::ctx();
    let app = app!(ctx);
    let ada = register(&app, "Ada", "ada@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;

    let req = post("/api/messages", &ada.token, json!({ "recipient": bob.id, "content": "   " })).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = post("/api/messages", &ada.token, json!({ "content": "to nobody" })).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = post("/api/messages", &ada.token, json!({ "recipient": ada.id, "content": "me" })).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn outsiders_cannot_read_or_post() {
    let ctx = common::ctx();
    let app = app!(ctx);
    let ada = register(&app, "Ada", "ada@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;
    let eve = register(&app, "Eve", "eve@example.com").await;

    let req = post("/api/messages", &ada.token, json!({ "recipient": bob.id, "content": "secret" })).to_request();
    let (_, message) = call(&app, req).await;
    let conversation_id = message["conversation"].as_str().unwrap();

    let path = format!("/api/conversations/{}", conversation_id);
    let (status, _) = call(&app, get(&path, &eve.token).to_request()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = post("/api/messages", &eve.token, json!({ "conversationId": conversation_id, "content": "hi" })).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, thread) = call(&app, get(&path, &bob.token).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread["messages"].as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
async fn reactions_are_unique_per_user_and_emoji() {
    let ctx = common::ctx();
    let app = app!(ctx);
    let ada = register(&app, "Ada", "ada@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;

    let req = post("/api/messages", &ada.token, json!({ "recipient": bob.id, "content": "ship it" })).to_request();
    let (_, message) = call(&app, req).await;
    let path = format!("/api/messages/{}/reactions", message["_id"].as_str().unwrap());

    let (status, body) = call(&app, post(&path, &bob.token, json!({ "emoji": "🚀" })).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reactions"].as_array().map(Vec::len), Some(1));

    let (_, body) = call(&app, post(&path, &bob.token, json!({ "emoji": "🚀" })).to_request()).await;
    assert_eq!(body["reactions"].as_array().map(Vec::len), Some(1));

    let (_, body) = call(&app, post(&path, &ada.token, json!({ "emoji": "🚀" })).to_request()).await;
    assert_eq!(body["reactions"].as_array().map(Vec::len), Some(2));
}

#[actix_web::test]
async fn summary_goes_stale_on_new_messages() {
    let ctx = common::ctx();
    let app = app!(ctx);
    let ada = register(&app, "Ada", "ada@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;

    let req = post("/api/conversations", &ada.token, json!({ "participants": [bob.id] })).to_request();
    let (_, conversation) = call(&app, req).await;
    let conversation_id = conversation["_id"].as_str().unwrap().to_string();

    // nothing to summarize yet
    let req = post("/api/ai/chat/summarize", &ada.token, json!({ "conversationId": conversation_id })).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = post(
        "/api/messages",
        &ada.token,
        json!({ "conversationId": conversation_id, "content": "Kickoff on Monday" }),
    )
    .to_request();
    call(&app, req).await;

    let req = post("/api/ai/chat/summarize", &bob.token, json!({ "conversationId": conversation_id })).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["summary"].as_str().is_some_and(|s| s.contains("Kickoff")));

    let path = format!("/api/conversations/{}", conversation_id);
    let (_, thread) = call(&app, get(&path, &ada.token).to_request()).await;
    assert_eq!(thread["aiSummaryNeedsUpdate"], false);
    assert!(thread["aiSummary"].is_string());

    let req = post(
        "/api/messages",
        &bob.token,
        json!({ "conversationId": conversation_id, "content": "Works for me" }),
    )
    .to_request();
    call(&app, req).await;
    let (_, thread) = call(&app, get(&path, &ada.token).to_request()).await;
    assert_eq!(thread["aiSummaryNeedsUpdate"], true);
    assert!(thread["aiSummary"].is_null());
}

#[actix_web::test]
async fn summary_is_not_marked_fresh_when_a_message_lands_mid_request() {
    let mut ctx = common::ctx();
    let summarizer = Arc::new(BusyConversation {
        store: ctx.state.store.clone(),
        conversation: Mutex::new(None),
    });
    ctx.state.ai = summarizer.clone() as Arc<dyn AiProvider>;
    let app = app!(ctx);
    let ada = register(&app, "Ada", "ada@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;

    let req = post("/api/messages", &ada.token, json!({ "recipient": bob.id, "content": "Kickoff" })).to_request();
    let (_, message) = call(&app, req).await;
    let conversation_id = message["conversation"].as_str().unwrap().to_string();
    *summarizer.conversation.lock() = Some(conversation_id.clone());

    let req = post("/api/ai/chat/summarize", &ada.token, json!({ "conversationId": conversation_id })).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], SUMMARY_RACE_MESSAGE);

    let path = format!("/api/conversations/{}", conversation_id);
    let (_, thread) = call(&app, get(&path, &ada.token).to_request()).await;
    assert_eq!(thread["aiSummaryNeedsUpdate"], true);
    assert!(thread["aiSummary"].is_null());

    // a quiet retry goes through
    *summarizer.conversation.lock() = None;
    let req = post("/api/ai/chat/summarize", &ada.token, json!({ "conversationId": conversation_id })).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], "1 lines");
    let (_, thread) = call(&app, get(&path, &ada.token).to_request()).await;
    assert_eq!(thread["aiSummaryNeedsUpdate"], false);
}

#[actix_web::test]
async fn deleting_a_conversation_removes_its_messages() {
    let ctx = common::ctx();
    let app = app!(ctx);
    let ada = register(&app, "Ada", "ada@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;

    for text in ["one", "two", "three"] {
        let req = post("/api/messages", &ada.token, json!({ "recipient": bob.id, "content": text })).to_request();
        call(&app, req).await;
    }
    let (_, list) = call(&app, get("/api/conversations", &ada.token).to_request()).await;
    let conversation_id = list[0]["_id"].as_str().unwrap().to_string();

    let path = format!("/api/messages/conversations/{}", conversation_id);
    let (status, body) = call(&app, delete(&path, &bob.token).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deletedMessages"], 3);

    let (_, list) = call(&app, get("/api/conversations", &ada.token).to_request()).await;
    assert_eq!(list.as_array().map(Vec::len), Some(0));
}

#[actix_web::test]
async fn multipart_message_carries_attachments() {
    let ctx = common::ctx();
    let app = app!(ctx);
    let ada = register(&app, "Ada", "ada@example.com").await;
    let bob = register(&app, "Bob", "bob@example.com").await;

    let boundary = "collabmate-boundary";
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"recipient\"\r\n\r\n\
         {recipient}\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"attachments\"; filename=\"notes.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         meeting notes\r\n\
         --{b}--\r\n",
        b = boundary,
        recipient = bob.id,
    );
    let req = authed(TestRequest::post().uri("/api/messages"), &ada.token)
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={}", boundary),
        ))
        .set_payload(body)
        .to_request();
    let (status, message) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{}", message);
    assert_eq!(message["content"], "");
    let attachment = &message["attachments"][0];
    assert_eq!(attachment["filename"], "notes.txt");
    assert_eq!(attachment["size"], 13);
    assert!(attachment["url"].as_str().is_some_and(|u| u.starts_with("/uploads/")));
}
