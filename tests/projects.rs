#[macro_use]
mod common;

use actix_web::http::StatusCode;
use serde_json::json;

use common::{call, create_project, delete, get, patch, post, put, register};

#[actix_web::test]
async fn owner_sees_project_with_owner_role() {
    let ctx = common::ctx();
    let app = app!(ctx);
    let ada = register(&app, "Ada", "ada@example.com").await;

    // legacy clients send `name` instead of `title`
    let req = post("/api/projects", &ada.token, json!({ "name": "Engine", "description": "Analytical" })).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "Engine");
    assert_eq!(body["userRole"], "owner");
    assert_eq!(body["status"], "active");

    let (_, body) = call(&app, get("/api/projects", &ada.token).to_request()).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let req = post("/api/projects", &ada.token, json!({ "description": "untitled" })).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn outsiders_cannot_read_or_edit() {
    let ctx = common::ctx();
    let app = app!(ctx);
    let ada = register(&app, "Ada", "ada@example.com").await;
    let eve = register(&app, "Eve", "eve@example.com").await;
    let project = create_project(&app, &ada, "Engine").await;

    let path = format!("/api/projects/{}", project);
    let (status, _) = call(&app, get(&path, &eve.token).to_request()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, patch(&path, &eve.token, json!({ "title": "Mine" })).to_request()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, delete(&path, &eve.token).to_request()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, get("/api/projects/missing", &ada.token).to_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn owner_updates_content_and_status() {
    let ctx = common::ctx();
    let app = app!(ctx);
    let ada = register(&app, "Ada", "ada@example.com").await;
    let project = create_project(&app, &ada, "Engine").await;
    let path = format!("/api/projects/{}", project);

    let req = patch(&path, &ada.token, json!({ "status": "completed", "category": "hardware" })).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["category"], "hardware");

    let (status, _) = call(&app, patch(&path, &ada.token, json!({})).to_request()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn deleting_a_project_removes_its_tasks() {
    let ctx = common::ctx();
    let app = app!(ctx);
    let ada = register(&app, "Ada", "ada@example.com").await;
    let project = create_project(&app, &ada, "Engine").await;

    let req = post("/api/tasks", &ada.token, json!({ "title": "Gears", "project": project })).to_request();
    let (status, task) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = call(&app, delete(&format!("/api/projects/{}", project), &ada.token).to_request()).await;
    assert_eq!(status, StatusCode::OK);

    let task_path = format!("/api/tasks/{}", task["_id"].as_str().unwrap());
    let (status, _) = call(&app, put(&task_path, &ada.token, json!({ "completed": true })).to_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn tasks_default_to_the_caller() {
    let ctx = common::ctx();
    let app = app!(ctx);
    let ada = register(&app, "Ada", "ada@example.com").await;
    let eve = register(&app, "Eve", "eve@example.com").await;

    let req = post("/api/tasks", &ada.token, json!({ "title": "Write notes" })).to_request();
    let (status, task) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["assignedTo"], ada.id.as_str());
    assert_eq!(task["createdBy"], ada.id.as_str());
    assert_eq!(task["completed"], false);

    let (_, mine) = call(&app, get("/api/tasks", &ada.token).to_request()).await;
    assert_eq!(mine.as_array().map(Vec::len), Some(1));
    let (_, theirs) = call(&app, get("/api/tasks", &eve.token).to_request()).await;
    assert_eq!(theirs.as_array().map(Vec::len), Some(0));

    // naming someone else does not reveal their personal tasks
    let snoop = format!("/api/tasks?assignedTo={}", ada.id);
    let (status, theirs) = call(&app, get(&snoop, &eve.token).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(theirs.as_array().map(Vec::len), Some(0));
    let (_, mine) = call(&app, get(&snoop, &ada.token).to_request()).await;
    assert_eq!(mine.as_array().map(Vec::len), Some(1));

    let path = format!("/api/tasks/{}", task["_id"].as_str().unwrap());

    // existence, then permission, then payload
    let (status, _) = call(&app, put("/api/tasks/nope", &ada.token, json!({})).to_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, put(&path, &eve.token, json!({ "completed": true })).to_request()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, put(&path, &ada.token, json!({})).to_request()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&app, put(&path, &ada.token, json!({ "completed": true })).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completed"], true);
    assert_eq!(body["title"], "Write notes");

    let (status, _) = call(&app, delete(&path, &ada.token).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, delete(&path, &ada.token).to_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn project_task_listing_requires_membership() {
    let ctx = common::ctx();
    let app = app!(ctx);
    let ada = register(&app, "Ada", "ada@example.com").await;
    let eve = register(&app, "Eve", "eve@example.com").await;
    let project = create_project(&app, &ada, "Engine").await;

    let req = post("/api/tasks", &eve.token, json!({ "title": "Sneak", "project": project })).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // nor can a personal task be moved in
    let req = post("/api/tasks", &eve.token, json!({ "title": "Sneak later" })).to_request();
    let (_, task) = call(&app, req).await;
    let task_path = format!("/api/tasks/{}", task["_id"].as_str().unwrap());
    let (status, _) = call(&app, put(&task_path, &eve.token, json!({ "project": project })).to_request()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let path = format!("/api/tasks?project={}", project);
    let (status, _) = call(&app, get(&path, &eve.token).to_request()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = call(&app, get(&path, &ada.token).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(0));
}

#[actix_web::test]
async fn events_validate_range_and_scope_to_creator() {
    let ctx = common::ctx();
    let app = app!(ctx);
    let ada = register(&app, "Ada", "ada@example.com").await;
    let eve = register(&app, "Eve", "eve@example.com").await;

    let req = post(
        "/api/events",
        &ada.token,
        json!({ "title": "Review", "start": "2024-05-02T10:00:00Z", "end": "2024-05-02T09:00:00Z" }),
    )
    .to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = post(
        "/api/events",
        &ada.token,
        json!({ "title": "Review", "start": "2024-05-02T10:00:00Z", "end": "2024-05-02T11:00:00Z" }),
    )
    .to_request();
    let (status, event) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = call(&app, get("/api/events", &ada.token).to_request()).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    let (_, body) = call(&app, get("/api/events", &eve.token).to_request()).await;
    assert_eq!(body.as_array().map(Vec::len), Some(0));

    let path = format!("/api/events/{}", event["_id"].as_str().unwrap());
    let (status, _) = call(&app, delete(&path, &eve.token).to_request()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, delete(&path, &ada.token).to_request()).await;
    assert_eq!(status, StatusCode::OK);
}
