//! Integration tests for `/api/v1/projects`.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, body_text, delete, get, new_project_body, post_json, TestApp};
use roomcraft_pipeline::testing::{CallKind, Reply, ScriptedModel};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

async fn run_to_completion(app: &TestApp, id: &str) {
    app.orchestrator
        .run(id.parse().unwrap(), CancellationToken::new())
        .await
        .unwrap();
}

/// Poll `GET /projects/{id}` until the status is terminal.
async fn wait_terminal(app: &TestApp, id: &str) -> Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let json = body_json(get(app.router.clone(), &format!("/api/v1/projects/{id}")).await).await;
        let status = json["data"]["status"].as_str().unwrap().to_string();
        if status == "completed" || status == "error" {
            return json["data"].clone();
        }
        assert!(tokio::time::Instant::now() < deadline, "run did not finish");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// ---------------------------------------------------------------------------
// Create / read
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_returns_pending_project() {
    let app = TestApp::new(ScriptedModel::new());
    let response = post_json(app.router.clone(), "/api/v1/projects", new_project_body()).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    let project = &json["data"];
    assert_eq!(project["status"], "pending");
    assert_eq!(project["name"], "japandi kitchen");
    assert_eq!(project["budget"], 2000.0);
    assert!(project["generations"].as_array().unwrap().is_empty());

    let id = project["id"].as_str().unwrap();
    let fetched = body_json(get(app.router.clone(), &format!("/api/v1/projects/{id}")).await).await;
    assert_eq!(fetched["data"]["id"], id);
}

#[tokio::test]
async fn create_rejects_invalid_input() {
    let app = TestApp::new(ScriptedModel::new());
    let mut body = new_project_body();
    body["style"] = json!("   ");

    let response = post_json(app.router.clone(), "/api/v1/projects", body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_project_is_404() {
    let app = TestApp::new(ScriptedModel::new());
    let response = get(
        app.router.clone(),
        "/api/v1/projects/01890a5d-ac96-774b-bcce-b302099a8057",
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn list_is_scoped_to_owner() {
    let app = TestApp::new(ScriptedModel::new());
    app.create_project().await;
    app.create_project().await;
    let mut other = new_project_body();
    other["owner_id"] = json!("owner-2");
    post_json(app.router.clone(), "/api/v1/projects", other).await;

    let json = body_json(get(app.router.clone(), "/api/v1/projects?owner_id=owner-1").await).await;
    let projects = json["data"].as_array().unwrap();
    assert_eq!(projects.len(), 2);
    assert!(projects.iter().all(|p| p["owner_id"] == "owner-1"));
}

#[tokio::test]
async fn delete_removes_project() {
    let app = TestApp::new(ScriptedModel::new());
    let id = app.create_project().await;
    let path = format!("/api/v1/projects/{id}");

    assert_eq!(delete(app.router.clone(), &path).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(get(app.router.clone(), &path).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(delete(app.router.clone(), &path).await.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn embedded_worker_completes_created_project() {
    let app = TestApp::with_worker(ScriptedModel::happy_path(8));
    let id = app.create_project().await;

    let project = wait_terminal(&app, &id).await;

    assert_eq!(project["status"], "completed");
    assert_eq!(project["plan"].as_array().unwrap().len(), 8);
    assert!(!project["products"].as_array().unwrap().is_empty());
    assert_eq!(project["generations"].as_array().unwrap().len(), 1);
    assert_eq!(app.model.call_count(CallKind::Render), 1);
    app.stop().await;
}

#[tokio::test]
async fn blocked_render_surfaces_as_error_status() {
    let model = ScriptedModel::happy_path(8).on(CallKind::Render, Reply::Blocked);
    let app = TestApp::with_worker(model);
    let id = app.create_project().await;

    let project = wait_terminal(&app, &id).await;

    assert_eq!(project["status"], "error");
    assert!(project["error"].as_str().unwrap().contains("content policy"));
    assert!(project["generations"].as_array().unwrap().is_empty());
    app.stop().await;
}

// ---------------------------------------------------------------------------
// Generations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn regenerate_appends_to_completed_project() {
    let app = TestApp::new(ScriptedModel::happy_path(8));
    let id = app.create_project().await;
    run_to_completion(&app, &id).await;

    let response = post_json(
        app.router.clone(),
        &format!("/api/v1/projects/{id}/generations"),
        json!({ "instruction": "Warmer lighting, more plants" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let generation = body_json(response).await["data"].clone();
    assert!(generation["prompt"].as_str().unwrap().contains("Warmer lighting, more plants"));

    let project = body_json(get(app.router.clone(), &format!("/api/v1/projects/{id}")).await).await;
    assert_eq!(project["data"]["generations"].as_array().unwrap().len(), 2);
    assert_eq!(project["data"]["status"], "completed");
}

#[tokio::test]
async fn regenerate_refused_before_completion() {
    let app = TestApp::new(ScriptedModel::happy_path(8));
    let id = app.create_project().await;

    let response = post_json(
        app.router.clone(),
        &format!("/api/v1/projects/{id}/generations"),
        json!({}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
    assert_eq!(app.model.call_count(CallKind::Render), 0);
}

#[tokio::test]
async fn delete_generation_is_independent() {
    let app = TestApp::new(ScriptedModel::happy_path(8));
    let id = app.create_project().await;
    run_to_completion(&app, &id).await;
    let project = body_json(get(app.router.clone(), &format!("/api/v1/projects/{id}")).await).await;
    let generation_id = project["data"]["generations"][0]["id"].as_str().unwrap().to_string();
    let path = format!("/api/v1/projects/{id}/generations/{generation_id}");

    assert_eq!(delete(app.router.clone(), &path).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(delete(app.router.clone(), &path).await.status(), StatusCode::NOT_FOUND);

    let project = body_json(get(app.router.clone(), &format!("/api/v1/projects/{id}")).await).await;
    assert_eq!(project["data"]["status"], "completed");
    assert!(project["data"]["generations"].as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn events_of_finished_project_are_a_single_snapshot() {
    let app = TestApp::new(ScriptedModel::happy_path(8));
    let id = app.create_project().await;
    run_to_completion(&app, &id).await;

    let response = get(app.router.clone(), &format!("/api/v1/projects/{id}/events")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    let body = body_text(response).await;
    assert!(body.contains("event: project.snapshot"));
    assert!(body.contains("\"status\":\"completed\""));
}

#[tokio::test]
async fn events_stream_follows_a_run_to_its_end() {
    let app = TestApp::new(ScriptedModel::happy_path(8));
    let id = app.create_project().await;

    let response = get(app.router.clone(), &format!("/api/v1/projects/{id}/events")).await;
    assert_eq!(response.status(), StatusCode::OK);
    run_to_completion(&app, &id).await;

    let body = tokio::time::timeout(Duration::from_secs(5), body_text(response))
        .await
        .expect("stream ends after the terminal event");
    let order: Vec<&str> = body
        .lines()
        .filter_map(|l| l.strip_prefix("event: "))
        .collect();
    assert_eq!(
        order,
        [
            "project.snapshot",
            "project.generating",
            "project.plan_ready",
            "project.products_ready",
            "project.completed",
        ]
    );
}

#[tokio::test]
async fn events_of_unknown_project_are_404() {
    let app = TestApp::new(ScriptedModel::new());
    let response = get(
        app.router.clone(),
        "/api/v1/projects/01890a5d-ac96-774b-bcce-b302099a8057/events",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
