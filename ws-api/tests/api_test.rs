//! Integration tests for the HTTP routes
//!
//! Every test runs the full router against scripted backends and an
//! in-memory pay model store.

mod common;

use axum::http::StatusCode;
use common::{app_id, body_json, body_text, TestClient};
use ws_core::BackendKind;
use ws_orchestrator::test_utils::paymodel;
use ws_provider::CanonicalStatus;

#[tokio::test]
async fn test_launch_without_paymodel_succeeds_locally() {
    let client = TestClient::new().await;

    let response = client
        .post(&format!("/launch?id={}", app_id("Notebook")), Some("alice"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Success");
    assert_eq!(client.harness.local.create_count(), 1);
}

#[tokio::test]
async fn test_launch_on_active_ecs_is_accepted() {
    let client = TestClient::new().await;
    client
        .harness
        .seed(paymodel("alice", "pm-ecs", BackendKind::ManagedContainer, "active"))
        .await;

    let response = client
        .post(&format!("/launch?id={}", app_id("Notebook")), Some("alice"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Launch accepted");
    assert_eq!(client.harness.local.create_count(), 0);
}

#[tokio::test]
async fn test_launch_on_pending_ecs_is_refused() {
    let client = TestClient::new().await;
    client
        .harness
        .seed(paymodel("alice", "pm-ecs", BackendKind::ManagedContainer, "pending"))
        .await;

    let response = client
        .post(&format!("/launch?id={}", app_id("Notebook")), Some("alice"))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Paymodel is not active. Launch forbidden");
    assert_eq!(client.harness.managed.create_count(), 0);
}

#[tokio::test]
async fn test_launch_input_errors() {
    let client = TestClient::allowing(&["Notebook"]).await;

    let no_id = client.post("/launch", Some("alice")).await;
    assert_eq!(no_id.status(), StatusCode::BAD_REQUEST);

    let no_user = client
        .post(&format!("/launch?id={}", app_id("Notebook")), None)
        .await;
    assert_eq!(no_user.status(), StatusCode::BAD_REQUEST);

    let forbidden = client
        .post(&format!("/launch?id={}", app_id("Desktop")), Some("alice"))
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    assert_eq!(client.harness.local.create_count(), 0);
}

#[tokio::test]
async fn test_terminate_messages() {
    let client = TestClient::new().await;

    let response = client.post("/terminate", Some("alice")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Terminated workspace");
    assert_eq!(client.harness.local.terminate_count(), 1);

    client
        .harness
        .seed(paymodel("bob", "pm-ecs", BackendKind::ManagedContainer, "active"))
        .await;
    let response = client.post("/terminate?id=ws-1", Some("bob")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Terminated ECS workspace");

    let response = client.post("/terminate", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_shapes() {
    let client = TestClient::new().await;

    let response = client.get("/status", Some("alice")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "Not Found");

    client.harness.local.push_status(CanonicalStatus::Running);
    let json = body_json(client.get("/status", Some("alice")).await).await;
    assert_eq!(json["status"], "Running");
    assert_eq!(json["workspaceID"], "ws-mock");
}

#[tokio::test]
async fn test_options_filtered_by_authorization() {
    let client = TestClient::allowing(&["Notebook", "RStudio"]).await;

    let response = client.get("/options", Some("alice")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Notebook", "RStudio"]);
    assert_eq!(json[0]["id"], app_id("Notebook"));
    assert!(json[0].get("cpu-limit").is_some());
}

#[tokio::test]
async fn test_paymodels_not_found_then_current() {
    let client = TestClient::new().await;

    let response = client.get("/paymodels", Some("alice")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = client.get("/allpaymodels", Some("alice")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    client
        .harness
        .seed(paymodel("alice", "pm-eks", BackendKind::External, "active"))
        .await;

    let json = body_json(client.get("/paymodels", Some("alice")).await).await;
    assert_eq!(json["bmh_workspace_id"], "pm-eks");
    assert_eq!(json["current_pay_model"], true);

    let json = body_json(client.get("/allpaymodels", Some("alice")).await).await;
    assert_eq!(json["current_paymodel"]["bmh_workspace_id"], "pm-eks");
    assert_eq!(json["all_paymodels"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_setpaymodel_refused_while_running() {
    let client = TestClient::new().await;
    client
        .harness
        .seed(paymodel("alice", "pm-local", BackendKind::Local, "active"))
        .await;
    let mut other = paymodel("alice", "pm-ecs", BackendKind::ManagedContainer, "active");
    other.current = false;
    client.harness.seed(other).await;
    client.harness.local.push_status(CanonicalStatus::Running);

    let response = client.post("/setpaymodel?id=pm-ecs", Some("alice")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["error"],
        "Can not update paymodel when workspace is running"
    );
    assert_eq!(client.harness.current("alice").await[0].id, "pm-local");

    let missing = client.post("/setpaymodel", Some("alice")).await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_setpaymodel_and_reset_when_idle() {
    let client = TestClient::new().await;
    client
        .harness
        .seed(paymodel("alice", "pm-local", BackendKind::Local, "active"))
        .await;
    let mut other = paymodel("alice", "pm-ecs", BackendKind::ManagedContainer, "active");
    other.current = false;
    client.harness.seed(other).await;

    let response = client.post("/setpaymodel?id=pm-ecs", Some("alice")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["bmh_workspace_id"], "pm-ecs");

    let response = client.post("/resetpaymodels", Some("alice")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Current Paymodel has been reset");
    assert!(client.harness.current("alice").await.is_empty());
}

#[tokio::test]
async fn test_health_and_openapi() {
    let client = TestClient::new().await;

    let json = body_json(client.get("/health/ready", None).await).await;
    assert_eq!(json["status"], "ready");
    assert_eq!(json["database"], "connected");

    let response = client.get("/api-docs/openapi.json", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert!(doc["paths"]["/launch"].is_object());
}
