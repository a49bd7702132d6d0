//! Common test utilities and helpers for ws-api tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;
use ws_api::{create_app, AppState};
use ws_config::ContainerDefinition;
use ws_orchestrator::test_utils::{definition, AllowNames, TestHarness};
use ws_orchestrator::Authorizer;

pub fn apps() -> Vec<ContainerDefinition> {
    vec![
        definition("Notebook", "quay.io/lab/notebook:1.0"),
        definition("RStudio", "quay.io/lab/rstudio:4.3"),
        definition("Desktop", "quay.io/lab/desktop:2.0"),
    ]
}

pub fn app_id(name: &str) -> String {
    apps()
        .into_iter()
        .find(|d| d.name == name)
        .map(|d| d.id())
        .expect("unknown test app")
}

pub struct TestClient {
    pub app: Router,
    pub harness: TestHarness,
}

impl TestClient {
    pub async fn new() -> Self {
        Self::from_harness(TestHarness::new(&apps()).await)
    }

    pub async fn allowing(names: &[&str]) -> Self {
        let authorizer: Arc<dyn Authorizer> =
            Arc::new(AllowNames(names.iter().map(|n| n.to_string()).collect()));
        Self::from_harness(TestHarness::with_authorizer(&apps(), authorizer).await)
    }

    fn from_harness(harness: TestHarness) -> Self {
        let state = AppState::new(harness.dispatcher.clone(), Some(harness.store.pool().clone()));
        Self {
            app: create_app(state),
            harness,
        }
    }

    pub async fn send(&self, method: &str, uri: &str, user: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", "Bearer test-token");
        if let Some(user) = user {
            builder = builder.header("remote_user", user);
        }
        let request = builder.body(Body::empty()).unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, user: Option<&str>) -> Response<Body> {
        self.send("GET", uri, user).await
    }

    pub async fn post(&self, uri: &str, user: Option<&str>) -> Response<Body> {
        self.send("POST", uri, user).await
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    String::from_utf8(body.to_vec()).expect("Body is not UTF-8")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    serde_json::from_slice(&body).expect("Failed to deserialize JSON")
}
