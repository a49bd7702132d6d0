//! Who may launch which app.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};
use ws_config::{AuthzSettings, ContainerDefinition};

use crate::error::{OrchestratorError, Result};

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn is_authorized(
        &self,
        user: &str,
        token: Option<&str>,
        definition: &ContainerDefinition,
    ) -> Result<bool>;
}

/// Used when no policy service is configured: only unrestricted apps pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticAuthorizer;

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn is_authorized(
        &self,
        _user: &str,
        _token: Option<&str>,
        definition: &ContainerDefinition,
    ) -> Result<bool> {
        Ok(definition.authz_resource.is_none())
    }
}

/// Asks the policy service whether the caller's token grants the app's resource.
#[derive(Debug, Clone)]
pub struct PolicyServiceAuthorizer {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct AuthResponse {
    #[serde(default)]
    auth: bool,
}

impl PolicyServiceAuthorizer {
    pub fn new(settings: &AuthzSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| OrchestratorError::Authorization(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: format!("{}/auth/request", settings.url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Authorizer for PolicyServiceAuthorizer {
    #[instrument(skip(self, token, definition), fields(app = %definition.name), level = "debug")]
    async fn is_authorized(
        &self,
        user: &str,
        token: Option<&str>,
        definition: &ContainerDefinition,
    ) -> Result<bool> {
        let Some(resource) = definition.authz_resource.as_deref() else {
            return Ok(true);
        };
        let Some(token) = token else {
            debug!("No access token, denying restricted app");
            return Ok(false);
        };

        let body = json!({
            "requests": [{
                "resource": resource,
                "action": {"service": "workspace", "method": "launch"}
            }]
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| OrchestratorError::Authorization(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(OrchestratorError::Authorization(format!(
                "policy service answered {status}"
            )));
        }

        let answer: AuthResponse = response
            .json()
            .await
            .map_err(|e| OrchestratorError::Authorization(e.to_string()))?;
        debug!(granted = answer.auth, "Policy decision");
        Ok(answer.auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app(resource: Option<&str>) -> ContainerDefinition {
        let mut def: ContainerDefinition = serde_json::from_value(json!({
            "name": "Notebook",
            "image": "quay.io/lab/notebook:1.0",
            "cpu_limit": "1",
            "memory_limit": "2Gi"
        }))
        .unwrap();
        def.authz_resource = resource.map(str::to_string);
        def
    }

    fn authorizer(server: &MockServer) -> PolicyServiceAuthorizer {
        PolicyServiceAuthorizer::new(&AuthzSettings {
            url: format!("{}/", server.uri()),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_static_allows_only_unrestricted() {
        let authz = StaticAuthorizer;
        assert!(authz.is_authorized("alice", None, &app(None)).await.unwrap());
        assert!(!authz
            .is_authorized("alice", Some("t"), &app(Some("/workspace/gpu")))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_policy_service_grant_and_deny() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/request"))
            .and(header("authorization", "Bearer good"))
            .and(body_partial_json(json!({
                "requests": [{"resource": "/workspace/gpu", "action": {"method": "launch"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"auth": true})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/request"))
            .and(header("authorization", "Bearer bad"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"auth": false})))
            .mount(&server)
            .await;

        let authz = authorizer(&server);
        let gpu = app(Some("/workspace/gpu"));
        assert!(authz.is_authorized("alice", Some("good"), &gpu).await.unwrap());
        assert!(!authz.is_authorized("alice", Some("bad"), &gpu).await.unwrap());
    }

    #[tokio::test]
    async fn test_policy_service_skipped_when_not_needed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"auth": true})))
            .expect(0)
            .mount(&server)
            .await;

        let authz = authorizer(&server);
        assert!(authz.is_authorized("alice", None, &app(None)).await.unwrap());
        assert!(!authz
            .is_authorized("alice", None, &app(Some("/workspace/gpu")))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_policy_service_failure_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = authorizer(&server)
            .is_authorized("alice", Some("t"), &app(Some("/workspace/gpu")))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Authorization(_)));
    }
}
