//! The external backend: an EKS cluster in the pay model's own account.
//!
//! Each call assumes a role in the account, discovers the cluster endpoint
//! and CA, and talks to it with a freshly signed bearer token.

use async_trait::async_trait;
use aws_sdk_eks::error::DisplayErrorContext;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;
use tracing::{debug, instrument};
use ws_config::ExternalSettings;
use ws_core::{BackendKind, Result, WsError};

use crate::aws::AwsSessions;
use crate::kubernetes::{ClusterHandle, ClusterSource, KubeClient, KubernetesBackend};
use crate::mapper::ServiceMapper;
use crate::WorkspaceTarget;

pub mod token;

pub use token::{eks_token, SigningKeys};

pub struct EksClusterSource {
    sessions: AwsSessions,
    settings: ExternalSettings,
    namespace: String,
}

impl EksClusterSource {
    pub fn new(sessions: AwsSessions, settings: ExternalSettings, namespace: impl Into<String>) -> Self {
        Self {
            sessions,
            settings,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl ClusterSource for EksClusterSource {
    #[instrument(skip_all, fields(user = %target.user))]
    async fn connect(&self, target: &WorkspaceTarget) -> Result<ClusterHandle> {
        let paymodel = target.paymodel.as_ref().ok_or_else(|| {
            WsError::Backend("External cluster access needs a current pay model".into())
        })?;

        let session = self
            .sessions
            .assume(&paymodel.aws_account_id, &paymodel.region, &self.settings.role_name)
            .await?;

        let eks = aws_sdk_eks::Client::new(&session.config);
        let out = eks
            .describe_cluster()
            .name(&self.settings.cluster_name)
            .send()
            .await
            .map_err(|e| {
                WsError::Aws(format!(
                    "Failed to describe cluster {}: {}",
                    self.settings.cluster_name,
                    DisplayErrorContext(&e)
                ))
            })?;

        let cluster = out
            .cluster()
            .ok_or_else(|| WsError::Aws(format!("Cluster {} not found", self.settings.cluster_name)))?;
        let endpoint = cluster
            .endpoint()
            .ok_or_else(|| WsError::Aws("Cluster has no API endpoint yet".into()))?;
        let ca_pem = cluster
            .certificate_authority()
            .and_then(|ca| ca.data())
            .map(|data| STANDARD.decode(data))
            .transpose()
            .map_err(|e| WsError::Aws(format!("Cluster CA is not valid base64: {e}")))?;

        let creds = &session.credentials;
        let keys = SigningKeys {
            access_key_id: creds.access_key_id(),
            secret_access_key: creds.secret_access_key(),
            session_token: creds.session_token(),
        };
        let token = eks_token(&self.settings.cluster_name, &session.region, &keys, chrono::Utc::now())?;
        debug!(endpoint, "Connected to external cluster");

        Ok(ClusterHandle {
            client: KubeClient::new(endpoint, Some(token), ca_pem.as_deref())?,
            namespace: self.namespace.clone(),
        })
    }
}

pub type ExternalBackend = KubernetesBackend<EksClusterSource>;

pub fn external_backend(
    sessions: AwsSessions,
    settings: ExternalSettings,
    namespace: impl Into<String>,
    mapper: Arc<dyn ServiceMapper>,
) -> ExternalBackend {
    KubernetesBackend::new(
        BackendKind::External,
        EksClusterSource::new(sessions, settings, namespace),
        mapper,
    )
}
