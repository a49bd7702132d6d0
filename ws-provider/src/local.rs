//! The in-cluster backend: workspaces run next to the launcher itself.

use async_trait::async_trait;
use std::sync::Arc;
use ws_core::{BackendKind, Result};

use crate::kubernetes::{ClusterHandle, ClusterSource, KubeClient, KubernetesBackend};
use crate::mapper::ServiceMapper;
use crate::WorkspaceTarget;

/// A fixed cluster connection shared by every caller.
#[derive(Debug, Clone)]
pub struct InClusterSource {
    handle: ClusterHandle,
}

impl InClusterSource {
    pub fn new(client: KubeClient, namespace: impl Into<String>) -> Self {
        Self {
            handle: ClusterHandle {
                client,
                namespace: namespace.into(),
            },
        }
    }
}

#[async_trait]
impl ClusterSource for InClusterSource {
    async fn connect(&self, _target: &WorkspaceTarget) -> Result<ClusterHandle> {
        Ok(self.handle.clone())
    }
}

pub type LocalBackend = KubernetesBackend<InClusterSource>;

pub fn local_backend(
    client: KubeClient,
    namespace: impl Into<String>,
    mapper: Arc<dyn ServiceMapper>,
) -> LocalBackend {
    KubernetesBackend::new(
        BackendKind::Local,
        InClusterSource::new(client, namespace),
        mapper,
    )
}
