//! Compute backends that host user workspaces.
//!
//! Three backends implement [`Backend`]:
//! - **Local** Kubernetes, the cluster this service runs in
//! - **External** Kubernetes, an EKS cluster in the pay model's account
//! - **Managed-container**, an ECS service in the pay model's account
//!
//! The two Kubernetes flavours share one implementation and differ only in
//! how they reach the cluster ([`kubernetes::ClusterSource`]).

use async_trait::async_trait;
use ws_config::ContainerDefinition;
use ws_core::{BackendKind, PayModel, Result};

pub mod aws;
pub mod ecs;
pub mod external;
pub mod kubernetes;
pub mod license;
pub mod local;
pub mod mapper;
pub mod status;

#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;

pub use status::{CanonicalStatus, ConditionView, ContainerState, ContainerStateView, WorkspaceStatus};

/// Who a backend call acts for.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceTarget {
    pub user: String,

    /// Bearer token of the caller, forwarded where a backend needs it.
    pub access_token: Option<String>,

    /// Current pay model, if the user has one.
    pub paymodel: Option<PayModel>,
}

impl WorkspaceTarget {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Default::default()
        }
    }

    pub fn with_paymodel(mut self, paymodel: Option<PayModel>) -> Self {
        self.paymodel = paymodel;
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }
}

/// A launch request resolved against the app registry.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub target: WorkspaceTarget,
    pub app_id: String,
    pub workspace_id: String,
    pub definition: ContainerDefinition,
}

impl LaunchSpec {
    pub fn new(target: WorkspaceTarget, app_id: &str, definition: ContainerDefinition) -> Self {
        let workspace_id = ws_core::workspace_id(&target.user, app_id);
        Self {
            target,
            app_id: app_id.to_string(),
            workspace_id,
            definition,
        }
    }
}

/// One compute backend.
///
/// `create` returns once the backend accepted the workload, not when it is
/// running. `terminate` starts teardown; callers poll `status` until the
/// workspace reports [`CanonicalStatus::NotFound`].
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn create(&self, spec: &LaunchSpec) -> Result<()>;

    /// Remove one workspace, or every workspace of the user when
    /// `workspace_id` is `None`. Removing something already gone succeeds.
    async fn terminate(&self, target: &WorkspaceTarget, workspace_id: Option<&str>) -> Result<()>;

    /// Every workspace the user currently has on this backend.
    async fn status(&self, target: &WorkspaceTarget) -> Result<Vec<WorkspaceStatus>>;
}
