//! The managed-container backend: one ECS service per workspace, in the
//! pay model's account.
//!
//! Status here is coarse. The backend only knows whether the service exists
//! and what ECS says about it; see [`normalize_service_status`].

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};
use ws_config::limit_parser::{fargate_cpu_units, mebibytes};
use ws_config::ContainerRegistry;
use ws_core::{workspace_id, BackendKind, PayModel, Result, WsError};

use crate::mapper::RouteLayout;
use crate::status::{normalize_service_status, CanonicalStatus, WorkspaceStatus};
use crate::{Backend, LaunchSpec, WorkspaceTarget};

mod aws;

pub use self::aws::EcsContainerService;

/// Everything needed to run one workspace as a Fargate service.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    /// Service name and task family; the workspace id.
    pub name: String,
    pub image: String,
    pub cpu_units: u64,
    pub memory_mib: u64,
    pub port: u16,
    pub command: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// ECS service name plus its raw status, `None` when it does not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceState {
    pub name: String,
    pub status: Option<String>,
}

/// The container platform as seen from one pay model account.
#[async_trait]
pub trait ContainerService: Send + Sync {
    /// Register the task and start its service unless it is already active.
    async fn ensure_service(&self, paymodel: &PayModel, task: &TaskSpec) -> Result<()>;

    async fn describe_services(&self, paymodel: &PayModel, names: &[String]) -> Result<Vec<ServiceState>>;

    /// Delete the service. Deleting a missing service succeeds.
    async fn delete_service(&self, paymodel: &PayModel, name: &str) -> Result<()>;
}

pub struct ManagedContainerBackend {
    service: Arc<dyn ContainerService>,
    registry: ContainerRegistry,
    layout: RouteLayout,
}

impl ManagedContainerBackend {
    pub fn new(service: Arc<dyn ContainerService>, registry: ContainerRegistry, layout: RouteLayout) -> Self {
        Self {
            service,
            registry,
            layout,
        }
    }

    fn paymodel<'a>(&self, target: &'a WorkspaceTarget) -> Result<&'a PayModel> {
        target.paymodel.as_ref().ok_or_else(|| {
            WsError::Backend("Managed-container workspaces need a current pay model".into())
        })
    }

    /// Workspace ids the user could have, one per app definition.
    fn candidate_ids(&self, user: &str) -> Vec<(String, String)> {
        self.registry
            .iter()
            .map(|(app_id, _)| (workspace_id(user, app_id), app_id.clone()))
            .collect()
    }
}

pub fn task_spec(spec: &LaunchSpec) -> Result<TaskSpec> {
    let def = &spec.definition;
    let mut env: Vec<(String, String)> = def.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    env.push(("WORKSPACE_USER".into(), spec.target.user.clone()));
    env.push(("WORKSPACE_ID".into(), spec.workspace_id.clone()));
    env.push(("WORKSPACE_APP".into(), spec.app_id.clone()));

    Ok(TaskSpec {
        name: spec.workspace_id.clone(),
        image: def.image.clone(),
        cpu_units: fargate_cpu_units(def.cpu_millis()?),
        memory_mib: mebibytes(def.memory_bytes()?),
        port: def.target_port,
        command: def.command.clone(),
        env,
    })
}

#[async_trait]
impl Backend for ManagedContainerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ManagedContainer
    }

    #[instrument(skip_all, fields(user = %spec.target.user, workspace = %spec.workspace_id))]
    async fn create(&self, spec: &LaunchSpec) -> Result<()> {
        let paymodel = self.paymodel(&spec.target)?;
        let task = task_spec(spec)?;
        self.service.ensure_service(paymodel, &task).await?;
        info!(account = %paymodel.aws_account_id, "Managed-container workspace started");
        Ok(())
    }

    #[instrument(skip_all, fields(user = %target.user))]
    async fn terminate(&self, target: &WorkspaceTarget, workspace_id: Option<&str>) -> Result<()> {
        let paymodel = self.paymodel(target)?;
        let names: Vec<String> = match workspace_id {
            Some(id) => vec![id.to_string()],
            None => self.candidate_ids(&target.user).into_iter().map(|(id, _)| id).collect(),
        };
        for name in &names {
            self.service.delete_service(paymodel, name).await?;
        }
        info!(count = names.len(), "Managed-container workspaces deleted");
        Ok(())
    }

    #[instrument(skip_all, level = "debug", fields(user = %target.user))]
    async fn status(&self, target: &WorkspaceTarget) -> Result<Vec<WorkspaceStatus>> {
        let paymodel = self.paymodel(target)?;
        let candidates = self.candidate_ids(&target.user);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let names: Vec<String> = candidates.iter().map(|(id, _)| id.clone()).collect();
        let states = self.service.describe_services(paymodel, &names).await?;

        let mut statuses = Vec::new();
        for (id, app_id) in candidates {
            let raw = states
                .iter()
                .find(|s| s.name == id)
                .and_then(|s| s.status.as_deref());
            let status = normalize_service_status(raw);
            if status == Some(CanonicalStatus::NotFound) {
                continue;
            }
            statuses.push(WorkspaceStatus {
                status,
                url: Some(self.layout.url(&id)),
                workspace_id: Some(id),
                app_id: Some(app_id),
                ..Default::default()
            });
        }
        Ok(statuses)
    }
}
