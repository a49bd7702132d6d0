//! Entry point for every workspace action.
//!
//! Each call resolves the user's current pay model, turns it into a
//! [`BackendKind`] and hands the action to that backend. Terminations leave a
//! [`TerminationConfirmer`] behind that resets the pay model once the backend
//! reports the workspace gone.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use ws_config::ContainerRegistry;
use ws_core::{BackendKind, PayModel};
use ws_provider::{Backend, CanonicalStatus, LaunchSpec, WorkspaceStatus, WorkspaceTarget};

use crate::authz::Authorizer;
use crate::confirm::TerminationConfirmer;
use crate::error::{OrchestratorError, Result};
use crate::resolver::{CurrentSelection, PayModelResolver, PayModelSummary};
use crate::task::BackgroundTask;

/// One driver per backend kind.
#[derive(Clone)]
pub struct Backends {
    pub local: Arc<dyn Backend>,
    pub external: Arc<dyn Backend>,
    pub managed: Arc<dyn Backend>,
}

impl Backends {
    pub fn get(&self, kind: BackendKind) -> &Arc<dyn Backend> {
        match kind {
            BackendKind::Local => &self.local,
            BackendKind::External => &self.external,
            BackendKind::ManagedContainer => &self.managed,
        }
    }
}

#[derive(Debug)]
pub enum LaunchOutcome {
    /// The backend accepted the workload before the call returned.
    Launched { workspace_id: String },
    /// Provisioning continues in the background.
    Accepted {
        workspace_id: String,
        task: BackgroundTask,
    },
}

impl LaunchOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            LaunchOutcome::Launched { .. } => "Success",
            LaunchOutcome::Accepted { .. } => "Launch accepted",
        }
    }

    pub fn workspace_id(&self) -> &str {
        match self {
            LaunchOutcome::Launched { workspace_id } | LaunchOutcome::Accepted { workspace_id, .. } => {
                workspace_id
            }
        }
    }
}

#[derive(Debug)]
pub struct Terminated {
    pub backend: BackendKind,
    /// Resets the pay model once the backend reports the workspace gone.
    pub confirmer: BackgroundTask,
}

impl Terminated {
    pub fn message(&self) -> &'static str {
        match self.backend {
            BackendKind::ManagedContainer => "Terminated ECS workspace",
            BackendKind::Local | BackendKind::External => "Terminated workspace",
        }
    }
}

/// Status answer: a single workspace, or every workspace when there are several.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum StatusReport {
    One(WorkspaceStatus),
    Many(Vec<WorkspaceStatus>),
}

/// A launchable app as listed to users.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AppOption {
    pub name: String,
    #[serde(rename = "cpu-limit")]
    pub cpu_limit: String,
    #[serde(rename = "memory-limit")]
    pub memory_limit: String,
    pub id: String,
}

#[derive(Clone)]
pub struct Dispatcher {
    backends: Backends,
    resolver: PayModelResolver,
    registry: ContainerRegistry,
    authorizer: Arc<dyn Authorizer>,
    poll_interval: Duration,
}

impl Dispatcher {
    pub fn new(
        backends: Backends,
        resolver: PayModelResolver,
        registry: ContainerRegistry,
        authorizer: Arc<dyn Authorizer>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            backends,
            resolver,
            registry,
            authorizer,
            poll_interval,
        }
    }

    pub fn resolver(&self) -> &PayModelResolver {
        &self.resolver
    }

    pub fn registry(&self) -> &ContainerRegistry {
        &self.registry
    }

    #[instrument(skip(self, token))]
    pub async fn launch(&self, user: &str, app_id: &str, token: Option<&str>) -> Result<LaunchOutcome> {
        require_user(user)?;
        if app_id.is_empty() {
            return Err(OrchestratorError::InvalidInput("Missing app id".into()));
        }
        let definition = self
            .registry
            .get(app_id)
            .ok_or_else(|| OrchestratorError::InvalidInput(format!("Unknown app id {app_id}")))?;

        if !self.authorizer.is_authorized(user, token, definition).await? {
            return Err(OrchestratorError::Forbidden(format!(
                "User {user} is not authorized to launch {}",
                definition.name
            )));
        }

        let paymodel = self.resolver.get_current(user).await?;
        let kind = BackendKind::for_paymodel(paymodel.as_ref());
        if kind == BackendKind::ManagedContainer && !paymodel.as_ref().is_some_and(PayModel::is_active) {
            return Err(OrchestratorError::PayModelInactive);
        }

        let target = target(user, token, paymodel);
        let spec = LaunchSpec::new(target, app_id, definition.clone());
        let workspace_id = spec.workspace_id.clone();
        let backend = self.backends.get(kind).clone();

        if kind == BackendKind::ManagedContainer {
            let task = BackgroundTask::spawn("managed-container-launch", async move {
                if let Err(e) = backend.create(&spec).await {
                    error!(
                        user = %spec.target.user,
                        workspace = %spec.workspace_id,
                        backend = %BackendKind::ManagedContainer,
                        "Background launch failed: {}",
                        e
                    );
                }
            });
            info!(workspace = %workspace_id, backend = %kind, "Launch accepted");
            return Ok(LaunchOutcome::Accepted { workspace_id, task });
        }

        backend.create(&spec).await?;
        info!(workspace = %workspace_id, backend = %kind, "Workspace launched");
        Ok(LaunchOutcome::Launched { workspace_id })
    }

    /// Terminate one workspace, or all of the user's when `workspace_id` is `None`.
    #[instrument(skip(self, token))]
    pub async fn terminate(
        &self,
        user: &str,
        workspace_id: Option<&str>,
        token: Option<&str>,
    ) -> Result<Terminated> {
        require_user(user)?;

        let paymodel = self.resolver.get_current(user).await?;
        let kind = BackendKind::for_paymodel(paymodel.as_ref());
        let backend = self.backends.get(kind).clone();
        let target = target(user, token, paymodel);

        backend.terminate(&target, workspace_id).await?;
        info!(backend = %kind, "Workspace termination started");

        let confirmer = TerminationConfirmer::new(backend, self.resolver.clone(), self.poll_interval)
            .spawn(target, workspace_id.map(str::to_string));
        Ok(Terminated {
            backend: kind,
            confirmer,
        })
    }

    /// Every workspace the user has on the backend of the current pay model.
    pub async fn status(&self, user: &str, token: Option<&str>) -> Result<Vec<WorkspaceStatus>> {
        require_user(user)?;

        let paymodel = self.resolver.get_current(user).await?;
        let kind = BackendKind::for_paymodel(paymodel.as_ref());
        let statuses = self
            .backends
            .get(kind)
            .status(&target(user, token, paymodel))
            .await?;
        Ok(statuses)
    }

    /// Status shaped for callers: `Not Found` when there is nothing, the
    /// workspace itself when there is one (or one was asked for), else a list.
    pub async fn summarize(
        &self,
        user: &str,
        token: Option<&str>,
        workspace_id: Option<&str>,
    ) -> Result<StatusReport> {
        let mut statuses = self.status(user, token).await?;

        if let Some(id) = workspace_id {
            let found = statuses
                .into_iter()
                .find(|s| s.workspace_id.as_deref() == Some(id))
                .unwrap_or_else(WorkspaceStatus::not_found);
            return Ok(StatusReport::One(found));
        }

        Ok(match statuses.len() {
            0 => StatusReport::One(WorkspaceStatus::not_found()),
            1 => StatusReport::One(statuses.remove(0)),
            _ => StatusReport::Many(statuses),
        })
    }

    /// Apps the caller may launch, in configuration order.
    ///
    /// A failed authorization check hides the app rather than failing the listing.
    pub async fn options(&self, user: &str, token: Option<&str>) -> Vec<AppOption> {
        let mut options = Vec::new();
        for (id, def) in self.registry.iter() {
            match self.authorizer.is_authorized(user, token, def).await {
                Ok(true) => options.push(AppOption {
                    name: def.name.clone(),
                    cpu_limit: def.cpu_limit.clone(),
                    memory_limit: def.memory_limit.clone(),
                    id: id.clone(),
                }),
                Ok(false) => {}
                Err(e) => warn!(app = %def.name, "Authorization check failed: {}", e),
            }
        }
        options
    }

    pub async fn paymodel(&self, user: &str) -> Result<PayModel> {
        require_user(user)?;
        match self.resolver.current_selection(user).await? {
            CurrentSelection::Current(pm) | CurrentSelection::Default(pm) => Ok(pm),
            CurrentSelection::Ambiguous => {
                Err(OrchestratorError::NotFound("No current pay model selected".into()))
            }
            CurrentSelection::Unconfigured => {
                Err(OrchestratorError::NotFound("No pay model configured".into()))
            }
        }
    }

    pub async fn all_paymodels(&self, user: &str) -> Result<PayModelSummary> {
        require_user(user)?;
        self.resolver
            .get_for_user(user)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound("No pay model configured".into()))
    }

    #[instrument(skip(self, token))]
    pub async fn set_paymodel(&self, user: &str, id: &str, token: Option<&str>) -> Result<PayModel> {
        require_user(user)?;
        if id.is_empty() {
            return Err(OrchestratorError::InvalidInput("Missing paymodel id".into()));
        }
        self.ensure_idle(user, token, "update paymodel").await?;
        self.resolver.set_current(user, id).await
    }

    #[instrument(skip(self, token))]
    pub async fn reset_paymodels(&self, user: &str, token: Option<&str>) -> Result<()> {
        require_user(user)?;
        self.ensure_idle(user, token, "reset paymodel").await?;
        self.resolver.reset_current(user).await
    }

    /// Refuse pay model changes while anything of the user is alive.
    async fn ensure_idle(&self, user: &str, token: Option<&str>, action: &'static str) -> Result<()> {
        let statuses = self.status(user, token).await?;
        let busy = statuses.iter().any(|s| {
            s.is(CanonicalStatus::Launching) || s.is(CanonicalStatus::Running) || s.is(CanonicalStatus::Terminating)
        });
        if busy {
            warn!(user, action, "Pay model change refused, workspace is live");
            return Err(OrchestratorError::WorkspaceRunning(action));
        }
        Ok(())
    }
}

fn require_user(user: &str) -> Result<()> {
    if user.trim().is_empty() {
        return Err(OrchestratorError::InvalidInput("Missing username".into()));
    }
    Ok(())
}

fn target(user: &str, token: Option<&str>, paymodel: Option<PayModel>) -> WorkspaceTarget {
    WorkspaceTarget::new(user)
        .with_token(token.map(str::to_string))
        .with_paymodel(paymodel)
}
