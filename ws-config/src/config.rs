use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use ws_core::{PayModel, Result, WsError};
use ws_logging::LogSettings;

use crate::containers::{ContainerDefinition, ContainerRegistry};

/// Root configuration of the workspace launcher.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSettings,

    /// Namespace workspace pods are created in.
    #[serde(default = "default_user_namespace")]
    pub user_namespace: String,

    /// Public path prefix under which workspaces are proxied.
    #[serde(default = "default_proxy_prefix")]
    pub proxy_prefix: String,

    #[serde(default)]
    pub service_mapper: ServiceMapperKind,

    /// SQLite file holding pay model records. No path means no store.
    #[serde(default)]
    pub paymodel_db: Option<PathBuf>,

    /// Pay model used when the store has nothing current for a user.
    #[serde(default)]
    pub default_paymodel: Option<PayModel>,

    #[serde(default)]
    pub containers: Vec<ContainerDefinition>,

    #[serde(default)]
    pub kubernetes: KubernetesSettings,

    #[serde(default)]
    pub external: ExternalSettings,

    #[serde(default)]
    pub managed_container: ManagedContainerSettings,

    #[serde(default)]
    pub authz: Option<AuthzSettings>,

    #[serde(default)]
    pub confirm: ConfirmSettings,

    #[serde(default)]
    pub logging: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Scheme and host the public proxy serves workspaces from.
    #[serde(default)]
    pub public_url: String,
}

/// How backend services are registered with the public proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceMapperKind {
    /// Routing document written as an annotation on the service itself.
    #[default]
    Annotation,
    /// Separate routing custom resource.
    CustomResource,
}

/// Connection to the cluster the service itself runs in.
///
/// Without an explicit `api_url` the in-cluster service account is used.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct KubernetesSettings {
    #[serde(default)]
    pub api_url: Option<String>,

    #[serde(default)]
    pub token_file: Option<PathBuf>,

    #[serde(default)]
    pub ca_file: Option<PathBuf>,
}

/// Kubernetes clusters living in pay model accounts.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalSettings {
    #[serde(default = "default_external_cluster")]
    pub cluster_name: String,

    /// Role assumed in the pay model's account.
    #[serde(default = "default_role_name")]
    pub role_name: String,

    /// Namespace for workspace pods; falls back to `user_namespace`.
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManagedContainerSettings {
    #[serde(default = "default_ecs_cluster")]
    pub cluster_name: String,

    #[serde(default = "default_role_name")]
    pub role_name: String,

    #[serde(default)]
    pub subnets: Vec<String>,

    #[serde(default)]
    pub security_groups: Vec<String>,

    #[serde(default)]
    pub execution_role_arn: Option<String>,

    #[serde(default)]
    pub task_role_arn: Option<String>,

    /// Load balancer target group the workspace task registers with.
    #[serde(default)]
    pub target_group_arn: Option<String>,

    #[serde(default)]
    pub assign_public_ip: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthzSettings {
    /// Base URL of the policy service.
    pub url: String,
}

/// Termination confirmation polling.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl ConfirmSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_user_namespace() -> String {
    "workspaces".to_string()
}

fn default_proxy_prefix() -> String {
    "/workspace/proxy".to_string()
}

fn default_external_cluster() -> String {
    "workspace-cluster".to_string()
}

fn default_ecs_cluster() -> String {
    "workspace-tasks".to_string()
}

fn default_role_name() -> String {
    "workspace-launcher".to_string()
}

fn default_poll_interval_ms() -> u64 {
    5000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_url: String::new(),
        }
    }
}

impl Default for ExternalSettings {
    fn default() -> Self {
        Self {
            cluster_name: default_external_cluster(),
            role_name: default_role_name(),
            namespace: None,
        }
    }
}

impl Default for ManagedContainerSettings {
    fn default() -> Self {
        Self {
            cluster_name: default_ecs_cluster(),
            role_name: default_role_name(),
            subnets: Vec::new(),
            security_groups: Vec::new(),
            execution_role_arn: None,
            task_role_arn: None,
            target_group_arn: None,
            assign_public_ip: false,
        }
    }
}

impl Default for ConfirmSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            user_namespace: default_user_namespace(),
            proxy_prefix: default_proxy_prefix(),
            service_mapper: ServiceMapperKind::default(),
            paymodel_db: None,
            default_paymodel: None,
            containers: Vec::new(),
            kubernetes: KubernetesSettings::default(),
            external: ExternalSettings::default(),
            managed_container: ManagedContainerSettings::default(),
            authz: None,
            confirm: ConfirmSettings::default(),
            logging: LogSettings::default(),
        }
    }
}

impl Config {
    /// Apply `WS_*` environment overrides on top of file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var("WS_API_BIND") {
            self.server.bind_addr = bind;
        }
        if let Ok(path) = std::env::var("WS_PAYMODEL_DB") {
            self.paymodel_db = Some(PathBuf::from(path));
        }
        if let Ok(namespace) = std::env::var("WS_USER_NAMESPACE") {
            self.user_namespace = namespace;
        }
    }

    /// Check cross-field constraints the deserializer cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.user_namespace.trim().is_empty() {
            return Err(WsError::Config("user_namespace must not be empty".into()));
        }
        if !self.proxy_prefix.starts_with('/') {
            return Err(WsError::Config(format!(
                "proxy_prefix must start with '/', got '{}'",
                self.proxy_prefix
            )));
        }
        if self.confirm.poll_interval_ms == 0 {
            return Err(WsError::Config(
                "confirm.poll_interval_ms must be greater than zero".into(),
            ));
        }
        let ecs = &self.managed_container;
        if ecs.subnets.is_empty() && (ecs.target_group_arn.is_some() || !ecs.security_groups.is_empty()) {
            return Err(WsError::Config(
                "managed_container needs at least one subnet".into(),
            ));
        }
        if let Some(default) = &self.default_paymodel {
            if default.id.trim().is_empty() {
                return Err(WsError::Config(
                    "default_paymodel needs a bmh_workspace_id".into(),
                ));
            }
        }
        self.registry().map(|_| ())
    }

    /// App definitions keyed by content hash.
    pub fn registry(&self) -> Result<ContainerRegistry> {
        ContainerRegistry::from_definitions(&self.containers)
    }

    /// Namespace used for workspaces on external clusters.
    pub fn external_namespace(&self) -> &str {
        self.external
            .namespace
            .as_deref()
            .unwrap_or(&self.user_namespace)
    }
}
