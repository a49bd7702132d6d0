//! Pay model records and the backend they select.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// `request_status` value that allows launches on the managed-container backend.
pub const ACTIVE_STATUS: &str = "active";

/// `request_status` values that make a record visible to the resolver.
pub const LISTABLE_STATUSES: [&str; 2] = ["active", "above limit"];

/// A billing account plus backend selection for one user.
///
/// Field names on the wire follow the pay model table's attribute names.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct PayModel {
    #[serde(rename = "bmh_workspace_id")]
    pub id: String,

    #[serde(rename = "user_id", default)]
    pub user: String,

    #[serde(rename = "workspace_type", default)]
    pub name: String,

    #[serde(rename = "account_id", default)]
    pub aws_account_id: String,

    #[serde(default)]
    pub region: String,

    /// Run on the in-cluster Kubernetes backend.
    #[serde(default)]
    pub local: bool,

    /// Run on the managed-container backend.
    #[serde(default)]
    pub ecs: bool,

    #[serde(rename = "request_status", default)]
    pub status: String,

    /// Index into the pre-allocated CIDR block of the account.
    #[serde(default)]
    pub subnet: i64,

    #[serde(rename = "hard-limit", default)]
    pub hard_limit: f64,

    #[serde(rename = "soft-limit", default)]
    pub soft_limit: f64,

    #[serde(rename = "total-usage", default)]
    pub total_usage: f64,

    #[serde(rename = "current_pay_model", default)]
    pub current: bool,
}

impl PayModel {
    /// Backend this pay model routes workspaces to.
    ///
    /// `local` wins over `ecs` when both are set; an account with neither
    /// flag is reached as an external Kubernetes cluster.
    pub fn backend(&self) -> BackendKind {
        if self.local {
            BackendKind::Local
        } else if self.ecs {
            BackendKind::ManagedContainer
        } else {
            BackendKind::External
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ACTIVE_STATUS
    }
}

/// The execution substrate hosting a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// In-cluster Kubernetes.
    Local,
    /// Kubernetes cluster in another AWS account, reached through an assumed role.
    External,
    /// Serverless container tasks behind a load balancer.
    ManagedContainer,
}

impl BackendKind {
    /// Backend for an optional current pay model; no pay model means in-cluster.
    pub fn for_paymodel(paymodel: Option<&PayModel>) -> Self {
        paymodel.map_or(BackendKind::Local, PayModel::backend)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Local => "local",
            BackendKind::External => "external",
            BackendKind::ManagedContainer => "managed-container",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paymodel(local: bool, ecs: bool) -> PayModel {
        PayModel {
            id: "pm-1".into(),
            user: "alice".into(),
            aws_account_id: "123456789012".into(),
            local,
            ecs,
            status: ACTIVE_STATUS.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_backend_selection() {
        assert_eq!(paymodel(true, false).backend(), BackendKind::Local);
        assert_eq!(paymodel(false, true).backend(), BackendKind::ManagedContainer);
        assert_eq!(paymodel(false, false).backend(), BackendKind::External);
        assert_eq!(paymodel(true, true).backend(), BackendKind::Local);
        assert_eq!(BackendKind::for_paymodel(None), BackendKind::Local);
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(paymodel(false, true)).unwrap();
        assert_eq!(json["bmh_workspace_id"], "pm-1");
        assert_eq!(json["user_id"], "alice");
        assert_eq!(json["request_status"], "active");
        assert_eq!(json["current_pay_model"], false);
        assert!(json.get("hard-limit").is_some());

        let parsed: PayModel = serde_json::from_str(
            r#"{"bmh_workspace_id":"x","ecs":true,"request_status":"pending"}"#,
        )
        .unwrap();
        assert!(parsed.ecs);
        assert!(!parsed.is_active());
    }
}
