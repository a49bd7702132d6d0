//! Canonical workspace status shared by every backend.
//!
//! Each backend reports its native object state; the helpers here fold it
//! into one vocabulary so callers never branch on backend specifics.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;
use utoipa::ToSchema;

use crate::kubernetes::model::{ContainerStatus, Pod, PodCondition};
use crate::kubernetes::pod::{APP_LABEL, WORKSPACE_APP_LABEL};

/// Lifecycle state of one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum CanonicalStatus {
    #[serde(rename = "Not Found")]
    NotFound,
    Launching,
    Running,
    Terminating,
    Stopped,
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "Not Found",
            Self::Launching => "Launching",
            Self::Running => "Running",
            Self::Terminating => "Terminating",
            Self::Stopped => "Stopped",
        };
        f.write_str(s)
    }
}

/// Derived, never-persisted view of one workspace.
///
/// `status` stays `None` when the backend reported a state outside the
/// canonical vocabulary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceStatus {
    pub status: Option<CanonicalStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ConditionView>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub container_states: Vec<ContainerStateView>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(rename = "workspaceID", default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,

    #[serde(rename = "appID", default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

impl WorkspaceStatus {
    pub fn with_status(status: CanonicalStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn not_found() -> Self {
        Self::with_status(CanonicalStatus::NotFound)
    }

    pub fn is(&self, status: CanonicalStatus) -> bool {
        self.status == Some(status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConditionView {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStateView {
    pub name: String,
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ContainerState>,
}

/// What one container of a pod is doing right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Running(RunningState),
    Terminated(TerminatedState),
    Waiting(WaitingState),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunningState {
    pub started_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TerminatedState {
    pub exit_code: i32,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WaitingState {
    pub reason: Option<String>,
    pub message: Option<String>,
}

/// Conditions that must all be `True` before a running pod counts as ready.
const READINESS_CONDITIONS: [&str; 2] = ["Ready", "PodScheduled"];

/// Fold a pod (or its absence) into the canonical vocabulary.
///
/// A running pod that is not yet ready reports `Launching` together with its
/// raw conditions and container states so a stuck launch can be diagnosed.
pub fn normalize_pod(pod: Option<&Pod>) -> WorkspaceStatus {
    let Some(pod) = pod else {
        return WorkspaceStatus::not_found();
    };

    let labels = &pod.metadata.labels;
    let mut view = WorkspaceStatus {
        workspace_id: labels.get(APP_LABEL).cloned(),
        app_id: labels.get(WORKSPACE_APP_LABEL).cloned(),
        ..Default::default()
    };

    if pod.metadata.deletion_timestamp.is_some() {
        view.status = Some(CanonicalStatus::Terminating);
        return view;
    }

    let status = pod.status.as_ref();
    let phase = status.and_then(|s| s.phase.as_deref()).unwrap_or("Pending");
    match phase {
        "Failed" | "Succeeded" | "Unknown" => view.status = Some(CanonicalStatus::Stopped),
        "Pending" => view.status = Some(CanonicalStatus::Launching),
        "Running" => {
            let conditions = status.map(|s| s.conditions.as_slice()).unwrap_or_default();
            let all_ready = conditions
                .iter()
                .filter(|c| READINESS_CONDITIONS.contains(&c.kind.as_str()))
                .all(|c| c.status == "True");
            if all_ready {
                view.status = Some(CanonicalStatus::Running);
            } else {
                view.status = Some(CanonicalStatus::Launching);
                view.conditions = conditions.iter().map(condition_view).collect();
                view.container_states = status
                    .map(|s| s.container_statuses.iter().map(container_view).collect())
                    .unwrap_or_default();
            }
        }
        other => {
            warn!(
                pod = pod.metadata.name.as_deref().unwrap_or_default(),
                phase = other,
                "Unexpected pod phase"
            );
        }
    }
    view
}

/// Map a managed-container service status onto the canonical vocabulary.
///
/// A missing service is `Not Found`. Values outside the known table are
/// logged and left unset.
pub fn normalize_service_status(status: Option<&str>) -> Option<CanonicalStatus> {
    match status {
        Some("ACTIVE") => Some(CanonicalStatus::Running),
        Some("DRAINING") => Some(CanonicalStatus::Terminating),
        Some("STOPPED") | Some("INACTIVE") | None => Some(CanonicalStatus::NotFound),
        Some(other) => {
            warn!(status = other, "Unexpected service status");
            None
        }
    }
}

fn condition_view(c: &PodCondition) -> ConditionView {
    ConditionView {
        kind: c.kind.clone(),
        status: c.status.clone(),
        reason: c.reason.clone(),
        message: c.message.clone(),
        last_transition_time: c.last_transition_time.clone(),
    }
}

fn container_view(c: &ContainerStatus) -> ContainerStateView {
    let state = c.state.as_ref().and_then(|s| {
        if let Some(running) = &s.running {
            Some(ContainerState::Running(RunningState {
                started_at: running.started_at.clone(),
            }))
        } else if let Some(t) = &s.terminated {
            Some(ContainerState::Terminated(TerminatedState {
                exit_code: t.exit_code,
                reason: t.reason.clone(),
                message: t.message.clone(),
                started_at: t.started_at.clone(),
                finished_at: t.finished_at.clone(),
            }))
        } else {
            s.waiting.as_ref().map(|w| {
                ContainerState::Waiting(WaitingState {
                    reason: w.reason.clone(),
                    message: w.message.clone(),
                })
            })
        }
    });
    ContainerStateView {
        name: c.name.clone(),
        ready: c.ready,
        state,
    }
}
