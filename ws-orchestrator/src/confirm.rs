//! Releasing the pay model once a backend has really let go of a workspace.
//!
//! The pay model routes the user's next launch. Clearing it while a pod or
//! service still exists would let that launch land on a different backend
//! than the one still holding the old workspace, so the confirmer waits for
//! the backend to report nothing before it resets.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use ws_provider::{Backend, CanonicalStatus, WorkspaceStatus, WorkspaceTarget};

use crate::error::Result;
use crate::resolver::PayModelResolver;
use crate::task::BackgroundTask;

/// What the confirmer did once the terminated workspace was gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Nothing remained for the user and the current pay model was cleared.
    Reset,
    /// Other workspaces of the user are still alive; the pay model stays.
    StillInUse,
}

#[derive(Clone)]
pub struct TerminationConfirmer {
    backend: Arc<dyn Backend>,
    resolver: PayModelResolver,
    poll_interval: Duration,
}

impl TerminationConfirmer {
    pub fn new(backend: Arc<dyn Backend>, resolver: PayModelResolver, poll_interval: Duration) -> Self {
        Self {
            backend,
            resolver,
            poll_interval,
        }
    }

    pub fn spawn(self, target: WorkspaceTarget, workspace_id: Option<String>) -> BackgroundTask {
        BackgroundTask::spawn("termination-confirmer", async move {
            let user = target.user.clone();
            if let Err(e) = self.confirm(&target, workspace_id.as_deref()).await {
                error!(
                    user = %user,
                    workspace = workspace_id.as_deref().unwrap_or("*"),
                    backend = %self.backend.kind(),
                    "Failed to reset pay model after termination: {}",
                    e
                );
            }
        })
    }

    /// Poll until the workspace is gone, then reset if the user has nothing left.
    ///
    /// The first poll happens immediately. Status errors are retried on the
    /// next tick; only the reset itself can fail this call.
    #[instrument(skip(self, target), fields(user = %target.user, backend = %self.backend.kind()))]
    pub async fn confirm(&self, target: &WorkspaceTarget, workspace_id: Option<&str>) -> Result<Confirmation> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        let mut polls = 0u64;

        let remaining = loop {
            ticker.tick().await;
            polls += 1;

            match self.backend.status(target).await {
                Ok(statuses) if is_gone(&statuses, workspace_id) => break statuses,
                Ok(statuses) => {
                    debug!(polls, alive = alive(&statuses).count(), "Workspace still tearing down");
                }
                Err(e) => warn!(polls, "Status check failed while confirming termination: {}", e),
            }
        };

        if alive(&remaining).next().is_some() {
            info!(polls, "Workspace gone, other workspaces keep the pay model");
            return Ok(Confirmation::StillInUse);
        }

        self.resolver.reset_current(&target.user).await?;
        info!(polls, "Termination confirmed");
        Ok(Confirmation::Reset)
    }
}

fn alive(statuses: &[WorkspaceStatus]) -> impl Iterator<Item = &WorkspaceStatus> {
    statuses.iter().filter(|s| !s.is(CanonicalStatus::NotFound))
}

fn is_gone(statuses: &[WorkspaceStatus], workspace_id: Option<&str>) -> bool {
    match workspace_id {
        Some(id) => alive(statuses).all(|s| s.workspace_id.as_deref() != Some(id)),
        None => alive(statuses).next().is_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ws_core::BackendKind;
    use ws_provider::mock::MockBackend;

    fn entry(id: &str, status: CanonicalStatus) -> WorkspaceStatus {
        WorkspaceStatus {
            status: Some(status),
            workspace_id: Some(id.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_gone_detection() {
        assert!(is_gone(&[], None));
        assert!(is_gone(&[WorkspaceStatus::not_found()], None));
        assert!(!is_gone(&[entry("a", CanonicalStatus::Terminating)], None));
        assert!(is_gone(&[entry("b", CanonicalStatus::Running)], Some("a")));
        assert!(!is_gone(&[entry("a", CanonicalStatus::Stopped)], Some("a")));

        // Unknown phase: no status, still counted as present.
        let unknown = WorkspaceStatus {
            workspace_id: Some("a".into()),
            ..Default::default()
        };
        assert!(!is_gone(std::slice::from_ref(&unknown), None));
        assert!(!is_gone(std::slice::from_ref(&unknown), Some("a")));
        assert!(is_gone(&[unknown], Some("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_status_keeps_polling() {
        let backend = Arc::new(MockBackend::new(BackendKind::Local));
        backend
            .push_answer(vec![WorkspaceStatus {
                workspace_id: Some("a".into()),
                ..Default::default()
            }])
            .push_answer(vec![]);

        let confirmer = TerminationConfirmer::new(
            backend.clone(),
            PayModelResolver::new(None, None),
            Duration::from_secs(5),
        );
        let outcome = confirmer
            .confirm(&WorkspaceTarget::new("alice"), Some("a"))
            .await
            .unwrap();

        assert_eq!(outcome, Confirmation::Reset);
        assert_eq!(backend.status_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_workspace_keeps_paymodel() {
        let backend = Arc::new(MockBackend::new(BackendKind::Local));
        backend
            .push_answer(vec![
                entry("a", CanonicalStatus::Terminating),
                entry("b", CanonicalStatus::Running),
            ])
            .push_answer(vec![entry("b", CanonicalStatus::Running)]);

        let confirmer = TerminationConfirmer::new(
            backend.clone(),
            PayModelResolver::new(None, None),
            Duration::from_secs(5),
        );
        let outcome = confirmer
            .confirm(&WorkspaceTarget::new("alice"), Some("a"))
            .await
            .unwrap();

        assert_eq!(outcome, Confirmation::StillInUse);
        assert_eq!(backend.status_count(), 2);
    }
}
