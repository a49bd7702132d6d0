//! Scripted backend for exercising the dispatcher without a cluster.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use ws_core::{BackendKind, Result, WsError};

use crate::status::{CanonicalStatus, WorkspaceStatus};
use crate::{Backend, LaunchSpec, WorkspaceTarget};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Create { user: String, workspace_id: String },
    Terminate { user: String, workspace_id: Option<String> },
    Status { user: String },
}

/// Records every call and answers `status` from a script.
///
/// Scripted answers are consumed in order; the last one repeats once the
/// script runs dry. With no script at all the user has no workspaces.
pub struct MockBackend {
    kind: BackendKind,
    calls: Mutex<Vec<MockCall>>,
    script: Mutex<VecDeque<Vec<WorkspaceStatus>>>,
    last: Mutex<Vec<WorkspaceStatus>>,
    create_error: Mutex<Option<String>>,
}

impl MockBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(Vec::new()),
            create_error: Mutex::new(None),
        }
    }

    /// Queue one `status` answer holding a single workspace in `status`.
    pub fn push_status(&self, status: CanonicalStatus) -> &Self {
        let answer = if status == CanonicalStatus::NotFound {
            Vec::new()
        } else {
            vec![WorkspaceStatus {
                status: Some(status),
                workspace_id: Some("ws-mock".into()),
                ..Default::default()
            }]
        };
        self.push_answer(answer)
    }

    pub fn push_answer(&self, answer: Vec<WorkspaceStatus>) -> &Self {
        lock(&self.script).push_back(answer);
        self
    }

    pub fn fail_create(&self, message: &str) {
        *lock(&self.create_error) = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    pub fn create_count(&self) -> usize {
        self.count(|c| matches!(c, MockCall::Create { .. }))
    }

    pub fn terminate_count(&self) -> usize {
        self.count(|c| matches!(c, MockCall::Terminate { .. }))
    }

    pub fn status_count(&self) -> usize {
        self.count(|c| matches!(c, MockCall::Status { .. }))
    }

    fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: MockCall) {
        lock(&self.calls).push(call);
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Backend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn create(&self, spec: &LaunchSpec) -> Result<()> {
        self.record(MockCall::Create {
            user: spec.target.user.clone(),
            workspace_id: spec.workspace_id.clone(),
        });
        match lock(&self.create_error).clone() {
            Some(message) => Err(WsError::Backend(message)),
            None => Ok(()),
        }
    }

    async fn terminate(&self, target: &WorkspaceTarget, workspace_id: Option<&str>) -> Result<()> {
        self.record(MockCall::Terminate {
            user: target.user.clone(),
            workspace_id: workspace_id.map(str::to_string),
        });
        Ok(())
    }

    async fn status(&self, target: &WorkspaceTarget) -> Result<Vec<WorkspaceStatus>> {
        self.record(MockCall::Status {
            user: target.user.clone(),
        });
        let next = lock(&self.script).pop_front();
        let mut last = lock(&self.last);
        if let Some(answer) = next {
            *last = answer;
        }
        Ok(last.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_repeat_last() {
        let mock = MockBackend::new(BackendKind::Local);
        mock.push_status(CanonicalStatus::Terminating)
            .push_status(CanonicalStatus::NotFound);
        let target = WorkspaceTarget::new("alice");

        assert!(mock.status(&target).await.unwrap()[0].is(CanonicalStatus::Terminating));
        assert!(mock.status(&target).await.unwrap().is_empty());
        assert!(mock.status(&target).await.unwrap().is_empty());
        assert_eq!(mock.status_count(), 3);
    }
}
