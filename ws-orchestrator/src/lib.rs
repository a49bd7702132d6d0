//! Workspace orchestration business logic
//!
//! This crate decides where a user's workspace runs and drives it there. It
//! owns the pay model store, the resolver enforcing one current pay model
//! per user, the dispatcher in front of the compute backends, and the
//! confirmer that releases a pay model after teardown. The HTTP service in
//! `ws-api` is a thin layer on top.

pub mod authz;
pub mod confirm;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod resolver;
pub mod setup;
pub mod store;
pub mod task;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use authz::{Authorizer, PolicyServiceAuthorizer, StaticAuthorizer};
pub use confirm::{Confirmation, TerminationConfirmer};
pub use dispatcher::{AppOption, Backends, Dispatcher, LaunchOutcome, StatusReport, Terminated};
pub use error::{OrchestratorError, Result};
pub use resolver::{CurrentSelection, PayModelResolver, PayModelSummary};
pub use setup::{build_components, Components};
pub use store::{PayModelStore, SqlitePayModelStore};
pub use task::BackgroundTask;
