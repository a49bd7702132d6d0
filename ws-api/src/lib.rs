//! HTTP front end of the workspace launcher.
//!
//! Handlers are thin: they read the caller's identity and query parameters,
//! call the [`ws_orchestrator::Dispatcher`] and map its errors to status codes.

pub mod api_docs;
pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_app;
pub use state::AppState;
