use thiserror::Error;
use ws_core::WsError;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("No pay model with id {0}")]
    UnknownPayModel(String),

    #[error("Found {count} current pay models for user {user}")]
    MultipleCurrentPayModels { user: String, count: usize },

    #[error("Paymodel is not active. Launch forbidden")]
    PayModelInactive,

    #[error("Can not {0} when workspace is running")]
    WorkspaceRunning(&'static str),

    #[error("Authorization check failed: {0}")]
    Authorization(String),

    #[error("{0}")]
    Backend(#[from] WsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
