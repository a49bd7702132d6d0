use std::fmt::{self, Display, Formatter};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WsError {
    Config(String),
    Backend(String),
    /// Non-success answer from a Kubernetes API server.
    ClusterApi {
        status: u16,
        message: String,
    },
    Aws(String),
    Network(String),
    Io(#[from] std::io::Error),
    Serialization(String),
    Internal(String),
    Other(#[from] anyhow::Error),
}

impl Display for WsError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            WsError::Config(s) => write!(f, "Configuration error: {}", s),
            WsError::Backend(s) => write!(f, "Backend error: {}", s),
            WsError::ClusterApi { status, message } => {
                write!(f, "Cluster API error ({}): {}", status, message)
            }
            WsError::Aws(s) => write!(f, "AWS error: {}", s),
            WsError::Network(s) => write!(f, "Network error: {}", s),
            WsError::Io(e) => write!(f, "I/O error: {}", e),
            WsError::Serialization(s) => write!(f, "Serialization error: {}", s),
            WsError::Internal(s) => write!(f, "Internal error: {}", s),
            WsError::Other(e) => write!(f, "Other error: {}", e),
        }
    }
}

impl WsError {
    /// True when the cluster answered 404 for the object in question.
    pub fn is_not_found(&self) -> bool {
        matches!(self, WsError::ClusterApi { status: 404, .. })
    }

    /// True when the cluster answered 409 because the object already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(self, WsError::ClusterApi { status: 409, .. })
    }
}

impl From<serde_yaml_ng::Error> for WsError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        WsError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for WsError {
    fn from(err: serde_json::Error) -> Self {
        WsError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WsError>;
