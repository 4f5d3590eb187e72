//! Error types for the Berth orchestrator

use thiserror::Error;

use crate::cluster::ClusterError;

/// Main error type for the orchestrator core
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cluster error: {0}")]
    ClusterError(#[from] ClusterError),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("No rollback target: {0}")]
    NoRollbackTarget(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for OrchestratorError {
    fn from(err: anyhow::Error) -> Self {
        OrchestratorError::Internal(err.to_string())
    }
}
