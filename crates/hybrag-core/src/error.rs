use thiserror::Error;

use crate::types::SourceKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0} index not initialized")]
    IndexNotReady(SourceKind),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl Error {
    /// True for the errors that mean "call again after initialization",
    /// as opposed to a query that simply matched nothing.
    pub fn is_not_ready(&self) -> bool { matches!(self, Self::IndexNotReady(_)) }
}

pub type Result<T> = std::result::Result<T, Error>;
