use persistence::StoreError;
use std::path::PathBuf;
use thiserror::Error;
use types::errors::EngineError;

/// Central error type for the coordinator
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Cannot read snapshot {path:?}: {source}")]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed snapshot: {0}")]
    SnapshotFormat(#[from] serde_json::Error),

    #[error("Matching failed: {0}")]
    Engine(#[from] EngineError),

    #[error("Result store failed: {0}")]
    Store(#[from] StoreError),

    #[error("A matching run is already in progress")]
    RunInProgress,

    #[error("Usage: {0}")]
    Usage(String),
}
