use std::io;
use std::time::Duration;

use thiserror::Error;

/// A single failed call to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("remote store unreachable")]
    Offline,
    #[error("session not found: {0}")]
    UnknownSession(String),
    #[error("remote store answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Local queue failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("queue i/o: {0}")]
    Io(#[from] io::Error),
    #[error("queue file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to replace queue file: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("queue worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
