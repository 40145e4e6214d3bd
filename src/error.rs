//! Error type shared by the kitchen modules.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::WorkerKind;

#[derive(Error, Debug)]
pub enum KitchenError {
    #[error("malformed order #{index}: {reason}")]
    MalformedOrder { index: usize, reason: String },

    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid kitchen config: {0}")]
    InvalidConfig(String),

    #[error("worker pool failure for {kind}: {reason}")]
    Pool { kind: WorkerKind, reason: String },

    #[error("kitchen task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, KitchenError>;
