use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::models::Target;

/// Failure kinds for the shared handoff store.
///
/// `NotFound` is an expected outcome of the scan-then-read pattern — another
/// process may have consumed the record between the listing and the read —
/// and callers treat it as a skip, not a failure. `DecodeFailed` marks a
/// corrupt or foreign file; it stays on disk until garbage collection reaps
/// it and is never surfaced to the user.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The shared storage area could not be resolved or created. A
    /// deployment problem, not retried.
    #[error("shared storage unavailable: {0}")]
    Configuration(String),

    /// No record exists under the requested key.
    #[error("no record for {target}/{request_id}")]
    NotFound { target: Target, request_id: Uuid },

    /// The stored bytes did not parse as a handoff record.
    #[error("unreadable record at {path}: {source}")]
    DecodeFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True for the benign scan-then-read race.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
