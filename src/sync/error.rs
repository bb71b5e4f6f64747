use std::time::Duration;

use thiserror::Error;

/// Failure of a call to the remote gateway.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server rejected credentials")]
    Unauthorized,

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("server reported the mutation as unsuccessful")]
    Rejected,

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("mutation task ended abnormally: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyncError {
    #[error("no authenticated session")]
    Unauthenticated,

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("remote mutation failed: {0}")]
    RemoteFailure(#[from] RemoteError),

    /// A reply arrived after a newer optimistic update had been applied.
    #[error("stale reconciliation for version {version} (store at {latest})")]
    StaleReconciliation { version: u64, latest: u64 },
}

impl SyncError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        SyncError::Validation(msg.into())
    }
}
