//! Backend error type.

use std::time::Duration;

/// Failure reported by a cache backend.
///
/// The `Display` output is the error detail shown to callers.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{0}")]
    NotConfigured(String),

    #[error("{0}")]
    Failed(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("backend task aborted: {0}")]
    Aborted(String),
}

impl BackendError {
    pub fn not_configured(detail: impl Into<String>) -> Self {
        Self::NotConfigured(detail.into())
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self::Failed(detail.into())
    }
}

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;
