//! Purge error taxonomy.

use crate::backends::BackendError;
use crate::permissions::Capability;

/// Errors that fail a whole purge request.
///
/// Per-field backend failures in a multi-backend purge are not errors at
/// this level; they are recorded in the response.
#[derive(Debug, thiserror::Error)]
pub enum PurgeError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Action {action} requires the {required} capability")]
    Forbidden { action: String, required: Capability },

    #[error("Scope argument missing or incorrect.")]
    InvalidScope,

    /// A single-backend operation failed; displays the backend's detail.
    #[error("{0}")]
    FatalBackend(#[source] BackendError),
}
