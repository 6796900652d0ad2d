//! Cache purge orchestration.
//!
//! An inbound action is resolved by the [`ActionRouter`] into an
//! [`Operation`], which the [`Purger`] executes against the shared
//! [`BackendRegistry`](crate::backends::BackendRegistry). Every outcome is
//! collected into a single [`Response`].
//!
//! Two failure modes exist and are reported differently:
//!
//! - multi-backend purges record a failing backend's detail in its own
//!   field and keep going; the envelope still reports success
//! - single-backend operations fail the whole response with the backend's
//!   detail

pub mod action;
mod error;
pub mod orchestrator;
pub mod response;
pub mod scope;

pub use action::{ActionRouter, Operation};
pub use error::PurgeError;
pub use orchestrator::Purger;
pub use response::{Field, Response, ResponseBuilder};
pub use scope::Scope;

use serde::Deserialize;
use serde_json::Value;

/// A purge request as received from the transport.
///
/// `scope` is kept as raw JSON so a value of the wrong type is rejected as
/// an invalid scope rather than as a malformed request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurgeRequest {
    pub action: String,
    #[serde(default)]
    pub scope: Option<Value>,
}

impl PurgeRequest {
    /// Requested scope, if it was sent as a string.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_ref().and_then(Value::as_str)
    }

    #[cfg(test)]
    pub fn new(action: impl Into<String>, scope: Option<&str>) -> Self {
        Self {
            action: action.into(),
            scope: scope.map(Value::from),
        }
    }
}
