//! Response aggregation.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use tracing::debug;

use super::PurgeError;
use crate::backends::BackendResult;

/// Marker recorded for a backend call that succeeded.
pub const SUCCESS_MARKER: i64 = 1;

/// Response field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    All,
    Opcache,
    Nginx,
    Object,
    Cloudflare,
    Zone,
    DevMode,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Opcache => "opcache",
            Self::Nginx => "nginx",
            Self::Object => "object",
            Self::Cloudflare => "cloudflare",
            Self::Zone => "zone",
            Self::DevMode => "dev_mode",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-field results, serialized as a JSON object in recording order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseData(Vec<(Field, Value)>);

impl ResponseData {
    #[cfg(test)]
    pub fn get(&self, field: Field) -> Option<&Value> {
        self.0.iter().find(|(f, _)| *f == field).map(|(_, v)| v)
    }

    #[cfg(test)]
    pub fn contains(&self, field: Field) -> bool {
        self.get(field).is_some()
    }

    #[cfg(test)]
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.0.iter().map(|(f, _)| *f)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn set(&mut self, field: Field, value: Value) {
        match self.0.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.0.push((field, value)),
        }
    }
}

impl Serialize for ResponseData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, value) in &self.0 {
            map.serialize_entry(field.as_str(), value)?;
        }
        map.end()
    }
}

/// The structured reply handed back to the transport.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Response {
    pub success: bool,
    pub data: ResponseData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Failure response carrying only the error.
    pub fn failure(error: &PurgeError) -> Self {
        let mut builder = ResponseBuilder::new();
        builder.fail(error.to_string());
        builder.finalize()
    }

    /// Value recorded for `field`, if any.
    #[cfg(test)]
    pub fn field(&self, field: Field) -> Option<&Value> {
        self.data.get(field)
    }
}

/// Accumulates field results and at most one fatal error.
///
/// Once `fail()` has been called the response is a failure; later records
/// are ignored and only the first error is kept.
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    data: ResponseData,
    fatal: Option<String>,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value under `field`, replacing any earlier value.
    pub fn record(&mut self, field: Field, value: impl Into<Value>) {
        if self.fatal.is_some() {
            debug!("Ignoring {} after fatal error", field);
            return;
        }
        self.data.set(field, value.into());
    }

    /// Record a backend outcome: the success marker or the error detail.
    pub fn record_outcome(&mut self, field: Field, outcome: &BackendResult<()>) {
        match outcome {
            Ok(()) => self.record(field, SUCCESS_MARKER),
            Err(e) => self.record(field, e.to_string()),
        }
    }

    /// Mark the whole response as failed. The first failure wins.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.fatal.is_none() {
            self.fatal = Some(error.into());
        }
    }

    pub fn finalize(self) -> Response {
        match self.fatal {
            Some(error) => Response {
                success: false,
                data: ResponseData::default(),
                error: Some(error),
            },
            None => Response {
                success: true,
                data: self.data,
                error: None,
            },
        }
    }
}
