//! Purge scopes.

use std::fmt;
use std::str::FromStr;

use super::PurgeError;
use super::response::Field;

/// A category of cache to purge, or `All` of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    All,
    Bytecode,
    WebServer,
    Object,
    Cdn,
}

impl Scope {
    /// Concrete scopes in dispatch order. `All` is never dispatched itself.
    pub const CONCRETE: [Scope; 4] = [Scope::Bytecode, Scope::WebServer, Scope::Object, Scope::Cdn];

    /// Wire name of the scope.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Bytecode => "opcache",
            Self::WebServer => "nginx",
            Self::Object => "object",
            Self::Cdn => "cloudflare",
        }
    }

    /// Response field an invocation of this scope is recorded under.
    pub fn field(&self) -> Field {
        match self {
            Self::All => Field::All,
            Self::Bytecode => Field::Opcache,
            Self::WebServer => Field::Nginx,
            Self::Object => Field::Object,
            Self::Cdn => Field::Cloudflare,
        }
    }

    pub fn is_concrete(&self) -> bool {
        !matches!(self, Self::All)
    }

    /// Whether a request for `self` covers the concrete scope `other`.
    pub fn covers(&self, other: Scope) -> bool {
        other.is_concrete() && (*self == Scope::All || *self == other)
    }

    /// Validate an optional raw scope. Missing and empty values are invalid.
    pub fn parse_requested(raw: Option<&str>) -> Result<Self, PurgeError> {
        raw.filter(|s| !s.is_empty())
            .ok_or(PurgeError::InvalidScope)?
            .parse()
    }
}

impl FromStr for Scope {
    type Err = PurgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "opcache" => Ok(Self::Bytecode),
            "nginx" => Ok(Self::WebServer),
            "object" => Ok(Self::Object),
            "cloudflare" => Ok(Self::Cdn),
            _ => Err(PurgeError::InvalidScope),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
