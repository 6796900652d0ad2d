//! Bearer token permission checker.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

/// Capability a caller may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Manage site options, including every cache purge action.
    ManageOptions,
    /// Read-only access.
    Read,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManageOptions => "manage_options",
            Self::Read => "read",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Short label for logs; never the token itself.
    pub label: String,
    capabilities: Vec<Capability>,
}

impl Caller {
    pub fn new(label: impl Into<String>, capabilities: Vec<Capability>) -> Self {
        Self {
            label: label.into(),
            capabilities,
        }
    }

    /// Caller holding every capability.
    pub fn admin(label: impl Into<String>) -> Self {
        Self::new(label, vec![Capability::ManageOptions, Capability::Read])
    }

    #[inline]
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Resolves bearer tokens into callers.
///
/// Admin tokens grant `ManageOptions`; viewer tokens only `Read`.
#[derive(Clone, Default)]
pub struct Permissions {
    admin_tokens: Arc<[String]>,
    viewer_tokens: Arc<[String]>,
}

impl Permissions {
    pub fn with_tokens(admin_tokens: Vec<String>, viewer_tokens: Vec<String>) -> Self {
        Self {
            admin_tokens: admin_tokens.into(),
            viewer_tokens: viewer_tokens.into(),
        }
    }

    /// Resolve a token into a caller, or `None` if it is unknown.
    pub fn authenticate(&self, token: Option<&str>) -> Option<Caller> {
        let token = token.map(str::trim).filter(|t| !t.is_empty())?;

        if let Some(index) = position(&self.admin_tokens, token) {
            debug!("Authenticated admin token #{}", index);
            return Some(Caller::admin(format!("admin#{index}")));
        }

        if let Some(index) = position(&self.viewer_tokens, token) {
            debug!("Authenticated viewer token #{}", index);
            return Some(Caller::new(format!("viewer#{index}"), vec![Capability::Read]));
        }

        debug!("Rejected unknown token");
        None
    }
}

fn position(tokens: &[String], token: &str) -> Option<usize> {
    tokens.iter().position(|t| constant_time_eq(t.as_bytes(), token.as_bytes()))
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl fmt::Debug for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permissions")
            .field("admin_tokens", &self.admin_tokens.len())
            .field("viewer_tokens", &self.viewer_tokens.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms() -> Permissions {
        Permissions::with_tokens(vec!["admin-secret".into()], vec!["viewer-secret".into()])
    }

    #[test]
    fn test_admin_token_grants_manage_options() {
        let caller = perms().authenticate(Some("admin-secret")).unwrap();
        assert!(caller.can(Capability::ManageOptions));
        assert_eq!(caller.label, "admin#0");
    }

    #[test]
    fn test_viewer_token_is_read_only() {
        let caller = perms().authenticate(Some(" viewer-secret ")).unwrap();
        assert!(caller.can(Capability::Read));
        assert!(!caller.can(Capability::ManageOptions));
    }

    #[test]
    fn test_unknown_or_missing_token() {
        assert!(perms().authenticate(Some("admin-secreT")).is_none());
        assert!(perms().authenticate(Some("")).is_none());
        assert!(perms().authenticate(None).is_none());
    }
}
