//! Permission system for resolving callers and their capabilities.
//!
//! ## Usage
//!
//! ```rust
//! let perms = Permissions::with_tokens(config.admin_tokens.clone(), config.viewer_tokens.clone());
//!
//! match perms.authenticate(bearer_token) {
//!     Some(caller) if caller.can(Capability::ManageOptions) => { /* ... */ }
//!     Some(_) => { /* authenticated, not allowed */ }
//!     None => { /* unknown token */ }
//! }
//! ```

mod checker;

pub use checker::{Caller, Capability, Permissions};
