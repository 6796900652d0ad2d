//! Action routing.
//!
//! The action set is closed. The router is built once from [`Action::ALL`]
//! and resolves prefixed action ids by exact lookup.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::{PurgeError, Scope};
use crate::permissions::{Caller, Capability};

/// Actions a caller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Purge by the requested scope.
    PurgeAll,
    UpdateCdnSettings,
    UpdateCdnDevMode,
    /// Purge only the CDN.
    PurgeCdn,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::PurgeAll,
        Action::UpdateCdnSettings,
        Action::UpdateCdnDevMode,
        Action::PurgeCdn,
    ];

    /// Action name without the prefix.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PurgeAll => "purge_them_all",
            Self::UpdateCdnSettings => "cloudflare_settings",
            Self::UpdateCdnDevMode => "cloudflare_dev_mode",
            Self::PurgeCdn => "cloudflare_purge",
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::PurgeAll => Operation::PurgeByScope,
            Self::UpdateCdnSettings => Operation::UpdateCdnSettings,
            Self::UpdateCdnDevMode => Operation::UpdateCdnDevMode,
            Self::PurgeCdn => Operation::PurgeSingle(Scope::Cdn),
        }
    }

    pub fn required_capability(&self) -> Capability {
        Capability::ManageOptions
    }
}

/// Internal operation an action resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    PurgeByScope,
    UpdateCdnSettings,
    UpdateCdnDevMode,
    PurgeSingle(Scope),
}

/// Resolves prefixed action ids to operations.
#[derive(Debug, Clone)]
pub struct ActionRouter {
    routes: HashMap<String, Action>,
}

impl ActionRouter {
    /// Build the routing table; ids are `<prefix>_<name>`.
    pub fn new(prefix: &str) -> Self {
        let routes = Action::ALL
            .into_iter()
            .map(|action| (format!("{}_{}", prefix, action.name()), action))
            .collect();

        Self { routes }
    }

    /// Resolve an action id for a caller.
    ///
    /// Fails with `UnknownAction` for ids outside the table and with
    /// `Forbidden` when the caller lacks the action's capability.
    pub fn route(&self, action_id: &str, caller: &Caller) -> Result<Operation, PurgeError> {
        let Some(action) = self.routes.get(action_id) else {
            warn!("Unknown action {:?} from {}", action_id, caller.label);
            return Err(PurgeError::UnknownAction(action_id.to_string()));
        };

        let required = action.required_capability();
        if !caller.can(required) {
            warn!("{} lacks {} for {}", caller.label, required, action_id);
            return Err(PurgeError::Forbidden {
                action: action_id.to_string(),
                required,
            });
        }

        debug!("Routed {} to {:?}", action_id, action.operation());
        Ok(action.operation())
    }

    /// Registered action ids, sorted.
    pub fn action_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
