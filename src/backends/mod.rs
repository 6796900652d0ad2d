//! Cache backend capabilities.
//!
//! Each cache type implements one capability trait. The orchestrator never
//! talks to a driver directly; it goes through the [`BackendRegistry`],
//! which is built once at start-up and shared read-only.
//!
//! ## Drivers
//!
//! - `opcache` - bytecode cache reset through an external command
//! - `nginx` - web server cache directory purge
//! - `object` - in-process object cache flush
//! - `cloudflare` - CDN zone purge, settings and development mode

pub mod cloudflare;
mod error;
pub mod nginx;
pub mod object;
pub mod opcache;

use std::sync::Arc;

use async_trait::async_trait;

pub use cloudflare::CloudflareBackend;
pub use error::{BackendError, BackendResult};
pub use nginx::NginxBackend;
pub use object::ObjectCacheBackend;
pub use opcache::OpcacheBackend;

/// A cache that can be purged.
#[async_trait]
pub trait PurgeCache: Send + Sync {
    async fn purge_cache(&self) -> BackendResult<()>;
}

/// Web server cache: needs its settings refreshed before a purge.
#[async_trait]
pub trait WebServerCache: PurgeCache {
    async fn update_settings(&self) -> BackendResult<()>;
}

/// CDN cache with remote zone settings and a development mode switch.
#[async_trait]
pub trait CdnCache: PurgeCache {
    /// Refresh the zone settings, returning the zone identifier.
    async fn update_settings(&self) -> BackendResult<String>;

    /// Apply the configured development mode, returning the resulting state.
    async fn update_dev_mode(&self) -> BackendResult<String>;
}

/// The set of backend instances the orchestrator dispatches to.
#[derive(Clone)]
pub struct BackendRegistry {
    pub bytecode: Arc<dyn PurgeCache>,
    pub web_server: Arc<dyn WebServerCache>,
    pub object: Arc<dyn PurgeCache>,
    pub cdn: Arc<dyn CdnCache>,
}

impl BackendRegistry {
    pub fn new(
        bytecode: Arc<dyn PurgeCache>,
        web_server: Arc<dyn WebServerCache>,
        object: Arc<dyn PurgeCache>,
        cdn: Arc<dyn CdnCache>,
    ) -> Self {
        Self {
            bytecode,
            web_server,
            object,
            cdn,
        }
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry").finish_non_exhaustive()
    }
}
