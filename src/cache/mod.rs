//! In-process object cache built on Moka.
//!
//! Components that keep derived data in memory (CDN zone lookups, for
//! instance) register a named cache here. The object-cache backend purges
//! the whole registry in one call.
//!
//! ## Usage
//!
//! ```rust
//! let registry = CacheRegistry::new();
//! let zones = registry.get_or_create::<String, String>("cloudflare_zones", CacheConfig::cold_data());
//!
//! zones.insert(domain.clone(), zone_id);
//! registry.invalidate_all(); // drops every entry in every registered cache
//! ```

mod config;
mod registry;
mod typed;

pub use config::CacheConfig;
pub use registry::CacheRegistry;
pub use typed::TypedCache;
