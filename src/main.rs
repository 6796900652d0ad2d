//! Cachepurge - administrative cache purge service.
//!
//! Purges the bytecode, web server, object and CDN caches on request and
//! reports a per-backend result.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `cache` - In-process object cache with Moka
//! - `permissions` - Bearer token callers and capabilities
//! - `backends` - Cache backend capabilities and drivers
//! - `purge` - Action routing, purge orchestration, response aggregation
//! - `server` - HTTP transport

mod backends;
mod cache;
mod config;
mod permissions;
mod purge;
mod server;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use backends::{BackendRegistry, CloudflareBackend, NginxBackend, ObjectCacheBackend, OpcacheBackend};
use cache::CacheRegistry;
use config::Config;
use permissions::Permissions;
use purge::{ActionRouter, Purger};
use server::AppState;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cachepurge=info,tower_http=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting cachepurge...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    if config.admin_tokens.is_empty() {
        warn!("No admin tokens configured (ADMIN_TOKENS is empty); every action will be rejected");
    }

    // Object cache shared by the drivers and flushed by the object backend
    let cache = CacheRegistry::new();

    let http = reqwest::Client::builder()
        .user_agent(concat!("cachepurge/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let backends = BackendRegistry::new(
        Arc::new(OpcacheBackend::new(config.opcache_reset_command.as_deref())),
        Arc::new(NginxBackend::new(config.nginx_cache_path.clone())),
        Arc::new(ObjectCacheBackend::new(cache.clone())),
        Arc::new(CloudflareBackend::new(http, config.cloudflare.clone(), &cache)),
    );
    info!("Backends initialized");

    let purger = Purger::new(backends).with_timeout(config.backend_timeout);
    let router = ActionRouter::new(&config.action_prefix);
    info!("Registered actions: {:?}", router.action_ids());

    let permissions = Permissions::with_tokens(config.admin_tokens.clone(), config.viewer_tokens.clone());

    let app = server::build_router(AppState::new(purger, router, permissions));
    server::run(&config, app).await
}
