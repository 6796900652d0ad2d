//! Configuration module.
//!
//! Loads configuration from environment variables. `main` reads `.env` first.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use url::Url;

use crate::backends::cloudflare::{CloudflareSettings, DEFAULT_API_URL, DevMode};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,

    /// Prefix joined with `_` to every action id.
    pub action_prefix: String,

    /// Tokens granting full access (comma-separated).
    pub admin_tokens: Vec<String>,

    /// Tokens granting read-only access (comma-separated).
    pub viewer_tokens: Vec<String>,

    /// Per backend call timeout. `None` when disabled.
    pub backend_timeout: Option<Duration>,

    // Backends
    pub opcache_reset_command: Option<String>,
    pub nginx_cache_path: Option<PathBuf>,
    pub cloudflare: CloudflareSettings,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Backend settings are optional; an unconfigured backend reports an
    /// error detail when it is invoked.
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("invalid BIND_ADDR")?;

        let backend_timeout = match optional("BACKEND_TIMEOUT_SECS") {
            Some(secs) => {
                let secs: u64 = secs.parse().context("invalid BACKEND_TIMEOUT_SECS")?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => Some(Duration::from_secs(30)),
        };

        let dev_mode = match optional("CLOUDFLARE_DEV_MODE") {
            Some(value) => value
                .parse::<DevMode>()
                .map_err(anyhow::Error::msg)
                .context("invalid CLOUDFLARE_DEV_MODE")?,
            None => DevMode::default(),
        };

        let mut api_url = optional("CLOUDFLARE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !api_url.ends_with('/') {
            api_url.push('/');
        }
        let api_url = Url::parse(&api_url).context("invalid CLOUDFLARE_API_URL")?;

        Ok(Self {
            bind_addr,
            action_prefix: optional("ACTION_PREFIX").unwrap_or_else(|| "clear_caches".to_string()),
            admin_tokens: list("ADMIN_TOKENS"),
            viewer_tokens: list("VIEWER_TOKENS"),
            backend_timeout,
            opcache_reset_command: optional("OPCACHE_RESET_COMMAND"),
            nginx_cache_path: optional("NGINX_CACHE_PATH").map(PathBuf::from),
            cloudflare: CloudflareSettings {
                api_token: optional("CLOUDFLARE_API_TOKEN"),
                domain: optional("CLOUDFLARE_DOMAIN"),
                dev_mode,
                api_url,
            },
        })
    }
}

/// Read a variable, treating empty values as unset.
fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a comma-separated list.
fn list(key: &str) -> Vec<String> {
    split_list(&env::var(key).unwrap_or_default())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
