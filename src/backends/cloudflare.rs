//! CDN driver for the Cloudflare v4 API.
//!
//! The zone id for the configured domain is resolved on demand and kept in
//! the object cache, so an object cache purge forces a fresh lookup.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use super::{BackendError, BackendResult, CdnCache, PurgeCache};
use crate::cache::{CacheConfig, CacheRegistry, TypedCache};

/// Name of the object cache holding domain -> zone id lookups.
pub const ZONE_CACHE: &str = "cloudflare_zones";

/// Default API base.
pub const DEFAULT_API_URL: &str = "https://api.cloudflare.com/client/v4/";

/// Cloudflare development mode state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevMode {
    On,
    #[default]
    Off,
}

impl DevMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for DevMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DevMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "on" | "1" | "true" => Ok(Self::On),
            "off" | "0" | "false" => Ok(Self::Off),
            other => Err(format!("invalid development mode: {other}")),
        }
    }
}

/// Connection settings for the Cloudflare driver.
#[derive(Debug, Clone)]
pub struct CloudflareSettings {
    pub api_token: Option<String>,
    pub domain: Option<String>,
    pub dev_mode: DevMode,
    pub api_url: Url,
}

/// Standard v4 API response envelope.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Setting {
    value: String,
}

impl<T> ApiEnvelope<T> {
    fn into_result(self) -> BackendResult<T> {
        if !self.success {
            let detail = self
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(BackendError::failed(if detail.is_empty() {
                "Cloudflare API request failed".to_string()
            } else {
                detail
            }));
        }

        self.result
            .ok_or_else(|| BackendError::failed("Cloudflare API returned no result"))
    }
}

/// Cloudflare zone purge, settings and development mode.
#[derive(Debug, Clone)]
pub struct CloudflareBackend {
    http: reqwest::Client,
    settings: CloudflareSettings,
    zones: TypedCache<String, String>,
}

impl CloudflareBackend {
    pub fn new(http: reqwest::Client, settings: CloudflareSettings, registry: &CacheRegistry) -> Self {
        let zones = registry.get_or_create(ZONE_CACHE, CacheConfig::cold_data());
        Self {
            http,
            settings,
            zones,
        }
    }

    fn credentials(&self) -> BackendResult<(&str, &str)> {
        match (self.settings.api_token.as_deref(), self.settings.domain.as_deref()) {
            (Some(token), Some(domain)) => Ok((token, domain)),
            _ => Err(BackendError::not_configured(
                "Cloudflare API token or domain not configured",
            )),
        }
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        self.settings
            .api_url
            .join(path)
            .map_err(|e| BackendError::failed(format!("Invalid Cloudflare API URL: {e}")))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, token: &str) -> BackendResult<T> {
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        debug!("Cloudflare API responded with {}", status);

        let body = response.bytes().await?;
        match serde_json::from_slice::<ApiEnvelope<T>>(&body) {
            Ok(envelope) => envelope.into_result(),
            Err(_) if !status.is_success() => Err(BackendError::failed(format!("Cloudflare API returned {status}"))),
            Err(e) => Err(BackendError::failed(format!("Invalid Cloudflare API response: {e}"))),
        }
    }

    /// Look the zone up remotely and refresh the cached entry.
    async fn lookup_zone(&self) -> BackendResult<String> {
        let (token, domain) = self.credentials()?;
        let url = self.endpoint("zones")?;

        let zones: Vec<Zone> = self
            .send(self.http.get(url).query(&[("name", domain)]), token)
            .await?;

        let zone = zones
            .into_iter()
            .next()
            .map(|z| z.id)
            .ok_or_else(|| BackendError::failed(format!("No Cloudflare zone found for {domain}")))?;

        self.zones.insert(domain.to_string(), zone.clone());
        Ok(zone)
    }

    async fn zone_id(&self) -> BackendResult<String> {
        let (_, domain) = self.credentials()?;
        match self.zones.get(&domain.to_string()) {
            Some(zone) => Ok(zone),
            None => self.lookup_zone().await,
        }
    }
}

#[async_trait]
impl CdnCache for CloudflareBackend {
    async fn update_settings(&self) -> BackendResult<String> {
        let zone = self.lookup_zone().await?;
        info!("Cloudflare zone resolved: {}", zone);
        Ok(zone)
    }

    async fn update_dev_mode(&self) -> BackendResult<String> {
        let zone = self.zone_id().await?;
        let (token, _) = self.credentials()?;
        let url = self.endpoint(&format!("zones/{zone}/settings/development_mode"))?;
        let body = json!({ "value": self.settings.dev_mode.as_str() });

        let setting: Setting = self.send(self.http.patch(url).json(&body), token).await?;
        info!("Cloudflare development mode is {}", setting.value);
        Ok(setting.value)
    }
}

#[async_trait]
impl PurgeCache for CloudflareBackend {
    async fn purge_cache(&self) -> BackendResult<()> {
        let zone = self.zone_id().await?;
        let (token, _) = self.credentials()?;
        let url = self.endpoint(&format!("zones/{zone}/purge_cache"))?;
        let body = json!({ "purge_everything": true });

        let _: serde_json::Value = self.send(self.http.post(url).json(&body), token).await?;
        info!("Cloudflare cache purged for zone {}", zone);
        Ok(())
    }
}
