//! Web server cache driver.
//!
//! Nginx keeps its FastCGI/proxy cache as plain files under a cache
//! directory. Purging removes everything inside that directory; nginx
//! repopulates it on the next request.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::fs;
use tracing::{debug, info};

use super::{BackendError, BackendResult, PurgeCache, WebServerCache};

/// Purges the nginx cache directory.
#[derive(Debug)]
pub struct NginxBackend {
    configured_path: Option<PathBuf>,
    /// Path validated by the last successful `update_settings()`.
    active_path: RwLock<Option<PathBuf>>,
}

impl NginxBackend {
    pub fn new(configured_path: Option<PathBuf>) -> Self {
        Self {
            configured_path,
            active_path: RwLock::new(None),
        }
    }

    /// Currently active cache directory, if settings were applied.
    pub fn active_path(&self) -> Option<PathBuf> {
        self.active_path.read().clone()
    }
}

#[async_trait]
impl WebServerCache for NginxBackend {
    async fn update_settings(&self) -> BackendResult<()> {
        let Some(path) = self.configured_path.as_ref() else {
            return Err(BackendError::not_configured("Nginx cache path not configured"));
        };

        let metadata = fs::metadata(path).await.map_err(|e| {
            BackendError::failed(format!(
                "Nginx cache path {} is not accessible: {}",
                path.display(),
                e
            ))
        })?;

        if !metadata.is_dir() {
            return Err(BackendError::failed(format!(
                "Nginx cache path {} is not a directory",
                path.display()
            )));
        }

        debug!("Nginx cache path set to {}", path.display());
        *self.active_path.write() = Some(path.clone());
        Ok(())
    }
}

#[async_trait]
impl PurgeCache for NginxBackend {
    async fn purge_cache(&self) -> BackendResult<()> {
        let Some(path) = self.active_path() else {
            return Err(BackendError::not_configured("Nginx cache path not configured"));
        };

        let removed = clear_directory(&path).await?;
        info!("Nginx cache purged: {} entries removed from {}", removed, path.display());
        Ok(())
    }
}

/// Remove every entry inside `dir`, keeping `dir` itself.
async fn clear_directory(dir: &Path) -> BackendResult<usize> {
    let mut entries = fs::read_dir(dir).await?;
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            fs::remove_dir_all(&path).await?;
        } else {
            fs::remove_file(&path).await?;
        }
        removed += 1;
    }

    Ok(removed)
}
