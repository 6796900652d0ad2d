//! Object cache driver.

use async_trait::async_trait;
use tracing::info;

use super::{BackendResult, PurgeCache};
use crate::cache::CacheRegistry;

/// Flushes every cache in the shared object cache registry.
#[derive(Debug, Clone)]
pub struct ObjectCacheBackend {
    registry: CacheRegistry,
}

impl ObjectCacheBackend {
    pub fn new(registry: CacheRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl PurgeCache for ObjectCacheBackend {
    async fn purge_cache(&self) -> BackendResult<()> {
        let flushed = self.registry.invalidate_all();
        info!("Object cache flushed ({} caches)", flushed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;

    #[tokio::test]
    async fn test_purge_empties_registry() {
        let registry = CacheRegistry::new();
        let cache = registry.get_or_create::<u32, String>("items", CacheConfig::default());
        cache.insert(7, "seven".to_string());

        let backend = ObjectCacheBackend::new(registry.clone());
        backend.purge_cache().await.unwrap();

        assert_eq!(cache.get(&7), None);
        assert_eq!(registry.entry_count(), 0);
    }
}
