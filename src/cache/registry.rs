//! Cache registry - central management for all object caches.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::typed::ErasedCache;
use super::{CacheConfig, TypedCache};

/// Central registry of named object caches.
///
/// Cloning is cheap; clones share the same set of caches.
#[derive(Clone, Default)]
pub struct CacheRegistry {
    caches: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

struct CacheEntry {
    cache: Arc<dyn ErasedCache>,
    type_name: &'static str,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an existing cache or create and register a new one.
    ///
    /// # Panics
    /// Panics if a cache with the same name was registered with different
    /// key/value types. Cache names are fixed at compile time, so this is a
    /// programming error.
    pub fn get_or_create<K, V>(&self, name: &str, config: CacheConfig) -> TypedCache<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        if let Some(cache) = self.get(name) {
            return cache;
        }

        let mut caches = self.caches.write();

        // Another caller may have won the race between get() and write()
        if let Some(existing) = caches.get(name) {
            return downcast(name, existing);
        }

        debug!("Creating object cache: {}", name);
        let cache = TypedCache::<K, V>::new(name, config);
        caches.insert(
            name.to_string(),
            CacheEntry {
                cache: Arc::new(cache.clone()),
                type_name: std::any::type_name::<TypedCache<K, V>>(),
            },
        );

        cache
    }

    /// Get an existing cache by name.
    ///
    /// # Panics
    /// Panics if the cache exists with different types.
    pub fn get<K, V>(&self, name: &str) -> Option<TypedCache<K, V>>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.caches.read().get(name).map(|entry| downcast(name, entry))
    }

    /// Drop every entry of every registered cache.
    ///
    /// Returns the number of caches that were flushed.
    pub fn invalidate_all(&self) -> usize {
        let caches = self.caches.read();
        for (name, entry) in caches.iter() {
            entry.cache.invalidate_all();
            debug!("Flushed object cache: {}", name);
        }
        caches.len()
    }

    /// Total number of live entries across all caches.
    pub fn entry_count(&self) -> u64 {
        self.caches
            .read()
            .values()
            .map(|entry| entry.cache.entry_count())
            .sum()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.caches.read().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.caches.read().is_empty()
    }
}

fn downcast<K, V>(name: &str, entry: &CacheEntry) -> TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    match entry.cache.as_any().downcast_ref::<TypedCache<K, V>>() {
        Some(cache) => cache.clone(),
        None => panic!(
            "Cache '{}' type mismatch: expected {}, got {}",
            name,
            std::any::type_name::<TypedCache<K, V>>(),
            entry.type_name
        ),
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let caches = self.caches.read();
        f.debug_struct("CacheRegistry")
            .field("cache_count", &caches.len())
            .field("cache_names", &caches.keys().collect::<Vec<_>>())
            .finish()
    }
}
