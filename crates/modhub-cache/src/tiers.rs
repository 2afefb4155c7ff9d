//! Logical cache tiers layered over one cache backend.

use async_trait::async_trait;
use tracing::info;

use modhub_core::config::cache::CacheConfig;
use modhub_core::result::AppResult;
use modhub_core::traits::cache::CacheProvider;

use crate::provider::CacheManager;

/// A key-namespaced view of the shared cache backend.
///
/// Every key passed to a bin is stored as `<prefix><key>`, so bins sharing
/// a backend never see each other's entries.
#[derive(Debug, Clone)]
pub struct CacheBin {
    /// Backing cache.
    cache: CacheManager,
    /// Key prefix for bin isolation.
    prefix: String,
}

impl CacheBin {
    /// Creates a bin over `cache` with the given key prefix.
    pub fn new(cache: CacheManager, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    /// Returns the key prefix of this bin.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl CacheProvider for CacheBin {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.cache.get(&self.full_key(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.cache.set(&self.full_key(key), value).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.cache.delete(&self.full_key(key)).await
    }

    async fn delete_multiple(&self, keys: &[String]) -> AppResult<()> {
        let full_keys: Vec<String> = keys.iter().map(|k| self.full_key(k)).collect();
        self.cache.delete_multiple(&full_keys).await
    }

    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64> {
        self.cache.delete_pattern(&self.full_key(pattern)).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.cache.health_check().await
    }

    async fn flush_all(&self) -> AppResult<()> {
        self.cache.delete_pattern(&self.full_key("*")).await?;
        Ok(())
    }
}

/// The two cache tiers used by the extension registry.
#[derive(Debug, Clone)]
pub struct CacheTiers {
    /// Small tier holding boot-critical data only.
    pub bootstrap: CacheBin,
    /// General tier holding the full extension list and derived indexes.
    pub default: CacheBin,
}

impl CacheTiers {
    /// Creates both tiers over one backend using the configured prefixes.
    pub fn new(cache: CacheManager, config: &CacheConfig) -> Self {
        Self {
            bootstrap: CacheBin::new(cache.clone(), config.bootstrap_prefix.clone()),
            default: CacheBin::new(cache, config.default_prefix.clone()),
        }
    }

    /// Connects the configured backend and creates both tiers.
    pub async fn connect(config: &CacheConfig) -> AppResult<Self> {
        let cache = CacheManager::new(config).await?;
        info!(
            provider = %config.provider,
            bootstrap_prefix = %config.bootstrap_prefix,
            default_prefix = %config.default_prefix,
            "Cache tiers initialized"
        );
        Ok(Self::new(cache, config))
    }

    /// In-memory tiers with default prefixes (for tests and embedding).
    #[cfg(feature = "memory")]
    pub fn in_memory() -> Self {
        let provider = crate::memory::MemoryCacheProvider::default();
        let cache = CacheManager::from_provider(std::sync::Arc::new(provider));
        Self::new(cache, &CacheConfig::default())
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tiers_are_isolated() {
        let tiers = CacheTiers::in_memory();
        tiers.bootstrap.set("list", "boot").await.unwrap();
        tiers.default.set("list", "full").await.unwrap();

        assert_eq!(tiers.bootstrap.get("list").await.unwrap().as_deref(), Some("boot"));
        assert_eq!(tiers.default.get("list").await.unwrap().as_deref(), Some("full"));

        tiers.default.flush_all().await.unwrap();
        assert_eq!(tiers.default.get("list").await.unwrap(), None);
        assert_eq!(tiers.bootstrap.get("list").await.unwrap().as_deref(), Some("boot"));
    }

    #[tokio::test]
    async fn test_typed_blob_through_bin() {
        let tiers = CacheTiers::in_memory();
        let names = vec!["system".to_string(), "node".to_string()];
        tiers.default.set_json("names", &names).await.unwrap();
        let back: Option<Vec<String>> = tiers.default.get_json("names").await.unwrap();
        assert_eq!(back, Some(names));
    }
}
