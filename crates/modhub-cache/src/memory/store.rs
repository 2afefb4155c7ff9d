//! In-memory cache implementation using the moka crate.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use modhub_core::config::cache::MemoryCacheConfig;
use modhub_core::result::AppResult;
use modhub_core::traits::cache::CacheProvider;

/// In-memory cache provider using moka.
///
/// Entries live for the lifetime of the process; it is the backend for
/// single-process deployments and for tests.
#[derive(Debug, Clone)]
pub struct MemoryCacheProvider {
    /// The underlying moka cache.
    cache: Cache<String, String>,
}

impl MemoryCacheProvider {
    /// Create a new in-memory cache from configuration.
    pub fn new(config: &MemoryCacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);
        if config.time_to_live_seconds > 0 {
            builder = builder.time_to_live(Duration::from_secs(config.time_to_live_seconds));
        }

        Self {
            cache: builder.build(),
        }
    }
}

impl Default for MemoryCacheProvider {
    fn default() -> Self {
        Self::new(&MemoryCacheConfig::default())
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.cache.get(key).await)
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.cache.insert(key.to_string(), value.to_string()).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.cache.remove(key).await;
        Ok(())
    }

    async fn delete_multiple(&self, keys: &[String]) -> AppResult<()> {
        for key in keys {
            self.cache.invalidate(key).await;
        }
        debug!(count = keys.len(), "Deleted cache keys");
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64> {
        // Moka doesn't support pattern scanning, so we iterate.
        let prefix = pattern.trim_end_matches('*');

        let keys_to_remove: Vec<String> = self
            .cache
            .iter()
            .filter(|entry| entry.0.starts_with(prefix))
            .map(|entry| entry.0.to_string())
            .collect();

        let count = keys_to_remove.len() as u64;
        for key in keys_to_remove {
            self.cache.remove(&key).await;
        }

        debug!(pattern, count, "Deleted keys matching pattern");
        Ok(count)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn flush_all(&self) -> AppResult<()> {
        self.cache.invalidate_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_provider() -> MemoryCacheProvider {
        let config = MemoryCacheConfig {
            max_capacity: 1000,
            time_to_live_seconds: 60,
        };
        MemoryCacheProvider::new(&config)
    }

    #[tokio::test]
    async fn test_set_get() {
        let provider = make_provider();
        provider.set("key1", "value1").await.unwrap();
        let val = provider.get("key1").await.unwrap();
        assert_eq!(val, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_set_replaces_whole_blob() {
        let provider = make_provider();
        provider.set("list", "[\"a\",\"b\"]").await.unwrap();
        provider.set("list", "[\"c\"]").await.unwrap();
        assert_eq!(provider.get("list").await.unwrap().as_deref(), Some("[\"c\"]"));
    }

    #[tokio::test]
    async fn test_delete() {
        let provider = make_provider();
        provider.set("key2", "value2").await.unwrap();
        provider.delete("key2").await.unwrap();
        let val = provider.get("key2").await.unwrap();
        assert_eq!(val, None);
    }

    #[tokio::test]
    async fn test_delete_multiple() {
        let provider = make_provider();
        provider.set("a", "1").await.unwrap();
        provider.set("b", "2").await.unwrap();
        provider.set("c", "3").await.unwrap();
        provider
            .delete_multiple(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(provider.get("a").await.unwrap(), None);
        assert_eq!(provider.get("b").await.unwrap(), None);
        assert_eq!(provider.get("c").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_delete_pattern_only_touches_prefix() {
        let provider = make_provider();
        provider.set("cache:system_list", "{}").await.unwrap();
        provider.set("cache:hook_info", "{}").await.unwrap();
        provider.set("cache_bootstrap:bootstrap_modules", "[]").await.unwrap();
        let removed = provider.delete_pattern("cache:*").await.unwrap();
        assert_eq!(removed, 2);
        assert!(
            provider
                .get("cache_bootstrap:bootstrap_modules")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_json_roundtrip() {
        let provider = make_provider();
        let data = serde_json::json!({"name": "test", "count": 42});
        provider.set_json("json_key", &data).await.unwrap();
        let result: Option<serde_json::Value> = provider.get_json("json_key").await.unwrap();
        assert_eq!(result, Some(data));
    }

    #[tokio::test]
    async fn test_health_check() {
        let provider = make_provider();
        assert!(provider.health_check().await.unwrap());
    }
}
