//! Cache provider trait for pluggable caching backends.

use async_trait::async_trait;

use crate::result::AppResult;

/// Trait for cache backends (Redis or in-memory).
///
/// Values are opaque strings (JSON blobs). Entries are only ever replaced
/// wholesale: there are no partial-field operations, so a reader observes
/// either the previous or the new blob, never a mix.
#[async_trait]
pub trait CacheProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Get a value by key. Returns `None` if the key does not exist.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Store a value, replacing any previous blob under the key.
    async fn set(&self, key: &str, value: &str) -> AppResult<()>;

    /// Delete a key from the cache.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Delete several keys at once.
    async fn delete_multiple(&self, keys: &[String]) -> AppResult<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// Delete all keys matching a trailing-wildcard pattern (e.g., `"cache:*"`).
    /// Returns the number of deleted keys.
    async fn delete_pattern(&self, pattern: &str) -> AppResult<u64>;

    /// Get a typed value by deserializing from JSON.
    async fn get_json<T: serde::de::DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> AppResult<Option<T>>
    where
        Self: Sized,
    {
        match self.get(key).await? {
            Some(value) => {
                let parsed = serde_json::from_str(&value)?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Set a typed value by serializing to JSON.
    async fn set_json<T: serde::Serialize + Send + Sync>(&self, key: &str, value: &T) -> AppResult<()>
    where
        Self: Sized,
    {
        let json = serde_json::to_string(value)?;
        self.set(key, &json).await
    }

    /// Check that the cache backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Flush all entries owned by this provider.
    async fn flush_all(&self) -> AppResult<()>;
}
