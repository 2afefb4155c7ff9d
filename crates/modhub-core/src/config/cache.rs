//! Cache provider configuration.

use serde::{Deserialize, Serialize};

/// Top-level cache configuration.
///
/// Both cache tiers (bootstrap and default) share one backend and are
/// separated by key prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache provider type: `"memory"` or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Key prefix of the small boot-critical tier.
    #[serde(default = "default_bootstrap_prefix")]
    pub bootstrap_prefix: String,
    /// Key prefix of the general tier.
    #[serde(default = "default_default_prefix")]
    pub default_prefix: String,
    /// Redis-specific cache configuration.
    #[serde(default)]
    pub redis: RedisCacheConfig,
    /// In-memory cache configuration.
    #[serde(default)]
    pub memory: MemoryCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            bootstrap_prefix: default_bootstrap_prefix(),
            default_prefix: default_default_prefix(),
            redis: RedisCacheConfig::default(),
            memory: MemoryCacheConfig::default(),
        }
    }
}

/// Redis cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisCacheConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Key prefix for all ModHub cache keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// In-memory cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries in the cache.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    /// TTL for in-memory entries in seconds. `0` keeps entries until
    /// they are deleted or evicted.
    #[serde(default)]
    pub time_to_live_seconds: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            time_to_live_seconds: 0,
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_bootstrap_prefix() -> String {
    "cache_bootstrap:".to_string()
}

fn default_default_prefix() -> String {
    "cache:".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key_prefix() -> String {
    "modhub:".to_string()
}

fn default_max_capacity() -> u64 {
    10000
}
