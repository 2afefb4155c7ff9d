//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod cache;
pub mod logging;
pub mod registry;

use serde::{Deserialize, Serialize};

use self::cache::CacheConfig;
use self::logging::LoggingConfig;
use self::registry::RegistryConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration file and `MODHUB__*` environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Extension registry settings.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Cache provider settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// The file is optional; values missing from it fall back to defaults.
    /// Environment variables prefixed with `MODHUB__` override file values
    /// (e.g. `MODHUB__CACHE__PROVIDER=redis`).
    pub fn load(path: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("MODHUB")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("registry.bootstrap_hooks")
                    .with_list_parse_key("registry.cacheable_methods")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load("does/not/exist").unwrap();
        assert_eq!(config.cache.provider, "memory");
        assert_eq!(config.logging.level, "info");
        assert!(config.registry.bootstrap_hooks.contains(&"boot".to_string()));
        assert!(config.registry.is_cacheable_method("get"));
        assert!(!config.registry.is_cacheable_method("POST"));
    }
}
