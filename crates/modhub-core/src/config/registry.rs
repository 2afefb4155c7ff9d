//! Extension registry configuration.

use serde::{Deserialize, Serialize};

/// Extension registry and hook index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Hooks whose implementation makes a module bootstrap-eligible.
    #[serde(default = "default_bootstrap_hooks")]
    pub bootstrap_hooks: Vec<String>,
    /// Request methods for which a dirty hook index is written back.
    #[serde(default = "default_cacheable_methods")]
    pub cacheable_methods: Vec<String>,
    /// Theme whose alter hooks run after all modules.
    #[serde(default)]
    pub default_theme: Option<String>,
    /// Core compatibility stripped from dependency version constraints (e.g. `7.x`).
    #[serde(default = "default_core_compatibility")]
    pub core_compatibility: String,
    /// Directory containing `*.info.json` extension manifests.
    #[serde(default = "default_manifest_directory")]
    pub manifest_directory: String,
}

impl RegistryConfig {
    /// Whether a dirty hook index may be persisted at the end of a request
    /// made with `method`.
    pub fn is_cacheable_method(&self, method: &str) -> bool {
        self.cacheable_methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method))
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bootstrap_hooks: default_bootstrap_hooks(),
            cacheable_methods: default_cacheable_methods(),
            default_theme: None,
            core_compatibility: default_core_compatibility(),
            manifest_directory: default_manifest_directory(),
        }
    }
}

fn default_bootstrap_hooks() -> Vec<String> {
    ["boot", "exit", "watchdog", "language_init"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cacheable_methods() -> Vec<String> {
    vec!["GET".to_string(), "HEAD".to_string()]
}

fn default_core_compatibility() -> String {
    "7.x".to_string()
}

fn default_manifest_directory() -> String {
    "./extensions".to_string()
}
