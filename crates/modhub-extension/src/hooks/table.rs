//! Capability lookup table: extension name → hook provider.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::RwLock;
use tracing::{debug, info};

use modhub_core::error::AppError;
use modhub_core::result::AppResult;

use super::provider::HookProvider;

/// Registry of hook providers, keyed by extension name.
///
/// Populated when extensions are activated. A name in the extension list
/// without a provider simply implements nothing.
#[derive(Debug, Default)]
pub struct HookTable {
    /// Extension name → provider.
    providers: RwLock<HashMap<String, Arc<dyn HookProvider>>>,
    /// `(extension, group)` pairs already loaded in this process.
    loaded_groups: DashSet<(String, String)>,
}

impl HookTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the provider of an extension.
    pub async fn register(&self, provider: Arc<dyn HookProvider>) -> AppResult<()> {
        let name = provider.extension().to_string();
        let mut providers = self.providers.write().await;

        if providers.contains_key(&name) {
            return Err(AppError::extension(format!(
                "Hook provider for '{name}' is already registered"
            )));
        }

        info!(extension = %name, "Hook provider registered");
        providers.insert(name, provider);
        Ok(())
    }

    /// Removes the provider of an extension.
    pub async fn unregister(&self, extension: &str) -> Option<Arc<dyn HookProvider>> {
        let removed = self.providers.write().await.remove(extension);
        if removed.is_some() {
            self.loaded_groups.retain(|(ext, _)| ext != extension);
            info!(extension = %extension, "Hook provider unregistered");
        }
        removed
    }

    /// Gets the provider of an extension.
    pub async fn get(&self, extension: &str) -> Option<Arc<dyn HookProvider>> {
        self.providers.read().await.get(extension).cloned()
    }

    /// Whether `extension` currently implements `hook`.
    pub async fn exists(&self, extension: &str, hook: &str) -> bool {
        self.get(extension)
            .await
            .is_some_and(|provider| provider.implements(hook))
    }

    /// Loads a lazy-load group of an extension once per process.
    pub async fn load_group(&self, extension: &str, group: &str) {
        let key = (extension.to_string(), group.to_string());
        if self.loaded_groups.contains(&key) {
            return;
        }
        if let Some(provider) = self.get(extension).await {
            provider.load_group(group);
            debug!(extension = %extension, group = %group, "Loaded hook group");
            self.loaded_groups.insert(key);
        }
    }

    /// Forgets which groups were loaded, so the next lookup loads them
    /// again.
    pub fn reset_loaded_groups(&self) {
        self.loaded_groups.clear();
        debug!("Loaded hook groups reset");
    }
}
