//! Shared fixtures for extension integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use modhub_cache::CacheTiers;
use modhub_core::config::registry::RegistryConfig;
use modhub_core::types::extension::{ExtensionKind, ExtensionRecord};
use modhub_extension::store::InMemoryMetadataStore;
use modhub_extension::{ExtensionHooks, ExtensionManager};

/// A manager over an in-memory store and in-memory cache tiers.
pub struct TestSite {
    pub store: Arc<InMemoryMetadataStore>,
    pub tiers: CacheTiers,
    pub config: RegistryConfig,
    pub manager: ExtensionManager,
}

impl TestSite {
    pub fn new(records: Vec<ExtensionRecord>) -> Self {
        Self::with_config(records, RegistryConfig::default())
    }

    pub fn with_config(records: Vec<ExtensionRecord>, config: RegistryConfig) -> Self {
        let store = Arc::new(InMemoryMetadataStore::with_records(records));
        let tiers = CacheTiers::in_memory();
        let manager = ExtensionManager::new(store.clone(), tiers.clone(), config.clone());
        Self {
            store,
            tiers,
            config,
            manager,
        }
    }

    /// A second manager sharing this site's store and cache, standing in
    /// for another process.
    pub fn another_process(&self) -> ExtensionManager {
        ExtensionManager::new(self.store.clone(), self.tiers.clone(), self.config.clone())
    }

    /// Like [`another_process`](Self::another_process), but never writes
    /// the shared cache.
    pub fn read_only_process(&self) -> ExtensionManager {
        ExtensionManager::read_only(self.store.clone(), self.tiers.clone(), self.config.clone())
    }

    pub async fn register(&self, hooks: ExtensionHooks) {
        self.manager
            .register(hooks.into_provider())
            .await
            .expect("provider registers");
    }
}

pub fn module(name: &str) -> ExtensionRecord {
    ExtensionRecord::new(
        ExtensionKind::Module,
        name,
        format!("modules/{name}/{name}.module"),
    )
}

pub fn theme(name: &str) -> ExtensionRecord {
    ExtensionRecord::new(ExtensionKind::Theme, name, format!("themes/{name}/{name}.info"))
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
