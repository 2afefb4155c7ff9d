//! In-process metadata store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use modhub_core::result::AppResult;
use modhub_core::traits::metadata::MetadataStore;
use modhub_core::types::extension::{ExtensionKind, ExtensionRecord};

/// Metadata store holding records in memory.
///
/// Used by embedders that manage extension state themselves, and by tests.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    records: RwLock<BTreeMap<(ExtensionKind, String), ExtensionRecord>>,
}

impl InMemoryMetadataStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = ExtensionRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| ((record.kind, record.name.clone()), record))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Inserts or replaces a record.
    pub async fn upsert(&self, record: ExtensionRecord) {
        self.records
            .write()
            .await
            .insert((record.kind, record.name.clone()), record);
    }

    /// Removes a record.
    pub async fn remove(&self, kind: ExtensionKind, name: &str) -> Option<ExtensionRecord> {
        self.records.write().await.remove(&(kind, name.to_string()))
    }

    /// Flips the enabled flag of a record. Returns `false` if it is unknown.
    pub async fn set_enabled(&self, kind: ExtensionKind, name: &str, enabled: bool) -> bool {
        match self.records.write().await.get_mut(&(kind, name.to_string())) {
            Some(record) => {
                record.enabled = enabled;
                true
            }
            None => false,
        }
    }

    async fn enabled_of(&self, kind: ExtensionKind) -> BTreeMap<String, i32> {
        self.records
            .read()
            .await
            .values()
            .filter(|record| record.kind == kind && record.enabled)
            .map(|record| (record.name.clone(), record.weight))
            .collect()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn list_enabled_modules(&self) -> AppResult<BTreeMap<String, i32>> {
        Ok(self.enabled_of(ExtensionKind::Module).await)
    }

    async fn list_enabled_themes(&self) -> AppResult<BTreeMap<String, i32>> {
        Ok(self.enabled_of(ExtensionKind::Theme).await)
    }

    async fn get_extension_info(
        &self,
        kind: ExtensionKind,
        name: &str,
    ) -> AppResult<Option<ExtensionRecord>> {
        Ok(self.records.read().await.get(&(kind, name.to_string())).cloned())
    }
}
