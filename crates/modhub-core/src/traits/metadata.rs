//! Extension metadata store trait.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::extension::{ExtensionKind, ExtensionRecord};

/// Persistent source of truth for installed extensions.
///
/// Each call is expected to reflect a consistent point-in-time snapshot of
/// the store. The registry only reads from it.
#[async_trait]
pub trait MetadataStore: Send + Sync + std::fmt::Debug + 'static {
    /// Enabled modules mapped to their administrative weight.
    async fn list_enabled_modules(&self) -> AppResult<BTreeMap<String, i32>>;

    /// Enabled themes mapped to their administrative weight.
    async fn list_enabled_themes(&self) -> AppResult<BTreeMap<String, i32>>;

    /// Full record (location and declared info) of one extension.
    async fn get_extension_info(
        &self,
        kind: ExtensionKind,
        name: &str,
    ) -> AppResult<Option<ExtensionRecord>>;
}
