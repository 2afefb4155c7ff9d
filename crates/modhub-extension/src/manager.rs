//! Extension manager: wires the registry, hook index, dispatcher and hook
//! table together and owns their process-scoped state.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use modhub_cache::CacheTiers;
use modhub_core::config::registry::RegistryConfig;
use modhub_core::error::AppError;
use modhub_core::result::AppResult;
use modhub_core::traits::metadata::MetadataStore;

use crate::diagnostics::{DiagnosticLog, ExtensionDiagnostic};
use crate::hooks::dispatcher::{AlterTypes, HookDispatcher, MergedResult};
use crate::hooks::index::HookIndex;
use crate::hooks::provider::{AlterRequest, HookProvider};
use crate::hooks::table::HookTable;
use crate::registry::ExtensionRegistry;
use crate::snapshot::ListKind;

/// Entry point to the extension system.
#[derive(Debug)]
pub struct ExtensionManager {
    hooks: Arc<HookTable>,
    registry: Arc<ExtensionRegistry>,
    index: Arc<HookIndex>,
    dispatcher: Arc<HookDispatcher>,
    diagnostics: Arc<DiagnosticLog>,
}

impl ExtensionManager {
    /// Creates a manager reading extensions from `store` and caching
    /// derived lists in `tiers`.
    pub fn new(store: Arc<dyn MetadataStore>, tiers: CacheTiers, config: RegistryConfig) -> Self {
        Self::build(store, tiers, config, true)
    }

    /// Creates a manager that reads the cache tiers but never writes them.
    ///
    /// Used by tooling that runs without the site's hook providers. It can
    /// still invalidate the shared lists.
    pub fn read_only(
        store: Arc<dyn MetadataStore>,
        tiers: CacheTiers,
        config: RegistryConfig,
    ) -> Self {
        Self::build(store, tiers, config, false)
    }

    fn build(
        store: Arc<dyn MetadataStore>,
        tiers: CacheTiers,
        config: RegistryConfig,
        writes_cache: bool,
    ) -> Self {
        let hooks = Arc::new(HookTable::new());
        let diagnostics = Arc::new(DiagnosticLog::new());
        let registry = ExtensionRegistry::new(
            store,
            tiers.clone(),
            hooks.clone(),
            config.clone(),
            diagnostics.clone(),
        );
        let registry = Arc::new(if writes_cache {
            registry
        } else {
            registry.without_cache_writes()
        });
        let index = Arc::new(HookIndex::new(
            registry.clone(),
            hooks.clone(),
            tiers,
            config.clone(),
            diagnostics.clone(),
        ));
        let dispatcher = Arc::new(HookDispatcher::new(
            registry.clone(),
            index.clone(),
            hooks.clone(),
            config.default_theme.clone(),
        ));

        Self {
            hooks,
            registry,
            index,
            dispatcher,
            diagnostics,
        }
    }

    /// Makes an extension's hook implementations available.
    pub async fn register(&self, provider: Arc<dyn HookProvider>) -> AppResult<()> {
        self.hooks.register(provider).await
    }

    /// Withdraws an extension's hook implementations. Indexed entries for
    /// it are pruned on their next lookup.
    pub async fn unregister(&self, extension: &str) -> AppResult<()> {
        self.hooks
            .unregister(extension)
            .await
            .map(|_| ())
            .ok_or_else(|| {
                AppError::not_found(format!("No hook provider registered for '{extension}'"))
            })
    }

    /// Names of one extension list, in order.
    pub async fn resolve_list(
        &self,
        kind: ListKind,
        fixed: Option<Vec<String>>,
    ) -> AppResult<Vec<String>> {
        self.registry.resolve_list(kind, fixed).await
    }

    /// Calls every implementor of `hook` and merges the results.
    pub async fn invoke_all(&self, hook: &str, args: &[Value]) -> AppResult<MergedResult> {
        self.dispatcher.invoke_all(hook, args).await
    }

    /// Runs the alter hooks named by `types` over `request`.
    pub async fn alter(
        &self,
        types: impl Into<AlterTypes>,
        request: &mut AlterRequest,
    ) -> AppResult<()> {
        self.dispatcher.alter(types, request).await
    }

    /// Drops every cached and in-process list, index and alter call list,
    /// and forgets which lazy-load groups were loaded.
    pub async fn invalidate(&self) -> AppResult<()> {
        self.registry.invalidate().await?;
        self.index.reset().await?;
        self.dispatcher.reset().await;
        self.hooks.reset_loaded_groups();
        self.diagnostics.clear().await;
        info!("Extension state invalidated");
        Ok(())
    }

    /// End-of-request hook: writes the hook index back for cacheable
    /// request methods.
    pub async fn end_request(&self, method: &str) -> AppResult<bool> {
        match self.index.write_cache(method).await {
            Ok(written) => Ok(written),
            Err(e) => {
                warn!(method = %method, error = %e, "Failed to persist hook index");
                Err(e)
            }
        }
    }

    /// Changes the theme whose chain runs last in alter calls.
    pub async fn set_active_theme(&self, theme: Option<String>) {
        self.dispatcher.set_active_theme(theme).await;
    }

    /// Non-fatal problems raised since the last invalidation.
    pub async fn diagnostics(&self) -> Vec<ExtensionDiagnostic> {
        self.diagnostics.entries().await
    }

    /// Returns the extension registry.
    pub fn registry(&self) -> &Arc<ExtensionRegistry> {
        &self.registry
    }

    /// Returns the hook implementation index.
    pub fn index(&self) -> &Arc<HookIndex> {
        &self.index
    }

    /// Returns the hook dispatcher.
    pub fn dispatcher(&self) -> &Arc<HookDispatcher> {
        &self.dispatcher
    }

    /// Returns the hook table.
    pub fn hooks(&self) -> &Arc<HookTable> {
        &self.hooks
    }
}
