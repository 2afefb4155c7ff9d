//! Hook implementation index: which extensions implement which hook, in
//! module order, persisted across processes.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use modhub_cache::{CacheTiers, keys};
use modhub_core::config::registry::RegistryConfig;
use modhub_core::result::AppResult;
use modhub_core::traits::cache::CacheProvider;

use crate::diagnostics::{DiagnosticLog, ExtensionDiagnostic};
use crate::registry::ExtensionRegistry;
use crate::snapshot::ListKind;

use super::provider::{
    AlterRequest, HOOK_INFO_ALTER_HOOK, HookInfo, IMPLEMENTATIONS_ALTER_HOOK,
};
use super::table::HookTable;

/// One implementor of a hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationEntry {
    /// Implementing extension.
    pub extension: String,
    /// Lazy-load group the implementation lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[derive(Debug, Default)]
struct IndexState {
    /// Whether the persisted index has been read in this process.
    loaded: bool,
    implementations: BTreeMap<String, Vec<ImplementationEntry>>,
    /// Set when `implementations` differs from the persisted copy.
    dirty: bool,
    hook_info: Option<BTreeMap<String, HookInfo>>,
}

/// Per-hook implementor lists.
///
/// The first lookup of a hook scans the module list; later lookups
/// re-verify the recorded implementors and prune those that vanished.
/// Changes are written back by [`write_cache`](Self::write_cache).
#[derive(Debug)]
pub struct HookIndex {
    registry: Arc<ExtensionRegistry>,
    table: Arc<HookTable>,
    tiers: CacheTiers,
    config: RegistryConfig,
    diagnostics: Arc<DiagnosticLog>,
    state: Mutex<IndexState>,
}

impl HookIndex {
    /// Creates an index over the registry's module order.
    pub fn new(
        registry: Arc<ExtensionRegistry>,
        table: Arc<HookTable>,
        tiers: CacheTiers,
        config: RegistryConfig,
        diagnostics: Arc<DiagnosticLog>,
    ) -> Self {
        Self {
            registry,
            table,
            tiers,
            config,
            diagnostics,
            state: Mutex::new(IndexState::default()),
        }
    }

    /// Names of the extensions implementing `hook`, in call order.
    pub async fn implementors_of(&self, hook: &str) -> AppResult<Vec<String>> {
        Ok(self
            .entries_of(hook)
            .await?
            .into_iter()
            .map(|e| e.extension)
            .collect())
    }

    /// Implementors of `hook` with their lazy-load groups.
    pub async fn entries_of(&self, hook: &str) -> AppResult<Vec<ImplementationEntry>> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await;

        let (mut entries, fresh) = self.verify_or_scan(&mut state, hook).await?;
        if !fresh {
            return Ok(entries);
        }

        if hook != IMPLEMENTATIONS_ALTER_HOOK {
            let registrants = self.registrants(&mut state).await?;
            entries = self.offer_to_registrants(hook, entries, &registrants).await;
        }

        debug!(hook = %hook, count = entries.len(), "Indexed hook implementations");
        state.implementations.insert(hook.to_string(), entries.clone());
        state.dirty = true;
        Ok(entries)
    }

    /// Lets the implementors of `module_implements_alter` reorder or drop
    /// entries of a list built outside the index.
    pub async fn apply_registrant_overrides(
        &self,
        hook: &str,
        entries: Vec<ImplementationEntry>,
    ) -> AppResult<Vec<ImplementationEntry>> {
        let registrants = {
            let mut state = self.state.lock().await;
            self.ensure_loaded(&mut state).await;
            self.registrants(&mut state).await?
        };
        Ok(self.offer_to_registrants(hook, entries, &registrants).await)
    }

    /// Per-hook metadata: declarations of every enabled module, later
    /// modules overriding earlier ones, then passed through
    /// `hook_info_alter`.
    pub async fn hook_info(&self) -> AppResult<BTreeMap<String, HookInfo>> {
        let mut state = self.state.lock().await;
        self.hook_info_locked(&mut state).await
    }

    /// Persists the index if it changed and `method` is cacheable.
    ///
    /// Returns whether a write happened. A skipped write keeps the index
    /// dirty for a later request. Never writes when the registry keeps its
    /// lists in process only.
    pub async fn write_cache(&self, method: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        if !state.dirty || !self.registry.writes_cache() {
            return Ok(false);
        }
        if !self.config.is_cacheable_method(method) {
            debug!(method = %method, "Skipping hook index write for non-cacheable request");
            return Ok(false);
        }

        self.tiers
            .default
            .set_json(&keys::module_implements(), &state.implementations)
            .await?;
        state.dirty = false;
        info!(hooks = state.implementations.len(), "Hook implementation index written");
        Ok(true)
    }

    /// Clears the in-process index and metadata and deletes the persisted
    /// copies.
    pub async fn reset(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        *state = IndexState::default();
        self.tiers
            .default
            .delete_multiple(&[keys::module_implements(), keys::hook_info()])
            .await?;
        debug!("Hook implementation index reset");
        Ok(())
    }

    async fn ensure_loaded(&self, state: &mut IndexState) {
        if state.loaded {
            return;
        }
        state.loaded = true;

        match self
            .tiers
            .default
            .get_json::<BTreeMap<String, Vec<ImplementationEntry>>>(&keys::module_implements())
            .await
        {
            Ok(Some(implementations)) => {
                debug!(hooks = implementations.len(), "Loaded persisted hook index");
                state.implementations = implementations;
            }
            Ok(None) => debug!("No persisted hook index"),
            Err(e) => warn!(error = %e, "Failed to read persisted hook index"),
        }
    }

    /// Verified entries of an indexed hook, or a plain scan for a new one.
    /// The flag tells which. New scans are not stored here.
    async fn verify_or_scan(
        &self,
        state: &mut IndexState,
        hook: &str,
    ) -> AppResult<(Vec<ImplementationEntry>, bool)> {
        match state.implementations.get(hook).cloned() {
            Some(entries) => Ok((self.verify(state, hook, entries).await, false)),
            None => Ok((self.scan(state, hook).await?, true)),
        }
    }

    async fn registrants(&self, state: &mut IndexState) -> AppResult<Vec<ImplementationEntry>> {
        let (registrants, fresh) = self
            .verify_or_scan(state, IMPLEMENTATIONS_ALTER_HOOK)
            .await?;
        if fresh {
            state
                .implementations
                .insert(IMPLEMENTATIONS_ALTER_HOOK.to_string(), registrants.clone());
            state.dirty = true;
        }
        Ok(registrants)
    }

    async fn verify(
        &self,
        state: &mut IndexState,
        hook: &str,
        entries: Vec<ImplementationEntry>,
    ) -> Vec<ImplementationEntry> {
        let mut kept = Vec::with_capacity(entries.len());
        let mut pruned = false;

        for entry in entries {
            if let Some(group) = &entry.group {
                self.table.load_group(&entry.extension, group).await;
            }
            if self.table.exists(&entry.extension, hook).await {
                kept.push(entry);
            } else {
                pruned = true;
                self.diagnostics
                    .record(ExtensionDiagnostic::StaleImplementation {
                        hook: hook.to_string(),
                        extension: entry.extension,
                    })
                    .await;
            }
        }

        if pruned {
            state.implementations.insert(hook.to_string(), kept.clone());
            state.dirty = true;
        }
        kept
    }

    async fn scan(&self, state: &mut IndexState, hook: &str) -> AppResult<Vec<ImplementationEntry>> {
        let group = self
            .hook_info_locked(state)
            .await?
            .get(hook)
            .and_then(|info| info.group.clone());

        let mut entries = Vec::new();
        for module in self.registry.resolve_list(ListKind::ModuleEnabled, None).await? {
            if let Some(group) = &group {
                self.table.load_group(&module, group).await;
            }
            if self.table.exists(&module, hook).await {
                entries.push(ImplementationEntry {
                    extension: module,
                    group: group.clone(),
                });
            }
        }
        Ok(entries)
    }

    async fn offer_to_registrants(
        &self,
        hook: &str,
        entries: Vec<ImplementationEntry>,
        registrants: &[ImplementationEntry],
    ) -> Vec<ImplementationEntry> {
        if registrants.is_empty() {
            return entries;
        }

        let data = match serde_json::to_value(&entries) {
            Ok(data) => data,
            Err(e) => {
                warn!(hook = %hook, error = %e, "Failed to encode implementations");
                return entries;
            }
        };
        let mut request = AlterRequest::new(data).with_context(json!(hook));

        for registrant in registrants {
            let Some(provider) = self.table.get(&registrant.extension).await else {
                continue;
            };
            if let Err(e) = provider.alter(IMPLEMENTATIONS_ALTER_HOOK, &mut request).await {
                warn!(
                    hook = %hook,
                    extension = %registrant.extension,
                    error = %e,
                    "Implementation override failed"
                );
            }
        }

        match serde_json::from_value::<Vec<ImplementationEntry>>(request.data) {
            Ok(altered) => altered,
            Err(e) => {
                warn!(hook = %hook, error = %e, "Discarding malformed implementation override");
                entries
            }
        }
    }

    async fn hook_info_locked(
        &self,
        state: &mut IndexState,
    ) -> AppResult<BTreeMap<String, HookInfo>> {
        if let Some(info) = &state.hook_info {
            return Ok(info.clone());
        }

        match self
            .tiers
            .default
            .get_json::<BTreeMap<String, HookInfo>>(&keys::hook_info())
            .await
        {
            Ok(Some(info)) => {
                state.hook_info = Some(info.clone());
                return Ok(info);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read cached hook info"),
        }

        let modules = self.registry.resolve_list(ListKind::ModuleEnabled, None).await?;
        let mut info = BTreeMap::new();
        for module in &modules {
            if let Some(provider) = self.table.get(module).await {
                info.extend(provider.hook_info());
            }
        }

        let mut request = AlterRequest::new(serde_json::to_value(&info)?);
        for module in &modules {
            let Some(provider) = self.table.get(module).await else {
                continue;
            };
            if !provider.implements(HOOK_INFO_ALTER_HOOK) {
                continue;
            }
            if let Err(e) = provider.alter(HOOK_INFO_ALTER_HOOK, &mut request).await {
                warn!(extension = %module, error = %e, "hook_info_alter failed");
            }
        }
        let info: BTreeMap<String, HookInfo> = match request.data {
            Value::Null => BTreeMap::new(),
            data => serde_json::from_value(data)?,
        };

        if self.registry.writes_cache() {
            if let Err(e) = self.tiers.default.set_json(&keys::hook_info(), &info).await {
                warn!(error = %e, "Failed to cache hook info");
            }
        }
        state.hook_info = Some(info.clone());
        Ok(info)
    }
}
