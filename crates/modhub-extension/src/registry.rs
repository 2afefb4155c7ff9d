//! Extension registry: resolves the active extension lists, serving them
//! from process memory, the cache tiers, or a rebuild from the metadata
//! store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use modhub_cache::{CacheBin, CacheTiers, keys};
use modhub_core::config::registry::RegistryConfig;
use modhub_core::error::AppError;
use modhub_core::result::AppResult;
use modhub_core::traits::cache::CacheProvider;
use modhub_core::traits::metadata::MetadataStore;
use modhub_core::types::extension::{ExtensionKind, ExtensionRecord};

use crate::diagnostics::{DiagnosticLog, ExtensionDiagnostic};
use crate::graph::{build_dependency_order, parse_dependency};
use crate::hooks::table::HookTable;
use crate::snapshot::{ExtensionListSnapshot, FilepathEntry, ListEntry, ListKind, ThemeRecord};

/// Result of [`ExtensionRegistry::rebuild`].
#[derive(Debug, Clone)]
pub enum RebuildOutcome {
    /// A fresh snapshot was computed and written to the cache tiers.
    Rebuilt(Arc<ExtensionListSnapshot>),
    /// Another rebuild is already running in this process.
    InProgress,
}

#[derive(Debug, Default)]
struct ListState {
    /// Fixed lists installed by callers, per kind.
    overrides: HashMap<ListKind, Vec<String>>,
    snapshot: Option<Arc<ExtensionListSnapshot>>,
    /// Bootstrap list read on its own from the bootstrap tier.
    bootstrap: Option<Arc<Vec<ListEntry>>>,
}

/// Clears the rebuild flag when the rebuild ends, including on error.
struct RebuildGuard<'a>(&'a AtomicBool);

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Facade over the extension list.
///
/// Lists are looked up in this order: a fixed override, the in-process
/// copy, the cache tier, and finally a rebuild from the metadata store.
#[derive(Debug)]
pub struct ExtensionRegistry {
    store: Arc<dyn MetadataStore>,
    tiers: CacheTiers,
    hooks: Arc<HookTable>,
    config: RegistryConfig,
    state: RwLock<ListState>,
    rebuilding: AtomicBool,
    diagnostics: Arc<DiagnosticLog>,
    /// Whether rebuilt lists are written to the cache tiers.
    writes_cache: bool,
}

impl ExtensionRegistry {
    /// Creates a registry. `hooks` decides bootstrap eligibility.
    pub fn new(
        store: Arc<dyn MetadataStore>,
        tiers: CacheTiers,
        hooks: Arc<HookTable>,
        config: RegistryConfig,
        diagnostics: Arc<DiagnosticLog>,
    ) -> Self {
        Self {
            store,
            tiers,
            hooks,
            config,
            state: RwLock::new(ListState::default()),
            rebuilding: AtomicBool::new(false),
            diagnostics,
            writes_cache: true,
        }
    }

    /// Keeps rebuilt lists in process only.
    ///
    /// For processes that do not register the hook providers of the
    /// site: their bootstrap list would be incomplete, so it must not
    /// reach the shared tiers.
    pub fn without_cache_writes(mut self) -> Self {
        self.writes_cache = false;
        self
    }

    /// Whether rebuilt lists are written to the cache tiers.
    pub fn writes_cache(&self) -> bool {
        self.writes_cache
    }

    /// Registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the names of one list, in order.
    ///
    /// A `fixed` list replaces the list of that kind until
    /// [`reset_list`](Self::reset_list) is called, and is returned as-is.
    pub async fn resolve_list(
        &self,
        kind: ListKind,
        fixed: Option<Vec<String>>,
    ) -> AppResult<Vec<String>> {
        if let Some(list) = fixed {
            debug!(list = %kind, count = list.len(), "Installing fixed extension list");
            self.state.write().await.overrides.insert(kind, list.clone());
            return Ok(list);
        }

        if let Some(list) = self.in_process(kind).await {
            return Ok(list);
        }

        if kind == ListKind::Bootstrap {
            if let Some(entries) = self
                .read_tier::<Vec<ListEntry>>(&self.tiers.bootstrap, &keys::bootstrap_modules())
                .await
            {
                let names = entries.iter().map(|e| e.name.clone()).collect();
                self.state.write().await.bootstrap = Some(Arc::new(entries));
                return Ok(names);
            }
        }

        Ok(self.snapshot().await?.names(kind))
    }

    /// Drops the fixed override of `kind`. With no kind, drops every
    /// override together with the in-process lists, so the next lookup
    /// reads the cache tier again.
    pub async fn reset_list(&self, kind: Option<ListKind>) {
        let mut state = self.state.write().await;
        match kind {
            Some(kind) => {
                state.overrides.remove(&kind);
            }
            None => {
                state.overrides.clear();
                state.snapshot = None;
                state.bootstrap = None;
            }
        }
        debug!(list = ?kind, "Extension list reset");
    }

    /// The full snapshot, loading or rebuilding it if needed.
    pub async fn snapshot(&self) -> AppResult<Arc<ExtensionListSnapshot>> {
        if let Some(snapshot) = self.state.read().await.snapshot.clone() {
            return Ok(snapshot);
        }

        if let Some(snapshot) = self
            .read_tier::<ExtensionListSnapshot>(&self.tiers.default, &keys::system_list())
            .await
        {
            let snapshot = Arc::new(snapshot);
            self.state.write().await.snapshot = Some(snapshot.clone());
            return Ok(snapshot);
        }

        match self.rebuild().await? {
            RebuildOutcome::Rebuilt(snapshot) => Ok(snapshot),
            RebuildOutcome::InProgress => Err(AppError::service_unavailable(
                "Extension list is being rebuilt and no cached copy exists",
            )),
        }
    }

    /// Recomputes the snapshot from the metadata store and writes both
    /// cache tiers.
    ///
    /// A dependency cycle aborts the rebuild before anything is written.
    pub async fn rebuild(&self) -> AppResult<RebuildOutcome> {
        if self
            .rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Extension list rebuild already in progress");
            return Ok(RebuildOutcome::InProgress);
        }
        let _guard = RebuildGuard(&self.rebuilding);

        info!("Rebuilding extension list");
        let (snapshot, diagnostics) = self.build_snapshot().await?;
        for diagnostic in diagnostics {
            self.diagnostics.record(diagnostic).await;
        }

        let snapshot = Arc::new(snapshot);
        self.persist(&snapshot).await;

        {
            let mut state = self.state.write().await;
            state.bootstrap = Some(Arc::new(snapshot.bootstrap.clone()));
            state.snapshot = Some(snapshot.clone());
        }

        info!(
            modules = snapshot.module_enabled.len(),
            bootstrap = snapshot.bootstrap.len(),
            themes = snapshot.theme.len(),
            "Extension list rebuilt"
        );
        Ok(RebuildOutcome::Rebuilt(snapshot))
    }

    /// Deletes the cached lists and the in-process copies. Fixed overrides
    /// are kept.
    pub async fn invalidate(&self) -> AppResult<()> {
        {
            let mut state = self.state.write().await;
            state.snapshot = None;
            state.bootstrap = None;
        }
        self.tiers.bootstrap.delete(&keys::bootstrap_modules()).await?;
        self.tiers.default.delete(&keys::system_list()).await?;
        info!("Extension list invalidated");
        Ok(())
    }

    /// Whether `name` is in the active module list.
    pub async fn module_exists(&self, name: &str) -> AppResult<bool> {
        Ok(self
            .resolve_list(ListKind::ModuleEnabled, None)
            .await?
            .iter()
            .any(|m| m == name))
    }

    /// Location of an enabled extension's main file.
    pub async fn get_filename(&self, kind: ExtensionKind, name: &str) -> AppResult<Option<String>> {
        Ok(self.snapshot().await?.filepath(kind, name).map(str::to_string))
    }

    /// Enabled themes with their resolved inheritance.
    pub async fn themes(&self) -> AppResult<BTreeMap<String, ThemeRecord>> {
        Ok(self.snapshot().await?.theme.clone())
    }

    /// Root ancestor first, `theme` itself last. Empty if the theme is not
    /// enabled.
    pub async fn theme_chain(&self, theme: &str) -> AppResult<Vec<String>> {
        let snapshot = self.snapshot().await?;
        Ok(match snapshot.theme.get(theme) {
            Some(record) => {
                let mut chain = record.base_themes.clone();
                chain.push(theme.to_string());
                chain
            }
            None => Vec::new(),
        })
    }

    /// Non-fatal problems raised since the last reset.
    pub async fn diagnostics(&self) -> Vec<ExtensionDiagnostic> {
        self.diagnostics.entries().await
    }

    async fn in_process(&self, kind: ListKind) -> Option<Vec<String>> {
        let state = self.state.read().await;
        if let Some(list) = state.overrides.get(&kind) {
            return Some(list.clone());
        }
        if let Some(snapshot) = &state.snapshot {
            return Some(snapshot.names(kind));
        }
        match (kind, &state.bootstrap) {
            (ListKind::Bootstrap, Some(entries)) => {
                Some(entries.iter().map(|e| e.name.clone()).collect())
            }
            _ => None,
        }
    }

    async fn read_tier<T: DeserializeOwned + Send>(&self, bin: &CacheBin, key: &str) -> Option<T> {
        match bin.get_json::<T>(key).await {
            Ok(Some(value)) => {
                debug!(bin = %bin.prefix(), key = %key, "Extension list cache hit");
                Some(value)
            }
            Ok(None) => {
                debug!(bin = %bin.prefix(), key = %key, "Extension list cache miss");
                None
            }
            Err(e) => {
                warn!(bin = %bin.prefix(), key = %key, error = %e, "Extension list cache read failed");
                None
            }
        }
    }

    async fn persist(&self, snapshot: &ExtensionListSnapshot) {
        if !self.writes_cache {
            debug!("Cache writes disabled, keeping rebuilt list in process");
            return;
        }
        if let Err(e) = self
            .tiers
            .bootstrap
            .set_json(&keys::bootstrap_modules(), &snapshot.bootstrap)
            .await
        {
            warn!(error = %e, "Failed to write bootstrap list to cache");
        }
        if let Err(e) = self.tiers.default.set_json(&keys::system_list(), snapshot).await {
            warn!(error = %e, "Failed to write extension list to cache");
        }
    }

    async fn load_records(
        &self,
        kind: ExtensionKind,
        weights: BTreeMap<String, i32>,
    ) -> AppResult<BTreeMap<String, ExtensionRecord>> {
        let mut records = BTreeMap::new();
        for (name, weight) in weights {
            match self.store.get_extension_info(kind, &name).await? {
                Some(mut record) => {
                    record.weight = weight;
                    records.insert(name, record);
                }
                None => warn!(kind = %kind, extension = %name, "Enabled extension has no record"),
            }
        }
        Ok(records)
    }

    async fn build_snapshot(&self) -> AppResult<(ExtensionListSnapshot, Vec<ExtensionDiagnostic>)> {
        let module_weights = self.store.list_enabled_modules().await?;
        let theme_weights = self.store.list_enabled_themes().await?;
        let modules = self.load_records(ExtensionKind::Module, module_weights).await?;
        let themes = self.load_records(ExtensionKind::Theme, theme_weights).await?;

        let mut graph = BTreeMap::new();
        for (name, record) in &modules {
            let mut specs = Vec::with_capacity(record.info.dependencies.len());
            for raw in &record.info.dependencies {
                match parse_dependency(raw, &self.config.core_compatibility) {
                    Ok(spec) => specs.push(spec),
                    Err(e) => warn!(extension = %name, dependency = %raw, error = %e, "Ignoring invalid dependency"),
                }
            }
            graph.insert(name.clone(), specs);
        }
        let order = build_dependency_order(&graph).map_err(|e| {
            error!(cycle = ?e.cycle, "Extension list rebuild aborted");
            AppError::from(e)
        })?;

        let mut ordered: Vec<&ExtensionRecord> = modules.values().collect();
        ordered.sort_by(|a, b| {
            let rank = |r: &ExtensionRecord| (r.weight, order.weight(&r.name).unwrap_or(0));
            rank(a).cmp(&rank(b)).then_with(|| a.name.cmp(&b.name))
        });

        let module_enabled: Vec<ListEntry> = ordered
            .iter()
            .map(|r| ListEntry {
                name: r.name.clone(),
                filepath: r.filepath.clone(),
            })
            .collect();

        let groups = self.bootstrap_groups(&module_enabled).await;
        let mut bootstrap = Vec::new();
        for entry in &module_enabled {
            if self.is_bootstrap_module(&entry.name, &groups).await {
                bootstrap.push(entry.clone());
            }
        }

        let (theme, diagnostics) = resolve_themes(&themes);

        let filepaths = module_enabled
            .iter()
            .map(|e| FilepathEntry {
                kind: ExtensionKind::Module,
                name: e.name.clone(),
                filepath: e.filepath.clone(),
            })
            .chain(theme.values().map(|t| FilepathEntry {
                kind: ExtensionKind::Theme,
                name: t.name.clone(),
                filepath: t.filepath.clone(),
            }))
            .collect();

        Ok((
            ExtensionListSnapshot {
                bootstrap,
                module_enabled,
                theme,
                filepaths,
            },
            diagnostics,
        ))
    }

    /// Lazy-load groups of the bootstrap hooks, as declared by the enabled
    /// modules. Later modules override earlier declarations.
    async fn bootstrap_groups(&self, modules: &[ListEntry]) -> BTreeMap<String, String> {
        let mut groups = BTreeMap::new();
        for entry in modules {
            let Some(provider) = self.hooks.get(&entry.name).await else {
                continue;
            };
            for (hook, info) in provider.hook_info() {
                if !self.config.bootstrap_hooks.contains(&hook) {
                    continue;
                }
                match info.group {
                    Some(group) => groups.insert(hook, group),
                    None => groups.remove(&hook),
                };
            }
        }
        groups
    }

    async fn is_bootstrap_module(&self, name: &str, groups: &BTreeMap<String, String>) -> bool {
        for hook in &self.config.bootstrap_hooks {
            if let Some(group) = groups.get(hook) {
                self.hooks.load_group(name, group).await;
            }
            if self.hooks.exists(name, hook).await {
                return true;
            }
        }
        false
    }
}

/// Resolves base-theme chains. Themes whose chain is broken are left out.
fn resolve_themes(
    themes: &BTreeMap<String, ExtensionRecord>,
) -> (BTreeMap<String, ThemeRecord>, Vec<ExtensionDiagnostic>) {
    let mut chains: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    let mut diagnostics = Vec::new();

    for name in themes.keys() {
        match base_theme_chain(themes, name) {
            Ok(chain) => {
                chains.insert(name.as_str(), chain);
            }
            Err(base_theme) => diagnostics.push(ExtensionDiagnostic::MissingBaseTheme {
                theme: name.clone(),
                base_theme,
            }),
        }
    }

    let mut resolved: BTreeMap<String, ThemeRecord> = BTreeMap::new();
    for (name, chain) in &chains {
        let Some(record) = themes.get(*name) else {
            continue;
        };
        let engine = match chain.first() {
            Some(root) => themes.get(root).and_then(|r| r.info.engine.clone()),
            None => record.info.engine.clone(),
        };
        resolved.insert(
            name.to_string(),
            ThemeRecord {
                name: name.to_string(),
                filepath: record.filepath.clone(),
                weight: record.weight,
                info: record.info.clone(),
                engine,
                base_themes: chain.clone(),
                sub_themes: Vec::new(),
            },
        );
    }

    for (name, chain) in &chains {
        for ancestor in chain {
            if let Some(parent) = resolved.get_mut(ancestor) {
                parent.sub_themes.push(name.to_string());
            }
        }
    }

    (resolved, diagnostics)
}

/// Ancestors of `name`, root first. `Err` carries the base theme that is
/// missing or closes a loop.
fn base_theme_chain(
    themes: &BTreeMap<String, ExtensionRecord>,
    name: &str,
) -> Result<Vec<String>, String> {
    let mut chain: Vec<String> = Vec::new();
    let mut current = name;

    while let Some(base) = themes
        .get(current)
        .and_then(|r| r.info.base_theme.as_deref())
    {
        if base == name || chain.iter().any(|c| c == base) || !themes.contains_key(base) {
            return Err(base.to_string());
        }
        chain.push(base.to_string());
        current = base;
    }

    chain.reverse();
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theme(name: &str) -> ExtensionRecord {
        ExtensionRecord::new(ExtensionKind::Theme, name, format!("themes/{name}/{name}.info"))
    }

    fn themes(records: Vec<ExtensionRecord>) -> BTreeMap<String, ExtensionRecord> {
        records.into_iter().map(|r| (r.name.clone(), r)).collect()
    }

    #[test]
    fn test_chain_root_first_and_engine_inherited() {
        let themes = themes(vec![
            theme("root").with_engine("phptemplate"),
            theme("mid").with_base_theme("root"),
            theme("leaf").with_base_theme("mid").with_engine("twig"),
        ]);

        let (resolved, diagnostics) = resolve_themes(&themes);
        assert!(diagnostics.is_empty());

        let leaf = &resolved["leaf"];
        assert_eq!(leaf.base_themes, vec!["root".to_string(), "mid".to_string()]);
        assert_eq!(leaf.engine.as_deref(), Some("phptemplate"));
        assert_eq!(resolved["root"].sub_themes, vec!["leaf".to_string(), "mid".to_string()]);
        assert_eq!(resolved["mid"].sub_themes, vec!["leaf".to_string()]);
    }

    #[test]
    fn test_missing_or_looping_base_excludes_theme() {
        let themes = themes(vec![
            theme("orphan").with_base_theme("gone"),
            theme("child").with_base_theme("orphan"),
            theme("ping").with_base_theme("pong"),
            theme("pong").with_base_theme("ping"),
            theme("plain"),
        ]);

        let (resolved, diagnostics) = resolve_themes(&themes);
        assert_eq!(resolved.keys().collect::<Vec<_>>(), ["plain"]);
        assert_eq!(diagnostics.len(), 4);
        assert!(diagnostics.contains(&ExtensionDiagnostic::MissingBaseTheme {
            theme: "orphan".into(),
            base_theme: "gone".into(),
        }));
        assert!(diagnostics.contains(&ExtensionDiagnostic::MissingBaseTheme {
            theme: "child".into(),
            base_theme: "gone".into(),
        }));
    }
}
