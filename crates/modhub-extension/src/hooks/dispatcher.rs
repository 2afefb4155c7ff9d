//! Hook dispatcher: calls implementations in index order.
//!
//! - `invoke_all` calls every implementor and merges the results.
//! - `alter` hands one [`AlterRequest`] to each implementor of one or more
//!   alter hooks in turn, then to the active theme's chain.
//!
//! A failing implementation is logged and skipped; the remaining
//! implementations still run.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, error};

use modhub_core::result::AppResult;

use crate::registry::ExtensionRegistry;
use crate::snapshot::ListKind;

use super::index::{HookIndex, ImplementationEntry};
use super::provider::AlterRequest;
use super::table::HookTable;

/// Aggregated results of [`HookDispatcher::invoke_all`].
///
/// Object results are merged into `keyed`, keys kept in the order they
/// first appeared; array and scalar results are appended to `positional`
/// in call order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedResult {
    /// Merged keyed results.
    pub keyed: Map<String, Value>,
    /// Positional results.
    pub positional: Vec<Value>,
}

impl MergedResult {
    /// Folds one implementation's return value into the result.
    pub fn absorb(&mut self, value: Value) {
        match value {
            Value::Null => {}
            Value::Object(map) => merge_maps(&mut self.keyed, map),
            Value::Array(items) => self.positional.extend(items),
            scalar => self.positional.push(scalar),
        }
    }

    /// Looks up a keyed result.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.keyed.get(key)
    }

    /// Whether no implementation returned anything.
    pub fn is_empty(&self) -> bool {
        self.keyed.is_empty() && self.positional.is_empty()
    }

    /// Collapses into one JSON value. Positional results take the keys
    /// `"0"`, `"1"`, ... when keyed results are also present.
    pub fn into_value(self) -> Value {
        if self.positional.is_empty() {
            return Value::Object(self.keyed);
        }
        if self.keyed.is_empty() {
            return Value::Array(self.positional);
        }
        let mut map = self.keyed;
        let mut next = 0usize;
        for item in self.positional {
            while map.contains_key(&next.to_string()) {
                next += 1;
            }
            map.insert(next.to_string(), item);
            next += 1;
        }
        Value::Object(map)
    }
}

fn merge_maps(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match target.get_mut(&key) {
            Some(existing) => merge_value(existing, value),
            None => {
                target.insert(key, value);
            }
        }
    }
}

fn merge_value(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(current), Value::Object(more)) => merge_maps(current, more),
        (Value::Array(current), Value::Array(more)) => current.extend(more),
        (Value::Array(current), scalar) => current.push(scalar),
        (slot, Value::Array(more)) if !slot.is_object() => {
            let mut items = vec![slot.take()];
            items.extend(more);
            *slot = Value::Array(items);
        }
        (slot, value) => *slot = value,
    }
}

/// The alter types of one [`HookDispatcher::alter`] call.
///
/// The first type is the primary one; `form` maps to the hook
/// `form_alter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterTypes(Vec<String>);

impl AlterTypes {
    /// Alter types in call order.
    pub fn types(&self) -> &[String] {
        &self.0
    }

    fn hooks(&self) -> Vec<String> {
        self.0.iter().map(|t| format!("{t}_alter")).collect()
    }

    fn cache_key(&self) -> String {
        self.0.join(",")
    }
}

impl From<&str> for AlterTypes {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for AlterTypes {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<String>> for AlterTypes {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl<const N: usize> From<[&str; N]> for AlterTypes {
    fn from(value: [&str; N]) -> Self {
        Self(value.iter().map(|t| t.to_string()).collect())
    }
}

/// One resolved alter call.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AlterCall {
    extension: String,
    hook: String,
}

/// Dispatches hooks to the implementations recorded in the index.
#[derive(Debug)]
pub struct HookDispatcher {
    registry: Arc<ExtensionRegistry>,
    index: Arc<HookIndex>,
    table: Arc<HookTable>,
    active_theme: RwLock<Option<String>>,
    /// Resolved call lists per joined alter types.
    alter_calls: RwLock<HashMap<String, Vec<AlterCall>>>,
}

impl HookDispatcher {
    /// Creates a dispatcher. `active_theme` selects the theme layer of
    /// alter calls.
    pub fn new(
        registry: Arc<ExtensionRegistry>,
        index: Arc<HookIndex>,
        table: Arc<HookTable>,
        active_theme: Option<String>,
    ) -> Self {
        Self {
            registry,
            index,
            table,
            active_theme: RwLock::new(active_theme),
            alter_calls: RwLock::new(HashMap::new()),
        }
    }

    /// Calls every implementor of `hook` and merges the results.
    pub async fn invoke_all(&self, hook: &str, args: &[Value]) -> AppResult<MergedResult> {
        let implementors = self.index.implementors_of(hook).await?;
        debug!(hook = %hook, implementors = implementors.len(), "Invoking hook");

        let mut merged = MergedResult::default();
        for extension in implementors {
            let Some(provider) = self.table.get(&extension).await else {
                continue;
            };
            if !provider.implements(hook) {
                continue;
            }
            match provider.invoke(hook, args).await {
                Ok(Some(value)) => merged.absorb(value),
                Ok(None) => {}
                Err(e) => error!(
                    hook = %hook,
                    extension = %extension,
                    error = %e,
                    "Hook implementation failed"
                ),
            }
        }
        Ok(merged)
    }

    /// Calls one extension's implementation of `hook`. `None` if it does
    /// not implement it.
    pub async fn invoke(
        &self,
        extension: &str,
        hook: &str,
        args: &[Value],
    ) -> AppResult<Option<Value>> {
        if !self.implements(extension, hook).await? {
            return Ok(None);
        }
        match self.table.get(extension).await {
            Some(provider) => provider.invoke(hook, args).await,
            None => Ok(None),
        }
    }

    /// Whether `extension` implements `hook`, loading the hook's group
    /// first.
    pub async fn implements(&self, extension: &str, hook: &str) -> AppResult<bool> {
        if let Some(group) = self
            .index
            .hook_info()
            .await?
            .get(hook)
            .and_then(|info| info.group.clone())
        {
            self.table.load_group(extension, &group).await;
        }
        Ok(self.table.exists(extension, hook).await)
    }

    /// Passes `request` through every implementation of the alter hooks
    /// named by `types`.
    ///
    /// Module implementations run in the primary type's order (extensions
    /// only implementing an extra type are merged in by module order);
    /// each extension runs its primary hook, then its extra hooks. The
    /// active theme's base themes, root first, then the theme itself run
    /// last.
    pub async fn alter(
        &self,
        types: impl Into<AlterTypes>,
        request: &mut AlterRequest,
    ) -> AppResult<()> {
        let types = types.into();
        if types.types().is_empty() {
            return Ok(());
        }

        let key = types.cache_key();
        let cached = self.alter_calls.read().await.get(&key).cloned();
        let calls = match cached {
            Some(calls) => calls,
            None => {
                let calls = self.resolve_alter_calls(&types).await?;
                self.alter_calls.write().await.insert(key, calls.clone());
                calls
            }
        };

        for call in calls {
            let Some(provider) = self.table.get(&call.extension).await else {
                continue;
            };
            if !provider.implements(&call.hook) {
                continue;
            }
            if let Err(e) = provider.alter(&call.hook, request).await {
                error!(
                    hook = %call.hook,
                    extension = %call.extension,
                    error = %e,
                    "Alter implementation failed"
                );
            }
        }
        Ok(())
    }

    /// Changes the theme layer of alter calls.
    pub async fn set_active_theme(&self, theme: Option<String>) {
        let mut active = self.active_theme.write().await;
        if *active != theme {
            *active = theme;
            self.alter_calls.write().await.clear();
            debug!(theme = ?active.as_deref(), "Active theme changed");
        }
    }

    /// Currently active theme.
    pub async fn active_theme(&self) -> Option<String> {
        self.active_theme.read().await.clone()
    }

    /// Forgets every resolved alter call list.
    pub async fn reset(&self) {
        self.alter_calls.write().await.clear();
    }

    async fn resolve_alter_calls(&self, types: &AlterTypes) -> AppResult<Vec<AlterCall>> {
        let hooks = types.hooks();
        let Some(primary) = hooks.first() else {
            return Ok(Vec::new());
        };

        let mut extensions = self.index.implementors_of(primary).await?;

        if hooks.len() > 1 {
            let mut extra: Vec<String> = Vec::new();
            for hook in &hooks[1..] {
                for extension in self.index.implementors_of(hook).await? {
                    if !extensions.contains(&extension) && !extra.contains(&extension) {
                        extra.push(extension);
                    }
                }
            }

            if !extra.is_empty() {
                let entries: Vec<ImplementationEntry> = self
                    .registry
                    .resolve_list(ListKind::ModuleEnabled, None)
                    .await?
                    .into_iter()
                    .filter(|m| extensions.contains(m) || extra.contains(m))
                    .map(|extension| ImplementationEntry {
                        extension,
                        group: None,
                    })
                    .collect();
                extensions = self
                    .index
                    .apply_registrant_overrides(primary, entries)
                    .await?
                    .into_iter()
                    .map(|e| e.extension)
                    .collect();
            }
        }

        let mut calls = Vec::new();
        for extension in &extensions {
            for hook in &hooks {
                if self.implements(extension, hook).await? {
                    calls.push(AlterCall {
                        extension: extension.clone(),
                        hook: hook.clone(),
                    });
                }
            }
        }

        let theme = self.active_theme.read().await.clone();
        if let Some(theme) = theme {
            for layer in self.registry.theme_chain(&theme).await? {
                for hook in &hooks {
                    if self.table.exists(&layer, hook).await {
                        calls.push(AlterCall {
                            extension: layer.clone(),
                            hook: hook.clone(),
                        });
                    }
                }
            }
        }

        debug!(
            types = %types.cache_key(),
            calls = calls.len(),
            "Resolved alter implementations"
        );
        Ok(calls)
    }
}
