//! Closure-backed hook provider for in-process extensions.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use serde_json::Value;
use tracing::debug;

use modhub_core::result::AppResult;

use super::provider::{AlterRequest, HookInfo, HookProvider};

type InvokeFn = Arc<dyn Fn(&[Value]) -> AppResult<Option<Value>> + Send + Sync>;
type AlterFn = Arc<dyn Fn(&mut AlterRequest) -> AppResult<()> + Send + Sync>;

#[derive(Clone)]
enum Callback {
    Invoke(InvokeFn),
    Alter(AlterFn),
}

#[derive(Clone)]
struct Handler {
    callback: Callback,
    group: Option<String>,
}

/// Hook implementations of one extension, built from closures.
///
/// ```ignore
/// let hooks = ExtensionHooks::new("node")
///     .on("permission", |_| Ok(Some(json!({"administer nodes": {}}))))
///     .on_alter("form_alter", |req| { req.data["node"] = json!(true); Ok(()) });
/// ```
pub struct ExtensionHooks {
    name: String,
    handlers: HashMap<String, Handler>,
    hook_info: BTreeMap<String, HookInfo>,
    loaded_groups: DashSet<String>,
}

impl std::fmt::Debug for ExtensionHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut hooks: Vec<&String> = self.handlers.keys().collect();
        hooks.sort();
        f.debug_struct("ExtensionHooks")
            .field("name", &self.name)
            .field("hooks", &hooks)
            .field("hook_info", &self.hook_info)
            .finish()
    }
}

impl ExtensionHooks {
    /// Creates an extension with no implementations.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: HashMap::new(),
            hook_info: BTreeMap::new(),
            loaded_groups: DashSet::new(),
        }
    }

    /// Implements an invocable hook.
    pub fn on<F>(mut self, hook: &str, handler: F) -> Self
    where
        F: Fn(&[Value]) -> AppResult<Option<Value>> + Send + Sync + 'static,
    {
        self.insert(hook, Callback::Invoke(Arc::new(handler)), None);
        self
    }

    /// Implements an alter hook under its full name (e.g. `form_alter`).
    pub fn on_alter<F>(mut self, hook: &str, handler: F) -> Self
    where
        F: Fn(&mut AlterRequest) -> AppResult<()> + Send + Sync + 'static,
    {
        self.insert(hook, Callback::Alter(Arc::new(handler)), None);
        self
    }

    /// Implements an invocable hook that only becomes visible once `group`
    /// has been loaded.
    pub fn on_in_group<F>(mut self, group: &str, hook: &str, handler: F) -> Self
    where
        F: Fn(&[Value]) -> AppResult<Option<Value>> + Send + Sync + 'static,
    {
        self.insert(hook, Callback::Invoke(Arc::new(handler)), Some(group));
        self
    }

    /// Alter counterpart of [`on_in_group`](Self::on_in_group).
    pub fn on_alter_in_group<F>(mut self, group: &str, hook: &str, handler: F) -> Self
    where
        F: Fn(&mut AlterRequest) -> AppResult<()> + Send + Sync + 'static,
    {
        self.insert(hook, Callback::Alter(Arc::new(handler)), Some(group));
        self
    }

    /// Declares metadata for a hook.
    pub fn declare(mut self, hook: &str, info: HookInfo) -> Self {
        self.hook_info.insert(hook.to_string(), info);
        self
    }

    /// Wraps the extension for registration.
    pub fn into_provider(self) -> Arc<dyn HookProvider> {
        Arc::new(self)
    }

    fn insert(&mut self, hook: &str, callback: Callback, group: Option<&str>) {
        self.handlers.insert(
            hook.to_string(),
            Handler {
                callback,
                group: group.map(str::to_string),
            },
        );
    }

    fn visible(&self, hook: &str) -> Option<&Handler> {
        self.handlers.get(hook).filter(|handler| {
            handler
                .group
                .as_ref()
                .is_none_or(|group| self.loaded_groups.contains(group))
        })
    }
}

#[async_trait]
impl HookProvider for ExtensionHooks {
    fn extension(&self) -> &str {
        &self.name
    }

    fn implements(&self, hook: &str) -> bool {
        self.visible(hook).is_some()
    }

    async fn invoke(&self, hook: &str, args: &[Value]) -> AppResult<Option<Value>> {
        match self.visible(hook).map(|h| &h.callback) {
            Some(Callback::Invoke(handler)) => handler(args),
            Some(Callback::Alter(_)) => {
                debug!(extension = %self.name, hook = %hook, "Alter hook invoked directly, ignoring");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn alter(&self, hook: &str, request: &mut AlterRequest) -> AppResult<()> {
        match self.visible(hook).map(|h| &h.callback) {
            Some(Callback::Alter(handler)) => handler(request),
            _ => Ok(()),
        }
    }

    fn hook_info(&self) -> BTreeMap<String, HookInfo> {
        self.hook_info.clone()
    }

    fn load_group(&self, group: &str) {
        self.loaded_groups.insert(group.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_grouped_hook_hidden_until_loaded() {
        let hooks = ExtensionHooks::new("views")
            .on("menu", |_| Ok(Some(json!({"admin/views": {}}))))
            .on_in_group("views", "views_data", |_| Ok(Some(json!({"node": {}}))))
            .declare("views_data", HookInfo::grouped("views"));

        assert!(hooks.implements("menu"));
        assert!(!hooks.implements("views_data"));
        assert_eq!(hooks.invoke("views_data", &[]).await.unwrap(), None);

        hooks.load_group("views");
        assert!(hooks.implements("views_data"));
        assert_eq!(
            hooks.invoke("views_data", &[]).await.unwrap(),
            Some(json!({"node": {}}))
        );
    }

    #[tokio::test]
    async fn test_alter_mutates_request() {
        let hooks = ExtensionHooks::new("node").on_alter("form_alter", |req| {
            req.data["touched"] = json!(true);
            req.context1 = json!("seen");
            Ok(())
        });

        let mut request = AlterRequest::new(json!({}));
        hooks.alter("form_alter", &mut request).await.unwrap();
        assert_eq!(request.data, json!({"touched": true}));
        assert_eq!(request.context1, json!("seen"));

        // Alter handlers do not answer plain invocations.
        assert_eq!(hooks.invoke("form_alter", &[]).await.unwrap(), None);
    }
}
