//! The capability interface every extension exposes to the hook system.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use modhub_core::result::AppResult;

/// Extension point whose implementations may reorder or drop the
/// implementors of any other hook.
pub const IMPLEMENTATIONS_ALTER_HOOK: &str = "module_implements_alter";

/// Alter hook run over the collected hook metadata.
pub const HOOK_INFO_ALTER_HOOK: &str = "hook_info_alter";

/// Metadata an extension declares about a hook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookInfo {
    /// Lazy-load group holding implementations of the hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl HookInfo {
    /// Metadata placing the hook in `group`.
    pub fn grouped(group: impl Into<String>) -> Self {
        Self {
            group: Some(group.into()),
        }
    }
}

/// Mutable arguments of an alter call.
///
/// `data` is the primary payload; the two context slots carry auxiliary
/// values that implementations may read or change. The request is handed
/// to one implementation at a time by exclusive reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlterRequest {
    /// Primary payload being altered.
    pub data: Value,
    /// First auxiliary context.
    #[serde(default)]
    pub context1: Value,
    /// Second auxiliary context.
    #[serde(default)]
    pub context2: Value,
}

impl AlterRequest {
    /// Creates a request with empty contexts.
    pub fn new(data: Value) -> Self {
        Self {
            data,
            context1: Value::Null,
            context2: Value::Null,
        }
    }

    /// Sets the first context.
    pub fn with_context(mut self, context1: Value) -> Self {
        self.context1 = context1;
        self
    }
}

/// Hook implementations of one extension, looked up by hook name.
///
/// `implements` must only report `true` for hooks that are callable right
/// now: implementations living in a lazy-load group become visible after
/// [`load_group`](Self::load_group) has been called for that group.
#[async_trait]
pub trait HookProvider: Send + Sync + std::fmt::Debug {
    /// Name of the extension these implementations belong to.
    fn extension(&self) -> &str;

    /// Whether the extension currently implements `hook`.
    fn implements(&self, hook: &str) -> bool;

    /// Calls the implementation of `hook`. `None` means "no return value".
    async fn invoke(&self, hook: &str, args: &[Value]) -> AppResult<Option<Value>>;

    /// Calls the alter implementation registered under the full hook name
    /// (e.g. `form_alter`).
    async fn alter(&self, hook: &str, request: &mut AlterRequest) -> AppResult<()>;

    /// Per-hook metadata declared by this extension.
    fn hook_info(&self) -> BTreeMap<String, HookInfo> {
        BTreeMap::new()
    }

    /// Makes the implementations of a lazy-load group available.
    fn load_group(&self, _group: &str) {}
}
