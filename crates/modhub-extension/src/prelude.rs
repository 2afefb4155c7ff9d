//! Prelude for extension authors.

pub use async_trait::async_trait;
pub use serde_json::{Value, json};

pub use modhub_core::{AppError, AppResult};

pub use crate::hooks::{AlterRequest, ExtensionHooks, HookInfo, HookProvider};
pub use crate::manager::ExtensionManager;
pub use crate::snapshot::ListKind;
