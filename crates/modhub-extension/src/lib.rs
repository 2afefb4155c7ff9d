//! # modhub-extension
//!
//! Extension registry and hook dispatch for ModHub. Provides:
//!
//! - Dependency ordering of declared extension dependencies
//! - A cached extension list with bootstrap and full tiers
//! - A persisted index of hook implementors
//! - Hook dispatch with result merging and multi-type alter calls

pub mod diagnostics;
pub mod graph;
pub mod hooks;
pub mod manager;
pub mod prelude;
pub mod registry;
pub mod snapshot;
pub mod store;

pub use diagnostics::ExtensionDiagnostic;
pub use graph::{DependencyOrder, DependencySpec, build_dependency_order, parse_dependency};
pub use hooks::{
    AlterRequest, AlterTypes, ExtensionHooks, HookDispatcher, HookIndex, HookInfo, HookProvider,
    HookTable, MergedResult,
};
pub use manager::ExtensionManager;
pub use registry::{ExtensionRegistry, RebuildOutcome};
pub use snapshot::{ExtensionListSnapshot, ListKind};
