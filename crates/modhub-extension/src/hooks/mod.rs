//! Hook system: capability lookup, implementation index, and dispatch.

pub mod closure;
pub mod dispatcher;
pub mod index;
pub mod provider;
pub mod table;

pub use closure::ExtensionHooks;
pub use dispatcher::{AlterTypes, HookDispatcher, MergedResult};
pub use index::{HookIndex, ImplementationEntry};
pub use provider::{AlterRequest, HookInfo, HookProvider};
pub use table::HookTable;
