//! Core type definitions used across the ModHub workspace.

pub mod extension;

pub use extension::{ExtensionInfo, ExtensionKind, ExtensionRecord};
