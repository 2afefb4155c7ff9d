//! Metadata store implementations.

pub mod manifest;
pub mod memory;

pub use manifest::ManifestStore;
pub use memory::InMemoryMetadataStore;
