//! Core traits defined in `modhub-core` and implemented by other crates.

pub mod cache;
pub mod metadata;

pub use cache::CacheProvider;
pub use metadata::MetadataStore;
