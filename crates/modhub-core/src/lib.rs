//! # modhub-core
//!
//! Core crate for ModHub. Contains the metadata store and cache traits,
//! configuration schemas, extension record types, and the unified error
//! system.
//!
//! This crate has **no** internal dependencies on other ModHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
