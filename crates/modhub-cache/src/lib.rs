//! # modhub-cache
//!
//! Cache provider implementations for ModHub. Supports two backends:
//!
//! - **memory**: In-process cache using [moka](https://crates.io/crates/moka)
//! - **redis**: Redis-backed cache shared across processes, using the
//!   [redis](https://crates.io/crates/redis) crate
//!
//! On top of the backend, [`CacheTiers`] exposes the two logical tiers the
//! extension registry writes to: a small `bootstrap` tier for boot-critical
//! data and a general `default` tier.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;
pub mod tiers;

pub use provider::CacheManager;
pub use tiers::{CacheBin, CacheTiers};
