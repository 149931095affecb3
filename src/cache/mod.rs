//! Response caching for the API layer.
//!
//! This module provides:
//! - `CacheService`: bounded key/value store with per-entry TTL, lazy expiry
//!   and insertion-order eviction
//! - `CacheRegistry`: the per-domain caches (documents, exchanges, users,
//!   general) handed to every consumer
//! - `CacheLayer`: fresh cache → network → stale cache → fallback ladder
//! - `QueryKey`: stable cache keys for parameterised queries

mod key;
mod layer;
mod registry;
mod store;
mod traits;

pub use key::QueryKey;
pub use layer::CacheLayer;
pub use registry::{CacheRegistry, ResponseCache};
pub use store::CacheService;
pub use traits::{CacheResult, CacheSource};
