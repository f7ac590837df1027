//! In-memory caching in front of the journal backend.
//!
//! This module provides a backend-agnostic caching mechanism that:
//! - Stores values under string keys with a per-entry TTL, expiring lazily on read
//! - Invalidates whole entity kinds by key prefix after writes
//! - Serves per-user collections cache-first, filling the cache on a miss

mod keys;
mod layer;
mod traits;
mod ttl;

pub use keys::{CacheKey, EntityKind};
pub use layer::{CacheLayer, CachedRows};
pub use traits::{CacheResult, CacheSource, Cacheable};
pub use ttl::{TtlCache, DEFAULT_TTL};
