//! Core traits and types for the caching system.

use serde::{de::DeserializeOwned, Serialize};

use super::keys::EntityKind;

/// Trait for rows that can be cached per user.
///
/// Implementors are stored as raw JSON rows and decoded on every read, so
/// they must round-trip through serde.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Backend table this row belongs to
  fn kind() -> EntityKind;

  /// Row id
  fn id(&self) -> &str;
}

/// Result from a cache operation, including data and where it came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh backend data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  /// Create a new cache result from a live cache entry.
  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
    }
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from the backend just now
  Network,
  /// Served from a cache entry that had not expired
  Cache,
}
