//! Cache layer that orchestrates caching logic with backend fetching.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::keys::{CacheKey, EntityKind};
use super::traits::{CacheResult, Cacheable};
use super::ttl::{TtlCache, DEFAULT_TTL};

/// Raw backend rows as stored in the cache.
pub type CachedRows = Arc<Vec<Value>>;

/// Cache layer that manages caching logic and backend fetching.
///
/// This layer sits between the data-access code and the backend gateway,
/// serving per-user collections from the TTL cache and filling it on a miss.
pub struct CacheLayer {
  cache: Arc<TtlCache<CachedRows>>,
  /// How long a fetched collection stays servable
  ttl: Duration,
}

impl CacheLayer {
  /// Create a new cache layer over a shared cache.
  pub fn new(cache: Arc<TtlCache<CachedRows>>) -> Self {
    Self {
      cache,
      ttl: DEFAULT_TTL,
    }
  }

  /// Set the TTL used for fetched collections.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  /// Fetch a list with cache-first strategy.
  ///
  /// 1. Check cache - if live, decode and return immediately
  /// 2. On a miss, fetch from the backend
  /// 3. Store the rows, unless an invalidation happened while fetching
  ///
  /// Fetch failures are returned as-is and never cached.
  pub async fn fetch_list<T, F, Fut>(&self, key: &CacheKey, fetcher: F) -> Result<CacheResult<Vec<T>>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<Value>>>,
  {
    if let Some(rows) = self.cache.get(key.as_str()) {
      debug!(%key, "cache hit");
      return Ok(CacheResult::from_cache(decode_rows(&rows)?));
    }

    debug!(%key, "cache miss");
    let generation = self.cache.generation();
    let rows = fetcher().await?;
    let data = decode_rows(&rows)?;

    if self.cache.generation() == generation {
      self.cache.set_with_ttl(key.as_str(), Arc::new(rows), self.ttl);
    } else {
      // A write landed while we were fetching; these rows may predate it
      debug!(%key, "cache invalidated during fetch, not storing");
    }

    Ok(CacheResult::from_network(data))
  }

  /// Drop every cached collection of `kind`, for all users.
  pub fn invalidate(&self, kind: EntityKind) -> usize {
    let removed = self.cache.invalidate_by_prefix(kind.cache_prefix());
    debug!(kind = kind.label(), removed, "cache invalidated");
    removed
  }

  pub fn cache(&self) -> &TtlCache<CachedRows> {
    &self.cache
  }
}

impl Clone for CacheLayer {
  fn clone(&self) -> Self {
    Self {
      cache: Arc::clone(&self.cache),
      ttl: self.ttl,
    }
  }
}

fn decode_rows<T: Cacheable>(rows: &[Value]) -> Result<Vec<T>> {
  rows
    .iter()
    .map(|row| {
      T::deserialize(row).map_err(|e| eyre!("Failed to decode {} row: {}", T::kind().label(), e))
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use serde::Serialize;
  use serde_json::json;
  use std::sync::atomic::{AtomicUsize, Ordering};

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Letter {
    id: String,
    title: String,
  }

  impl Cacheable for Letter {
    fn kind() -> EntityKind {
      EntityKind::FutureLetters
    }

    fn id(&self) -> &str {
      &self.id
    }
  }

  fn layer() -> CacheLayer {
    CacheLayer::new(Arc::new(TtlCache::new())).with_ttl(Duration::from_secs(60))
  }

  fn rows() -> Vec<Value> {
    vec![json!({ "id": "l1", "title": "Dear me" })]
  }

  #[tokio::test(start_paused = true)]
  async fn test_miss_then_hit() {
    let layer = layer();
    let key = EntityKind::FutureLetters.cache_key("u1");
    let calls = AtomicUsize::new(0);

    let first = layer
      .fetch_list::<Letter, _, _>(&key, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(rows())
      })
      .await
      .unwrap();
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(first.data[0].title, "Dear me");

    let second = layer
      .fetch_list::<Letter, _, _>(&key, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(rows())
      })
      .await
      .unwrap();
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(second.data, first.data);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_expired_collection_is_refetched() {
    let layer = layer();
    let key = EntityKind::FutureLetters.cache_key("u1");

    layer
      .fetch_list::<Letter, _, _>(&key, || async { Ok(rows()) })
      .await
      .unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;

    let again = layer
      .fetch_list::<Letter, _, _>(&key, || async { Ok(rows()) })
      .await
      .unwrap();
    assert_eq!(again.source, CacheSource::Network);
  }

  #[tokio::test(start_paused = true)]
  async fn test_failures_are_not_cached() {
    let layer = layer();
    let key = EntityKind::FutureLetters.cache_key("u1");

    let result = layer
      .fetch_list::<Letter, _, _>(&key, || async { Err(eyre!("backend down")) })
      .await;
    assert!(result.is_err());
    assert!(layer.cache().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidation_during_fetch_skips_store() {
    let layer = layer();
    let key = EntityKind::FutureLetters.cache_key("u1");

    let result = layer
      .fetch_list::<Letter, _, _>(&key, || async {
        layer.invalidate(EntityKind::FutureLetters);
        Ok(rows())
      })
      .await
      .unwrap();

    assert_eq!(result.data.len(), 1);
    assert!(layer.cache().get(key.as_str()).is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn test_undecodable_rows_are_an_error() {
    let layer = layer();
    let key = EntityKind::FutureLetters.cache_key("u1");

    let result = layer
      .fetch_list::<Letter, _, _>(&key, || async { Ok(vec![json!({ "id": 3 })]) })
      .await;
    assert!(result.is_err());
  }
}
