//! Time-bounded key/value store with lazy expiry.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// TTL applied by `set` when no explicit TTL is given.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
  value: V,
  stored_at: Instant,
  ttl: Duration,
}

impl<V> CacheEntry<V> {
  fn is_expired(&self, now: Instant) -> bool {
    now.saturating_duration_since(self.stored_at) > self.ttl
  }
}

/// In-memory cache with per-entry TTL.
///
/// Expired entries are only noticed (and dropped) when they are read; there is
/// no background sweep. Entries can also be dropped in bulk by key prefix.
#[derive(Debug)]
pub struct TtlCache<V> {
  entries: Mutex<HashMap<String, CacheEntry<V>>>,
  default_ttl: Duration,
  /// Bumped on every removal that isn't an expiry, so in-flight reads can
  /// tell that they raced with an invalidation.
  generation: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
  pub fn new() -> Self {
    Self::with_default_ttl(DEFAULT_TTL)
  }

  pub fn with_default_ttl(default_ttl: Duration) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      default_ttl,
      generation: AtomicU64::new(0),
    }
  }

  /// Store a value under the default TTL, replacing any previous entry.
  pub fn set(&self, key: impl Into<String>, value: V) {
    self.set_with_ttl(key, value, self.default_ttl);
  }

  /// Store a value with an explicit TTL, replacing any previous entry.
  pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
    let entry = CacheEntry {
      value,
      stored_at: Instant::now(),
      ttl,
    };
    self.entries.lock().insert(key.into(), entry);
  }

  /// Get a live value. An expired entry is removed and reported as absent.
  pub fn get(&self, key: &str) -> Option<V> {
    let mut entries = self.entries.lock();
    let expired = entries.get(key)?.is_expired(Instant::now());
    if expired {
      entries.remove(key);
      return None;
    }
    entries.get(key).map(|entry| entry.value.clone())
  }

  /// Remove one entry, or every entry when `key` is `None`.
  pub fn clear(&self, key: Option<&str>) {
    let mut entries = self.entries.lock();
    match key {
      Some(key) => {
        entries.remove(key);
      }
      None => entries.clear(),
    }
    self.generation.fetch_add(1, Ordering::SeqCst);
  }

  /// Remove every entry whose key starts with `prefix`. Returns how many were dropped.
  pub fn invalidate_by_prefix(&self, prefix: &str) -> usize {
    let mut entries = self.entries.lock();
    let before = entries.len();
    entries.retain(|key, _| !key.starts_with(prefix));
    self.generation.fetch_add(1, Ordering::SeqCst);
    before - entries.len()
  }

  /// Number of stored entries, including expired ones not yet read.
  pub fn len(&self) -> usize {
    self.entries.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn generation(&self) -> u64 {
    self.generation.load(Ordering::SeqCst)
  }
}

impl<V: Clone> Default for TtlCache<V> {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test(start_paused = true)]
  async fn test_set_then_get_returns_value() {
    let cache = TtlCache::new();
    cache.set_with_ttl("journal_entries_u1", "entries", Duration::from_secs(10));
    assert_eq!(cache.get("journal_entries_u1"), Some("entries"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_unknown_key_is_absent() {
    let cache: TtlCache<u32> = TtlCache::new();
    assert_eq!(cache.get("missing"), None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_expired_entry_is_removed_on_read() {
    let cache = TtlCache::new();
    cache.set_with_ttl("k", 1, Duration::from_secs(10));

    tokio::time::advance(Duration::from_secs(10) + Duration::from_millis(1)).await;

    // Still stored until somebody looks at it
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("k"), None);
    assert_eq!(cache.len(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_entry_is_served_up_to_its_ttl() {
    let cache = TtlCache::new();
    cache.set_with_ttl("k", 1, Duration::from_secs(10));

    tokio::time::advance(Duration::from_secs(10)).await;

    assert_eq!(cache.get("k"), Some(1));
  }

  #[tokio::test(start_paused = true)]
  async fn test_default_ttl_is_five_minutes() {
    let cache = TtlCache::new();
    cache.set("k", 1);

    tokio::time::advance(Duration::from_secs(299)).await;
    assert_eq!(cache.get("k"), Some(1));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(cache.get("k"), None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_overwrite_resets_timestamp() {
    let cache = TtlCache::new();
    cache.set_with_ttl("k", 1, Duration::from_secs(10));
    tokio::time::advance(Duration::from_secs(8)).await;

    cache.set_with_ttl("k", 2, Duration::from_secs(10));
    tokio::time::advance(Duration::from_secs(8)).await;

    assert_eq!(cache.get("k"), Some(2));
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidate_by_prefix_only_touches_matching_keys() {
    let cache = TtlCache::new();
    cache.set("journal_entries_u1", "X");
    cache.set("vision_board_u1", "Y");

    let removed = cache.invalidate_by_prefix("journal_entries_");

    assert_eq!(removed, 1);
    assert_eq!(cache.get("journal_entries_u1"), None);
    assert_eq!(cache.get("vision_board_u1"), Some("Y"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_clear_one_and_all() {
    let cache = TtlCache::new();
    cache.set("a", 1);
    cache.set("b", 2);

    cache.clear(Some("a"));
    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.get("b"), Some(2));

    cache.clear(None);
    assert!(cache.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidation_bumps_generation() {
    let cache: TtlCache<u32> = TtlCache::new();
    let start = cache.generation();

    cache.set("a", 1);
    assert_eq!(cache.generation(), start);

    cache.invalidate_by_prefix("zzz");
    assert_eq!(cache.generation(), start + 1);

    cache.clear(None);
    assert_eq!(cache.generation(), start + 2);
  }
}
