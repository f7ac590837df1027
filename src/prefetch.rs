//! Cache warming when a screen is opened.

use color_eyre::Result;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backend::User;
use crate::cache::EntityKind;
use crate::commands::Route;
use crate::journal::JournalStore;

/// Outcome of one prefetch round.
#[derive(Debug, Default)]
pub struct PrefetchReport {
  pub warmed: Vec<EntityKind>,
  pub failed: Vec<(EntityKind, String)>,
}

impl PrefetchReport {
  fn record<T>(&mut self, kind: EntityKind, result: Result<T>) {
    match result {
      Ok(_) => self.warmed.push(kind),
      Err(e) => {
        warn!(kind = kind.label(), error = %e, "prefetch failed");
        self.failed.push((kind, e.to_string()));
      }
    }
  }
}

/// Read every per-user collection concurrently and wait for all of them.
/// Failures are logged and reported, never retried.
pub async fn prefetch_collections(store: &JournalStore, user_id: &str) -> PrefetchReport {
  let (entries, vision, identity, reflections, letters) = tokio::join!(
    store.journal_entries(user_id),
    store.vision_items(user_id),
    store.identity_statements(user_id),
    store.guided_reflections(user_id),
    store.future_letters(user_id),
  );

  let mut report = PrefetchReport::default();
  report.record(EntityKind::JournalEntries, entries);
  report.record(EntityKind::VisionBoard, vision);
  report.record(EntityKind::IdentityStatements, identity);
  report.record(EntityKind::GuidedReflections, reflections);
  report.record(EntityKind::FutureLetters, letters);

  debug!(
    warmed = report.warmed.len(),
    failed = report.failed.len(),
    "prefetch finished"
  );
  report
}

#[derive(Clone)]
pub struct Prefetcher {
  store: JournalStore,
}

impl Prefetcher {
  pub fn new(store: JournalStore) -> Self {
    Self { store }
  }

  /// Start warming the cache for a navigation, without waiting for it.
  ///
  /// Nothing happens on authentication screens or without a session.
  pub fn on_navigate(&self, route: Route, user: Option<&User>) -> Option<JoinHandle<PrefetchReport>> {
    if route.is_auth() {
      return None;
    }
    let user_id = user?.id.clone();
    let store = self.store.clone();

    Some(tokio::spawn(async move {
      prefetch_collections(&store, &user_id).await
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::{Backend, MemoryBackend};
  use crate::cache::{CacheLayer, TtlCache};
  use std::sync::Arc;

  fn setup() -> (Prefetcher, JournalStore, MemoryBackend) {
    let memory = MemoryBackend::signed_in("u1", "ada@example.com");
    let backend = Backend::memory(memory.clone());
    let store = JournalStore::from_backend(
      &backend,
      CacheLayer::new(Arc::new(TtlCache::new())),
      "Asia/Kolkata",
    );
    (Prefetcher::new(store.clone()), store, memory)
  }

  fn user() -> User {
    User {
      id: "u1".into(),
      email: Some("ada@example.com".into()),
    }
  }

  #[tokio::test]
  async fn test_warms_all_five_collections() {
    let (prefetcher, store, _) = setup();
    let report = prefetcher
      .on_navigate(Route::Journal, Some(&user()))
      .unwrap()
      .await
      .unwrap();

    assert_eq!(report.warmed.len(), 5);
    assert!(report.failed.is_empty());
    for kind in EntityKind::COLLECTIONS {
      assert!(store.cache().cache().get(kind.cache_key("u1").as_str()).is_some());
    }
  }

  #[tokio::test]
  async fn test_one_failure_does_not_stop_the_rest() {
    let (prefetcher, store, memory) = setup();
    memory.set_failing(EntityKind::VisionBoard, true);

    let report = prefetcher
      .on_navigate(Route::Insights, Some(&user()))
      .unwrap()
      .await
      .unwrap();

    assert_eq!(report.warmed.len(), 4);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, EntityKind::VisionBoard);
    assert!(store.cache().cache().get("vision_board_u1").is_none());
  }

  #[tokio::test]
  async fn test_skipped_without_session_or_on_sign_in() {
    let (prefetcher, _, memory) = setup();
    assert!(prefetcher.on_navigate(Route::Journal, None).is_none());
    assert!(prefetcher.on_navigate(Route::SignIn, Some(&user())).is_none());
    assert!(memory.calls().is_empty());
  }
}
