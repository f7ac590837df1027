//! Debounced write-through for edits made while typing.
//!
//! Each edit target (a journal entry, a profile, a reflection) has at most
//! one pending write. Edits to a target merge into the patch staged for it
//! and restart the delay; when the delay runs out the whole merged patch is
//! written once. The staged patch lives here rather than in the screen that
//! made the edit, so leaving a screen before its timer fires loses nothing.
//!
//! Writes to the same target are serialized: a write that fires while an
//! earlier one is still in flight waits for it, so the last edit always
//! lands last. Failures are logged and dropped.

mod debounce;

pub use debounce::Debouncer;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::AutosaveConfig;
use crate::journal::{ChecklistItem, EntryPatch, JournalStore, ProfilePatch, ReflectionPatch};

/// What a pending write will update.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SaveTarget {
  JournalEntry(String),
  /// Keyed by user id; profiles are matched on `user_id`
  Profile(String),
  Reflection(String),
}

/// A partial update that later edits to the same target fold into.
pub trait Patch: Default + Send + 'static {
  fn absorb(&mut self, later: Self);
  fn is_empty(&self) -> bool;
}

impl Patch for EntryPatch {
  fn absorb(&mut self, later: Self) {
    self.merge(later);
  }

  fn is_empty(&self) -> bool {
    *self == Self::default()
  }
}

impl Patch for ProfilePatch {
  fn absorb(&mut self, later: Self) {
    self.merge(later);
  }

  fn is_empty(&self) -> bool {
    *self == Self::default()
  }
}

impl Patch for ReflectionPatch {
  fn absorb(&mut self, later: Self) {
    if later.reflection.is_some() {
      self.reflection = later.reflection;
    }
  }

  fn is_empty(&self) -> bool {
    self.reflection.is_none()
  }
}

/// Patches waiting on their timers, by target id.
struct Staged<P> {
  patches: Mutex<HashMap<String, P>>,
}

impl<P: Patch> Staged<P> {
  fn new() -> Self {
    Self {
      patches: Mutex::new(HashMap::new()),
    }
  }

  fn add(&self, id: &str, patch: P) {
    self
      .patches
      .lock()
      .entry(id.to_string())
      .or_default()
      .absorb(patch);
  }

  /// Everything staged for `id`, leaving nothing behind.
  fn take(&self, id: &str) -> Option<P> {
    self.patches.lock().remove(id).filter(|p| !p.is_empty())
  }

  fn get(&self, id: &str) -> Option<P>
  where
    P: Clone,
  {
    self.patches.lock().get(id).cloned()
  }
}

/// One lock per target so writes to it go out one at a time, in order.
#[derive(Default)]
struct WriteLanes {
  lanes: Mutex<HashMap<SaveTarget, Arc<tokio::sync::Mutex<()>>>>,
}

impl WriteLanes {
  fn lane(&self, target: &SaveTarget) -> Arc<tokio::sync::Mutex<()>> {
    Arc::clone(self.lanes.lock().entry(target.clone()).or_default())
  }
}

#[derive(Clone)]
pub struct Autosave {
  store: JournalStore,
  timers: Arc<Debouncer<SaveTarget>>,
  lanes: Arc<WriteLanes>,
  entries: Arc<Staged<EntryPatch>>,
  profiles: Arc<Staged<ProfilePatch>>,
  reflections: Arc<Staged<ReflectionPatch>>,
  entry_delay: Duration,
  profile_delay: Duration,
  reflection_delay: Duration,
}

impl Autosave {
  pub fn new(store: JournalStore, config: &AutosaveConfig) -> Self {
    Self {
      store,
      timers: Arc::new(Debouncer::new()),
      lanes: Arc::new(WriteLanes::default()),
      entries: Arc::new(Staged::new()),
      profiles: Arc::new(Staged::new()),
      reflections: Arc::new(Staged::new()),
      entry_delay: Duration::from_millis(config.entry_delay_ms),
      profile_delay: Duration::from_millis(config.profile_delay_ms),
      reflection_delay: Duration::from_millis(config.reflection_delay_ms),
    }
  }

  pub fn entry_changed(&self, entry_id: &str, patch: EntryPatch) {
    self.entries.add(entry_id, patch);
    let staged = Arc::clone(&self.entries);
    let store = self.store.clone();
    let id = entry_id.to_string();
    self.schedule(SaveTarget::JournalEntry(id.clone()), self.entry_delay, async move {
      let Some(patch) = staged.take(&id) else {
        return;
      };
      if let Err(e) = store.update_journal_entry(&id, &patch).await {
        warn!(entry_id = %id, error = %e, "autosave of journal entry failed");
      }
    });
  }

  pub fn profile_changed(&self, user_id: &str, patch: ProfilePatch) {
    self.profiles.add(user_id, patch);
    let staged = Arc::clone(&self.profiles);
    let store = self.store.clone();
    let user = user_id.to_string();
    self.schedule(SaveTarget::Profile(user.clone()), self.profile_delay, async move {
      let Some(patch) = staged.take(&user) else {
        return;
      };
      if let Err(e) = store.update_profile(&user, &patch).await {
        warn!(user_id = %user, error = %e, "autosave of profile failed");
      }
    });
  }

  pub fn reflection_changed(&self, reflection_id: &str, patch: ReflectionPatch) {
    self.reflections.add(reflection_id, patch);
    let staged = Arc::clone(&self.reflections);
    let store = self.store.clone();
    let id = reflection_id.to_string();
    self.schedule(SaveTarget::Reflection(id.clone()), self.reflection_delay, async move {
      let Some(patch) = staged.take(&id) else {
        return;
      };
      if let Err(e) = store.update_guided_reflection(&id, &patch).await {
        warn!(reflection_id = %id, error = %e, "autosave of reflection failed");
      }
    });
  }

  /// Persist the checklist now. A pending text write for the same entry
  /// keeps its timer.
  pub fn checklist_changed(&self, entry_id: &str, items: Vec<ChecklistItem>) -> JoinHandle<()> {
    let store = self.store.clone();
    let id = entry_id.to_string();
    let lane = self.lanes.lane(&SaveTarget::JournalEntry(id.clone()));
    tokio::spawn(async move {
      let _turn = lane.lock().await;
      let patch = EntryPatch::checklist(items);
      if let Err(e) = store.update_journal_entry(&id, &patch).await {
        warn!(entry_id = %id, error = %e, "saving checklist failed");
      }
    })
  }

  /// Entry fields edited but not yet sent.
  pub fn staged_entry(&self, entry_id: &str) -> Option<EntryPatch> {
    self.entries.get(entry_id)
  }

  /// Profile fields edited but not yet sent.
  pub fn staged_profile(&self, user_id: &str) -> Option<ProfilePatch> {
    self.profiles.get(user_id)
  }

  pub fn is_pending(&self, target: &SaveTarget) -> bool {
    self.timers.is_pending(target)
  }

  /// Writes still waiting on their delay. These are lost if the process exits.
  pub fn pending(&self) -> usize {
    self.timers.pending()
  }

  fn schedule<F>(&self, target: SaveTarget, delay: Duration, write: F)
  where
    F: Future<Output = ()> + Send + 'static,
  {
    debug!(?target, delay_ms = delay.as_millis() as u64, "autosave scheduled");
    let lane = self.lanes.lane(&target);
    self.timers.schedule(target, delay, async move {
      let _turn = lane.lock().await;
      write.await;
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::{Backend, MemoryBackend};
  use crate::cache::{CacheLayer, EntityKind, TtlCache};
  use crate::journal::{JournalField, ProfileField};
  use chrono::NaiveDate;
  use serde_json::Value;
  use tokio::time::sleep;

  fn setup() -> (Autosave, JournalStore, MemoryBackend) {
    let memory = MemoryBackend::signed_in("u1", "ada@example.com");
    let backend = Backend::memory(memory.clone());
    let cache = CacheLayer::new(Arc::new(TtlCache::new()));
    let store = JournalStore::from_backend(&backend, cache, "Asia/Kolkata");
    let autosave = Autosave::new(store.clone(), &AutosaveConfig::default());
    (autosave, store, memory)
  }

  async fn settle() {
    for _ in 0..10 {
      tokio::task::yield_now().await;
    }
  }

  fn field(patch: &Value, name: &str) -> Option<String> {
    patch.get(name).and_then(Value::as_str).map(String::from)
  }

  #[tokio::test(start_paused = true)]
  async fn test_burst_of_edits_persists_last_payload_once() {
    let (autosave, store, memory) = setup();
    let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let entry = store.open_journal_entry("u1", date).await.unwrap();

    for text in ["g", "gr", "grin"] {
      autosave.entry_changed(&entry.id, EntryPatch::text(JournalField::Gratitude, text));
      sleep(Duration::from_millis(200)).await;
    }

    // Last edit at 400ms, so nothing before 1200ms
    sleep(Duration::from_millis(599)).await;
    settle().await;
    assert!(memory.updates(EntityKind::JournalEntries).is_empty());

    sleep(Duration::from_millis(2)).await;
    settle().await;
    let updates = memory.updates(EntityKind::JournalEntries);
    assert_eq!(updates.len(), 1);
    assert_eq!(field(&updates[0], "gratitude").as_deref(), Some("grin"));
    assert_eq!(autosave.pending(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_targets_are_independent() {
    let (autosave, store, memory) = setup();
    let a = store
      .open_journal_entry("u1", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
      .await
      .unwrap();
    let b = store
      .open_journal_entry("u1", NaiveDate::from_ymd_opt(2024, 3, 2).unwrap())
      .await
      .unwrap();

    autosave.entry_changed(&a.id, EntryPatch::text(JournalField::Learnings, "a1"));
    autosave.entry_changed(&b.id, EntryPatch::text(JournalField::Learnings, "b1"));
    sleep(Duration::from_millis(100)).await;
    autosave.entry_changed(&a.id, EntryPatch::text(JournalField::Learnings, "a2"));
    autosave.entry_changed(&b.id, EntryPatch::text(JournalField::Learnings, "b2"));
    assert_eq!(autosave.pending(), 2);

    sleep(Duration::from_millis(801)).await;
    settle().await;

    let rows = memory.rows(EntityKind::JournalEntries);
    let learnings = |id: &str| {
      rows
        .iter()
        .find(|r| r["id"] == id)
        .and_then(|r| field(r, "learnings"))
    };
    assert_eq!(learnings(&a.id).as_deref(), Some("a2"));
    assert_eq!(learnings(&b.id).as_deref(), Some("b2"));
    assert_eq!(memory.updates(EntityKind::JournalEntries).len(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_checklist_bypasses_pending_timer() {
    let (autosave, store, memory) = setup();
    let entry = store
      .open_journal_entry("u1", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
      .await
      .unwrap();

    autosave.entry_changed(&entry.id, EntryPatch::text(JournalField::DailyRecap, "busy day"));
    let mut item = ChecklistItem::new("stretch");
    item.completed = true;
    autosave
      .checklist_changed(&entry.id, vec![item])
      .await
      .unwrap();

    let updates = memory.updates(EntityKind::JournalEntries);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["checklist_items"][0]["completed"], true);
    assert!(autosave.is_pending(&SaveTarget::JournalEntry(entry.id.clone())));

    sleep(Duration::from_millis(801)).await;
    settle().await;
    let updates = memory.updates(EntityKind::JournalEntries);
    assert_eq!(updates.len(), 2);
    assert_eq!(field(&updates[1], "daily_recap").as_deref(), Some("busy day"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_write_is_swallowed() {
    let (autosave, _, memory) = setup();
    memory.set_failing(EntityKind::Profiles, true);

    autosave.profile_changed("u1", ProfilePatch::field(ProfileField::Nickname, "Ada"));
    sleep(Duration::from_millis(801)).await;
    settle().await;

    assert_eq!(memory.updates(EntityKind::Profiles).len(), 1);
    assert_eq!(autosave.pending(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_reflection_uses_longer_delay() {
    let (autosave, store, memory) = setup();
    let reflection = store
      .create_guided_reflection(
        "u1",
        &crate::journal::NewReflection::new(crate::journal::ReflectionTheme::Dreams, "a cabin"),
      )
      .await
      .unwrap();

    autosave.reflection_changed(
      &reflection.id,
      ReflectionPatch {
        reflection: Some("a cabin by a lake".into()),
      },
    );
    sleep(Duration::from_millis(900)).await;
    settle().await;
    assert!(memory.updates(EntityKind::GuidedReflections).is_empty());

    sleep(Duration::from_millis(101)).await;
    settle().await;
    assert_eq!(memory.updates(EntityKind::GuidedReflections).len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_new_day_typing_flow() {
    let (autosave, store, memory) = setup();
    let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

    assert!(store.journal_entry("u1", date).await.unwrap().is_none());
    let entry = store.open_journal_entry("u1", date).await.unwrap();
    assert!(entry.checklist_items.is_empty());

    store.journal_entries("u1").await.unwrap();
    assert!(store.cache().cache().get("journal_entries_u1").is_some());

    let mut text = String::new();
    for ch in "thankful".chars() {
      text.push(ch);
      autosave.entry_changed(&entry.id, EntryPatch::text(JournalField::Gratitude, text.clone()));
      sleep(Duration::from_millis(50)).await;
    }

    sleep(Duration::from_millis(800)).await;
    settle().await;

    let updates = memory.updates(EntityKind::JournalEntries);
    assert_eq!(updates.len(), 1);
    let patch = updates[0].as_object().unwrap();
    assert_eq!(patch["gratitude"], "thankful");
    assert!(patch.keys().all(|k| k == "gratitude" || k == "updated_at"));
    assert!(store.cache().cache().get("journal_entries_u1").is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn test_partial_edits_merge_into_one_write() {
    let (autosave, _, memory) = setup();

    autosave.profile_changed("u1", ProfilePatch::field(ProfileField::Nickname, "A"));
    sleep(Duration::from_millis(300)).await;
    autosave.profile_changed("u1", ProfilePatch::field(ProfileField::VisionStatement, "x"));
    assert_eq!(
      autosave.staged_profile("u1").and_then(|p| p.nickname).as_deref(),
      Some("A")
    );

    sleep(Duration::from_millis(801)).await;
    settle().await;

    let updates = memory.updates(EntityKind::Profiles);
    assert_eq!(updates.len(), 1);
    assert_eq!(field(&updates[0], "nickname").as_deref(), Some("A"));
    assert_eq!(field(&updates[0], "vision_statement").as_deref(), Some("x"));
    assert!(autosave.staged_profile("u1").is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn test_edits_after_a_write_start_a_fresh_patch() {
    let (autosave, store, memory) = setup();
    let entry = store
      .open_journal_entry("u1", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
      .await
      .unwrap();

    autosave.entry_changed(&entry.id, EntryPatch::text(JournalField::Gratitude, "tea"));
    sleep(Duration::from_millis(801)).await;
    settle().await;
    autosave.entry_changed(&entry.id, EntryPatch::text(JournalField::Learnings, "rest"));
    sleep(Duration::from_millis(801)).await;
    settle().await;

    let updates = memory.updates(EntityKind::JournalEntries);
    assert_eq!(updates.len(), 2);
    assert_eq!(field(&updates[1], "learnings").as_deref(), Some("rest"));
    assert!(updates[1].get("gratitude").is_none());

    let row = memory
      .rows(EntityKind::JournalEntries)
      .into_iter()
      .find(|r| r["id"] == entry.id.as_str())
      .unwrap();
    assert_eq!(field(&row, "gratitude").as_deref(), Some("tea"));
    assert_eq!(field(&row, "learnings").as_deref(), Some("rest"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_slow_write_is_not_overtaken_by_a_newer_one() {
    let (autosave, _, memory) = setup();
    memory.stall_next_update(Duration::from_millis(2000));

    // Fires at 800ms and stays in flight until 2800ms
    autosave.profile_changed("u1", ProfilePatch::field(ProfileField::Nickname, "Ada"));
    sleep(Duration::from_millis(900)).await;
    settle().await;
    // Fires at 1700ms while the first write is still out
    autosave.profile_changed("u1", ProfilePatch::field(ProfileField::Nickname, "Ada L"));

    sleep(Duration::from_millis(1000)).await;
    settle().await;
    assert!(memory.updates(EntityKind::Profiles).is_empty());

    sleep(Duration::from_millis(1000)).await;
    settle().await;

    let updates = memory.updates(EntityKind::Profiles);
    assert_eq!(updates.len(), 2);
    assert_eq!(field(&updates[0], "nickname").as_deref(), Some("Ada"));
    assert_eq!(field(&updates[1], "nickname").as_deref(), Some("Ada L"));
    let profile = &memory.rows(EntityKind::Profiles)[0];
    assert_eq!(field(profile, "nickname").as_deref(), Some("Ada L"));
  }
}
