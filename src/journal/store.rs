//! Journal data access with transparent caching.

use chrono::{NaiveDate, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{AssetStore, Backend, Gateway, RowMatch, Select, Upload, User};
use crate::cache::{CacheLayer, CacheResult, Cacheable, EntityKind};

use super::types::{
  EntryPatch, FutureLetter, GuidedReflection, IdentityPatch, IdentitySection, IdentityStatement,
  JournalEntry, LetterPatch, NewLetter, NewReflection, NewVisionItem, ProfilePatch,
  ReflectionPatch, UserProfile, VisionBoardItem, VisionCategory, VisionItemPatch,
};

/// Journal data access: the backend gateway behind a shared TTL cache.
///
/// Per-user collections are read cache-first. Every successful write
/// invalidates the cached collections of the kind it touched, so the next
/// read goes back to the backend.
#[derive(Clone)]
pub struct JournalStore {
  gateway: Arc<dyn Gateway>,
  assets: Arc<dyn AssetStore>,
  cache: CacheLayer,
  default_timezone: String,
}

impl JournalStore {
  pub fn new(
    gateway: Arc<dyn Gateway>,
    assets: Arc<dyn AssetStore>,
    cache: CacheLayer,
    default_timezone: impl Into<String>,
  ) -> Self {
    Self {
      gateway,
      assets,
      cache,
      default_timezone: default_timezone.into(),
    }
  }

  pub fn from_backend(backend: &Backend, cache: CacheLayer, default_timezone: &str) -> Self {
    Self::new(
      Arc::clone(&backend.gateway),
      Arc::clone(&backend.assets),
      cache,
      default_timezone,
    )
  }

  pub fn cache(&self) -> &CacheLayer {
    &self.cache
  }

  // ==========================================================================
  // Shared plumbing
  // ==========================================================================

  /// Cache-first list of one user's rows of `T`.
  async fn list<T: Cacheable>(&self, user_id: &str) -> Result<CacheResult<Vec<T>>> {
    let kind = T::kind();
    let key = kind.cache_key(user_id);
    let mut query = Select::owned_by(user_id);
    query.order = kind.list_order();

    self
      .cache
      .fetch_list(&key, || {
        let gateway = Arc::clone(&self.gateway);
        async move { gateway.select(kind, &query).await }
      })
      .await
  }

  async fn create<R: DeserializeOwned>(
    &self,
    kind: EntityKind,
    user_id: &str,
    fields: impl Serialize,
  ) -> Result<R> {
    let mut row = to_object(kind, fields)?;
    row["user_id"] = Value::String(user_id.to_string());

    let stored = self.gateway.insert(kind, row).await?;
    self.cache.invalidate(kind);
    decode(kind, stored)
  }

  async fn update(&self, kind: EntityKind, target: RowMatch, patch: impl Serialize) -> Result<()> {
    let mut patch = to_object(kind, patch)?;
    patch["updated_at"] = Value::String(Utc::now().to_rfc3339());

    self.gateway.update(kind, &target, patch).await?;
    self.cache.invalidate(kind);
    Ok(())
  }

  async fn delete(&self, kind: EntityKind, id: &str) -> Result<()> {
    self.gateway.delete(kind, &RowMatch::id(id)).await?;
    self.cache.invalidate(kind);
    Ok(())
  }

  // ==========================================================================
  // Journal entries
  // ==========================================================================

  /// All of a user's entries, newest date first.
  pub async fn journal_entries(&self, user_id: &str) -> Result<Vec<JournalEntry>> {
    Ok(self.list(user_id).await?.data)
  }

  /// The entry for one day, if it exists. Not cached.
  pub async fn journal_entry(&self, user_id: &str, date: NaiveDate) -> Result<Option<JournalEntry>> {
    let kind = EntityKind::JournalEntries;
    let query = Select::owned_by(user_id).eq("entry_date", date.to_string());
    let rows = self.gateway.select(kind, &query).await?;

    rows.into_iter().next().map(|row| decode(kind, row)).transpose()
  }

  pub async fn create_journal_entry(&self, user_id: &str, date: NaiveDate) -> Result<JournalEntry> {
    debug!(user_id, %date, "creating journal entry");
    self
      .create(
        EntityKind::JournalEntries,
        user_id,
        json!({ "entry_date": date, "checklist_items": [] }),
      )
      .await
  }

  /// Existing entry for the day, or a fresh one with an empty checklist.
  pub async fn open_journal_entry(&self, user_id: &str, date: NaiveDate) -> Result<JournalEntry> {
    match self.journal_entry(user_id, date).await? {
      Some(entry) => Ok(entry),
      None => self.create_journal_entry(user_id, date).await,
    }
  }

  pub async fn update_journal_entry(&self, entry_id: &str, patch: &EntryPatch) -> Result<()> {
    self
      .update(EntityKind::JournalEntries, RowMatch::id(entry_id), patch)
      .await
  }

  // ==========================================================================
  // Vision board
  // ==========================================================================

  pub async fn vision_items(&self, user_id: &str) -> Result<Vec<VisionBoardItem>> {
    Ok(self.list(user_id).await?.data)
  }

  pub async fn create_vision_item(&self, user_id: &str, item: &NewVisionItem) -> Result<VisionBoardItem> {
    self.create(EntityKind::VisionBoard, user_id, item).await
  }

  pub async fn update_vision_item(&self, item_id: &str, patch: &VisionItemPatch) -> Result<()> {
    self
      .update(EntityKind::VisionBoard, RowMatch::id(item_id), patch)
      .await
  }

  /// Delete the row, then its image. A leftover image is only logged.
  pub async fn delete_vision_item(&self, item: &VisionBoardItem) -> Result<()> {
    self.delete(EntityKind::VisionBoard, &item.id).await?;
    if let Some(url) = &item.image_url {
      if let Err(e) = self.assets.remove(url).await {
        warn!(item_id = %item.id, error = %e, "failed to remove vision board image");
      }
    }
    Ok(())
  }

  pub async fn upload_image(&self, user_id: &str, file: Upload) -> Result<String> {
    let url = self.assets.upload(user_id, file).await?;
    info!(user_id, %url, "image uploaded");
    Ok(url)
  }

  /// Upload the image (when given) and append a new item to the board.
  pub async fn add_vision_item(
    &self,
    user_id: &str,
    category: VisionCategory,
    affirmation: &str,
    image: Option<Upload>,
  ) -> Result<VisionBoardItem> {
    let image_url = match image {
      Some(file) => Some(self.upload_image(user_id, file).await?),
      None => None,
    };
    let order_index = self.vision_items(user_id).await?.len() as i64;

    self
      .create_vision_item(
        user_id,
        &NewVisionItem {
          category,
          image_url,
          affirmation: affirmation.to_string(),
          order_index,
        },
      )
      .await
  }

  // ==========================================================================
  // Identity statements
  // ==========================================================================

  pub async fn identity_statements(&self, user_id: &str) -> Result<Vec<IdentityStatement>> {
    Ok(self.list(user_id).await?.data)
  }

  /// Append a statement to the end of its section.
  pub async fn create_identity_statement(
    &self,
    user_id: &str,
    section: IdentitySection,
    content: &str,
  ) -> Result<IdentityStatement> {
    let order_index = self
      .identity_statements(user_id)
      .await?
      .iter()
      .filter(|s| s.section == section)
      .count();

    self
      .create(
        EntityKind::IdentityStatements,
        user_id,
        json!({
          "section": section,
          "content": content,
          "order_index": order_index,
        }),
      )
      .await
  }

  pub async fn update_identity_statement(&self, statement_id: &str, patch: &IdentityPatch) -> Result<()> {
    self
      .update(EntityKind::IdentityStatements, RowMatch::id(statement_id), patch)
      .await
  }

  pub async fn delete_identity_statement(&self, statement_id: &str) -> Result<()> {
    self.delete(EntityKind::IdentityStatements, statement_id).await
  }

  // ==========================================================================
  // Future letters
  // ==========================================================================

  pub async fn future_letters(&self, user_id: &str) -> Result<Vec<FutureLetter>> {
    Ok(self.list(user_id).await?.data)
  }

  pub async fn create_future_letter(&self, user_id: &str, letter: &NewLetter) -> Result<FutureLetter> {
    self.create(EntityKind::FutureLetters, user_id, letter).await
  }

  pub async fn update_future_letter(&self, letter_id: &str, patch: &LetterPatch) -> Result<()> {
    self
      .update(EntityKind::FutureLetters, RowMatch::id(letter_id), patch)
      .await
  }

  pub async fn delete_future_letter(&self, letter_id: &str) -> Result<()> {
    self.delete(EntityKind::FutureLetters, letter_id).await
  }

  // ==========================================================================
  // Guided reflections
  // ==========================================================================

  pub async fn guided_reflections(&self, user_id: &str) -> Result<Vec<GuidedReflection>> {
    Ok(self.list(user_id).await?.data)
  }

  pub async fn create_guided_reflection(
    &self,
    user_id: &str,
    reflection: &NewReflection,
  ) -> Result<GuidedReflection> {
    self
      .create(EntityKind::GuidedReflections, user_id, reflection)
      .await
  }

  pub async fn update_guided_reflection(&self, reflection_id: &str, patch: &ReflectionPatch) -> Result<()> {
    self
      .update(EntityKind::GuidedReflections, RowMatch::id(reflection_id), patch)
      .await
  }

  // ==========================================================================
  // Profile
  // ==========================================================================

  /// The user's profile, with the default timezone filled in when blank.
  pub async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
    let kind = EntityKind::Profiles;
    let rows = self.gateway.select(kind, &Select::owned_by(user_id)).await?;

    let profile = rows
      .into_iter()
      .next()
      .map(|row| decode::<UserProfile>(kind, row))
      .transpose()?;

    Ok(profile.map(|mut p| {
      if p.timezone.is_empty() {
        p.timezone = self.default_timezone.clone();
      }
      p
    }))
  }

  /// Create the profile row once if the account has none.
  pub async fn ensure_profile(&self, user: &User) -> Result<Option<UserProfile>> {
    if let Some(profile) = self.profile(&user.id).await? {
      return Ok(Some(profile));
    }

    info!(user_id = %user.id, "creating missing profile");
    let row = json!({
      "user_id": user.id,
      "email": user.email.clone().unwrap_or_default(),
      "timezone": self.default_timezone,
    });
    self.gateway.insert(EntityKind::Profiles, row).await?;
    self.cache.invalidate(EntityKind::Profiles);

    self.profile(&user.id).await
  }

  pub async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<()> {
    self
      .update(EntityKind::Profiles, RowMatch::user(user_id), patch)
      .await
  }
}

fn to_object(kind: EntityKind, fields: impl Serialize) -> Result<Value> {
  let value = serde_json::to_value(fields)
    .map_err(|e| eyre!("Failed to encode {} row: {}", kind.label(), e))?;
  if !value.is_object() {
    return Err(eyre!("Encoded {} row is not an object", kind.label()));
  }
  Ok(value)
}

fn decode<R: DeserializeOwned>(kind: EntityKind, row: Value) -> Result<R> {
  serde_json::from_value(row).map_err(|e| eyre!("Failed to decode {} row: {}", kind.label(), e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::{MemoryBackend, RecordedCall};
  use crate::cache::TtlCache;
  use crate::journal::types::{JournalField, ReflectionTheme};

  fn store() -> (JournalStore, MemoryBackend) {
    let memory = MemoryBackend::signed_in("u1", "ada@example.com");
    let backend = Backend::memory(memory.clone());
    let cache = CacheLayer::new(Arc::new(TtlCache::new()));
    (JournalStore::from_backend(&backend, cache, "Asia/Kolkata"), memory)
  }

  fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
  }

  #[tokio::test]
  async fn test_open_creates_entry_with_empty_checklist() {
    let (store, memory) = store();
    let entry = store.open_journal_entry("u1", date("2024-03-01")).await.unwrap();

    assert_eq!(entry.entry_date, date("2024-03-01"));
    assert!(entry.checklist_items.is_empty());
    assert_eq!(memory.rows(EntityKind::JournalEntries).len(), 1);

    let again = store.open_journal_entry("u1", date("2024-03-01")).await.unwrap();
    assert_eq!(again.id, entry.id);
    assert_eq!(memory.rows(EntityKind::JournalEntries).len(), 1);
  }

  #[tokio::test]
  async fn test_list_is_served_from_cache() {
    let (store, memory) = store();
    store.create_journal_entry("u1", date("2024-03-01")).await.unwrap();

    store.journal_entries("u1").await.unwrap();
    store.journal_entries("u1").await.unwrap();
    assert_eq!(memory.selects(EntityKind::JournalEntries), 1);
  }

  #[tokio::test]
  async fn test_update_stamps_and_invalidates() {
    let (store, memory) = store();
    let entry = store.create_journal_entry("u1", date("2024-03-01")).await.unwrap();
    store.journal_entries("u1").await.unwrap();
    store.vision_items("u1").await.unwrap();
    assert_eq!(store.cache().cache().len(), 2);

    store
      .update_journal_entry(&entry.id, &EntryPatch::text(JournalField::Gratitude, "rain"))
      .await
      .unwrap();

    let patch = &memory.updates(EntityKind::JournalEntries)[0];
    assert_eq!(patch["gratitude"], "rain");
    assert!(patch.get("updated_at").is_some());

    let cache = store.cache().cache();
    assert!(cache.get("journal_entries_u1").is_none());
    assert!(cache.get("vision_board_u1").is_some());

    let entries = store.journal_entries("u1").await.unwrap();
    assert_eq!(entries[0].gratitude.as_deref(), Some("rain"));
  }

  #[tokio::test]
  async fn test_create_entry_invalidates_warm_list() {
    let (store, memory) = store();
    store.create_journal_entry("u1", date("2024-03-01")).await.unwrap();
    assert_eq!(store.journal_entries("u1").await.unwrap().len(), 1);
    assert!(store.cache().cache().get("journal_entries_u1").is_some());

    store.create_journal_entry("u1", date("2024-03-02")).await.unwrap();
    assert!(store.cache().cache().get("journal_entries_u1").is_none());

    assert_eq!(store.journal_entries("u1").await.unwrap().len(), 2);
    assert_eq!(memory.selects(EntityKind::JournalEntries), 2);
  }

  #[tokio::test]
  async fn test_vision_create_and_delete_invalidate_warm_list() {
    let (store, memory) = store();
    let new_item = |affirmation: &str, order_index| NewVisionItem {
      category: VisionCategory::Health,
      image_url: None,
      affirmation: affirmation.to_string(),
      order_index,
    };
    store.create_vision_item("u1", &new_item("I sleep well", 0)).await.unwrap();
    store.journal_entries("u1").await.unwrap();
    assert_eq!(store.vision_items("u1").await.unwrap().len(), 1);

    let second = store.create_vision_item("u1", &new_item("I swim", 1)).await.unwrap();
    assert!(store.cache().cache().get("vision_board_u1").is_none());
    assert!(store.cache().cache().get("journal_entries_u1").is_some());
    assert_eq!(store.vision_items("u1").await.unwrap().len(), 2);
    assert_eq!(memory.selects(EntityKind::VisionBoard), 2);

    store.delete_vision_item(&second).await.unwrap();
    assert!(store.cache().cache().get("vision_board_u1").is_none());
    let left = store.vision_items("u1").await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].affirmation, "I sleep well");
    assert_eq!(memory.selects(EntityKind::VisionBoard), 3);
  }

  #[tokio::test]
  async fn test_letter_and_identity_delete_invalidate_warm_list() {
    let (store, memory) = store();
    let letter = store
      .create_future_letter(
        "u1",
        &NewLetter {
          title: "Hello".into(),
          content: "Keep going".into(),
          unlock_date: date("2030-01-01"),
        },
      )
      .await
      .unwrap();
    let statement = store
      .create_identity_statement("u1", IdentitySection::CoreValues, "Honesty")
      .await
      .unwrap();
    store.future_letters("u1").await.unwrap();
    store.identity_statements("u1").await.unwrap();
    let identity_selects = memory.selects(EntityKind::IdentityStatements);

    store.delete_future_letter(&letter.id).await.unwrap();
    store.delete_identity_statement(&statement.id).await.unwrap();

    assert!(store.future_letters("u1").await.unwrap().is_empty());
    assert!(store.identity_statements("u1").await.unwrap().is_empty());
    assert_eq!(memory.selects(EntityKind::FutureLetters), 2);
    assert_eq!(memory.selects(EntityKind::IdentityStatements), identity_selects + 1);
  }

  #[tokio::test]
  async fn test_entries_are_newest_first() {
    let (store, _) = store();
    store.create_journal_entry("u1", date("2024-03-01")).await.unwrap();
    store.create_journal_entry("u1", date("2024-03-03")).await.unwrap();
    store.create_journal_entry("u1", date("2024-03-02")).await.unwrap();

    let dates: Vec<String> = store
      .journal_entries("u1")
      .await
      .unwrap()
      .iter()
      .map(|e| e.entry_date.to_string())
      .collect();
    assert_eq!(dates, vec!["2024-03-03", "2024-03-02", "2024-03-01"]);
  }

  #[tokio::test]
  async fn test_list_failure_is_not_cached() {
    let (store, memory) = store();
    memory.set_failing(EntityKind::FutureLetters, true);
    assert!(store.future_letters("u1").await.is_err());

    memory.set_failing(EntityKind::FutureLetters, false);
    assert!(store.future_letters("u1").await.unwrap().is_empty());
    assert_eq!(memory.selects(EntityKind::FutureLetters), 2);
  }

  #[tokio::test]
  async fn test_identity_order_index_counts_section() {
    let (store, _) = store();
    store
      .create_identity_statement("u1", IdentitySection::CoreValues, "Honesty")
      .await
      .unwrap();
    store
      .create_identity_statement("u1", IdentitySection::IdentityHabits, "I run")
      .await
      .unwrap();
    let third = store
      .create_identity_statement("u1", IdentitySection::CoreValues, "Courage")
      .await
      .unwrap();

    assert_eq!(third.order_index, 1);
  }

  #[tokio::test]
  async fn test_add_vision_item_uploads_first() {
    let (store, memory) = store();
    let image = Upload {
      file_name: "beach.png".into(),
      content_type: "image/png",
      bytes: vec![0; 4],
    };
    let item = store
      .add_vision_item("u1", VisionCategory::Lifestyle, "I live by the sea", Some(image))
      .await
      .unwrap();

    assert!(item.image_url.is_some());
    assert_eq!(item.order_index, 0);
    let calls = memory.calls();
    let upload = calls
      .iter()
      .position(|c| matches!(c, RecordedCall::Upload { .. }))
      .unwrap();
    let insert = calls
      .iter()
      .position(|c| matches!(c, RecordedCall::Insert { .. }))
      .unwrap();
    assert!(upload < insert);

    store.delete_vision_item(&item).await.unwrap();
    assert!(memory.calls().iter().any(|c| matches!(c, RecordedCall::Remove { .. })));
    assert!(memory.rows(EntityKind::VisionBoard).is_empty());
  }

  #[tokio::test]
  async fn test_reflection_carries_theme_prompt() {
    let (store, _) = store();
    let created = store
      .create_guided_reflection("u1", &NewReflection::new(ReflectionTheme::Growth, "A lot"))
      .await
      .unwrap();
    assert_eq!(created.prompt, ReflectionTheme::Growth.prompt());

    store
      .update_guided_reflection(
        &created.id,
        &ReflectionPatch {
          reflection: Some("More than I thought".into()),
        },
      )
      .await
      .unwrap();
    let listed = store.guided_reflections("u1").await.unwrap();
    assert_eq!(listed[0].reflection, "More than I thought");
  }

  #[tokio::test]
  async fn test_profile_default_timezone_and_ensure() {
    let memory = MemoryBackend::new();
    memory.seed(EntityKind::Profiles, json!({ "user_id": "u1", "email": "a@b.c", "timezone": "" }));
    let backend = Backend::memory(memory.clone());
    let store = JournalStore::from_backend(&backend, CacheLayer::new(Arc::new(TtlCache::new())), "Asia/Kolkata");

    let profile = store.profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.timezone, "Asia/Kolkata");

    let user = User {
      id: "u2".into(),
      email: Some("b@c.d".into()),
    };
    assert!(store.profile("u2").await.unwrap().is_none());
    let created = store.ensure_profile(&user).await.unwrap().unwrap();
    assert_eq!(created.email, "b@c.d");
    store.ensure_profile(&user).await.unwrap();
    assert_eq!(memory.rows(EntityKind::Profiles).len(), 2);
  }

  #[tokio::test]
  async fn test_update_profile_matches_user() {
    let (store, memory) = store();
    store
      .update_profile("u1", &ProfilePatch::field(crate::journal::ProfileField::Nickname, "Ada"))
      .await
      .unwrap();

    let calls = memory.calls();
    let target = calls
      .iter()
      .find_map(|c| match c {
        RecordedCall::Update { target, .. } => Some(target.clone()),
        _ => None,
      })
      .unwrap();
    assert_eq!(target, RowMatch::user("u1"));
    assert_eq!(store.profile("u1").await.unwrap().unwrap().nickname.as_deref(), Some("Ada"));
  }
}
