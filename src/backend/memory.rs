//! In-process backend used by tests and `--local` runs.

use async_trait::async_trait;
use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::{
  AssetStore, Auth, Direction, Gateway, RowMatch, Select, SessionProvider, Upload, User,
};
use crate::cache::EntityKind;
use crate::config::DEFAULT_TIMEZONE;

const LOCAL_URL: &str = "memory://vision-board";

/// One call made against the memory backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
  Select { kind: EntityKind },
  Insert { kind: EntityKind, row: Value },
  Update { kind: EntityKind, target: RowMatch, patch: Value },
  Delete { kind: EntityKind, target: RowMatch },
  Upload { path: String },
  Remove { path: String },
}

#[derive(Default)]
struct State {
  tables: HashMap<EntityKind, Vec<Value>>,
  calls: Vec<RecordedCall>,
  accounts: HashMap<String, (String, User)>,
  user: Option<User>,
  objects: BTreeMap<String, Vec<u8>>,
  failing: HashSet<EntityKind>,
  /// Delay applied to the next update only
  stall_next_update: Option<Duration>,
}

/// Backend that keeps rows, accounts and files in memory and records every call.
#[derive(Clone, Default)]
pub struct MemoryBackend {
  state: Arc<Mutex<State>>,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// A backend with one signed-in user and an existing profile.
  pub fn signed_in(user_id: &str, email: &str) -> Self {
    let backend = Self::new();
    let user = User {
      id: user_id.to_string(),
      email: Some(email.to_string()),
    };
    {
      let mut state = backend.state.lock();
      state.user = Some(user.clone());
      let profile = stamp(json!({
        "user_id": user.id,
        "email": email,
        "timezone": DEFAULT_TIMEZONE,
      }));
      state.tables.entry(EntityKind::Profiles).or_default().push(profile);
    }
    backend
  }

  /// Put a row in place without recording a call.
  pub fn seed(&self, kind: EntityKind, row: Value) -> Value {
    let row = stamp(row);
    self.state.lock().tables.entry(kind).or_default().push(row.clone());
    row
  }

  pub fn rows(&self, kind: EntityKind) -> Vec<Value> {
    self.state.lock().tables.get(&kind).cloned().unwrap_or_default()
  }

  pub fn calls(&self) -> Vec<RecordedCall> {
    self.state.lock().calls.clone()
  }

  /// Patches sent to `kind`, in call order.
  pub fn updates(&self, kind: EntityKind) -> Vec<Value> {
    self
      .state
      .lock()
      .calls
      .iter()
      .filter_map(|call| match call {
        RecordedCall::Update {
          kind: k, patch, ..
        } if *k == kind => Some(patch.clone()),
        _ => None,
      })
      .collect()
  }

  pub fn selects(&self, kind: EntityKind) -> usize {
    self
      .state
      .lock()
      .calls
      .iter()
      .filter(|call| matches!(call, RecordedCall::Select { kind: k } if *k == kind))
      .count()
  }

  /// Make every call touching `kind` fail until turned off again.
  pub fn set_failing(&self, kind: EntityKind, failing: bool) {
    let mut state = self.state.lock();
    if failing {
      state.failing.insert(kind);
    } else {
      state.failing.remove(&kind);
    }
  }

  /// Hold the next update for `delay` before it lands, like a slow request.
  pub fn stall_next_update(&self, delay: Duration) {
    self.state.lock().stall_next_update = Some(delay);
  }

  pub fn sign_out_now(&self) {
    self.state.lock().user = None;
  }
}

/// Fill id and timestamps the way the hosted database does on insert.
fn stamp(mut row: Value) -> Value {
  let now = Utc::now().to_rfc3339();
  if let Value::Object(map) = &mut row {
    map
      .entry("id")
      .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    map
      .entry("created_at")
      .or_insert_with(|| Value::String(now.clone()));
    map.entry("updated_at").or_insert_with(|| Value::String(now));
  }
  row
}

/// Column value as the text a query-string filter would compare against.
fn as_text(value: Option<&Value>) -> Option<String> {
  match value? {
    Value::String(s) => Some(s.clone()),
    Value::Null => None,
    other => Some(other.to_string()),
  }
}

fn matches(row: &Value, column: &str, expected: &str) -> bool {
  as_text(row.get(column)).as_deref() == Some(expected)
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
  match (a, b) {
    (Some(Value::Number(x)), Some(Value::Number(y))) => x
      .as_f64()
      .partial_cmp(&y.as_f64())
      .unwrap_or(Ordering::Equal),
    (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
    (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
    (None | Some(Value::Null), _) => Ordering::Less,
    (_, None | Some(Value::Null)) => Ordering::Greater,
    _ => Ordering::Equal,
  }
}

impl State {
  fn check(&self, kind: EntityKind) -> Result<()> {
    if self.failing.contains(&kind) {
      return Err(eyre!("{} unavailable", kind.label()));
    }
    Ok(())
  }
}

#[async_trait]
impl Gateway for MemoryBackend {
  async fn select(&self, kind: EntityKind, query: &Select) -> Result<Vec<Value>> {
    let mut state = self.state.lock();
    state.calls.push(RecordedCall::Select { kind });
    state.check(kind)?;

    let mut rows: Vec<Value> = state
      .tables
      .get(&kind)
      .map(|rows| {
        rows
          .iter()
          .filter(|row| {
            query
              .filters
              .iter()
              .all(|(column, value)| matches(row, column, value))
          })
          .cloned()
          .collect()
      })
      .unwrap_or_default();

    if let Some(order) = query.order {
      rows.sort_by(|a, b| {
        let ordering = compare(a.get(order.column), b.get(order.column));
        match order.direction {
          Direction::Asc => ordering,
          Direction::Desc => ordering.reverse(),
        }
      });
    }
    Ok(rows)
  }

  async fn insert(&self, kind: EntityKind, row: Value) -> Result<Value> {
    let mut state = self.state.lock();
    state.calls.push(RecordedCall::Insert {
      kind,
      row: row.clone(),
    });
    state.check(kind)?;
    if !row.is_object() {
      return Err(eyre!("Cannot insert a non-object {} row", kind.label()));
    }

    let row = stamp(row);
    state.tables.entry(kind).or_default().push(row.clone());
    Ok(row)
  }

  async fn update(&self, kind: EntityKind, target: &RowMatch, patch: Value) -> Result<()> {
    let stall = self.state.lock().stall_next_update.take();
    if let Some(delay) = stall {
      tokio::time::sleep(delay).await;
    }

    let mut state = self.state.lock();
    state.calls.push(RecordedCall::Update {
      kind,
      target: target.clone(),
      patch: patch.clone(),
    });
    state.check(kind)?;

    let Value::Object(fields) = patch else {
      return Err(eyre!("Cannot apply a non-object patch to {}", kind.label()));
    };
    for row in state.tables.entry(kind).or_default().iter_mut() {
      if matches(row, target.column, &target.value) {
        if let Value::Object(map) = row {
          merge(map, &fields);
        }
      }
    }
    Ok(())
  }

  async fn delete(&self, kind: EntityKind, target: &RowMatch) -> Result<()> {
    let mut state = self.state.lock();
    state.calls.push(RecordedCall::Delete {
      kind,
      target: target.clone(),
    });
    state.check(kind)?;

    if let Some(rows) = state.tables.get_mut(&kind) {
      rows.retain(|row| !matches(row, target.column, &target.value));
    }
    Ok(())
  }
}

fn merge(row: &mut Map<String, Value>, patch: &Map<String, Value>) {
  for (key, value) in patch {
    row.insert(key.clone(), value.clone());
  }
}

#[async_trait]
impl SessionProvider for MemoryBackend {
  async fn current_user(&self) -> Option<User> {
    self.state.lock().user.clone()
  }
}

#[async_trait]
impl Auth for MemoryBackend {
  async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
    let mut state = self.state.lock();
    let user = match state.accounts.get(email) {
      Some((stored, user)) if stored == password => user.clone(),
      _ => return Err(eyre!("Invalid login credentials")),
    };
    state.user = Some(user.clone());
    Ok(user)
  }

  async fn sign_up(&self, email: &str, password: &str) -> Result<User> {
    let mut state = self.state.lock();
    if state.accounts.contains_key(email) {
      return Err(eyre!("User already registered"));
    }
    let user = User {
      id: Uuid::new_v4().to_string(),
      email: Some(email.to_string()),
    };
    state
      .accounts
      .insert(email.to_string(), (password.to_string(), user.clone()));

    let profile = stamp(json!({
      "user_id": user.id,
      "email": email,
      "timezone": DEFAULT_TIMEZONE,
    }));
    state.tables.entry(EntityKind::Profiles).or_default().push(profile);
    Ok(user)
  }

  async fn sign_out(&self) -> Result<()> {
    self.state.lock().user = None;
    Ok(())
  }

  async fn send_password_reset(&self, email: &str) -> Result<()> {
    if !self.state.lock().accounts.contains_key(email) {
      tracing::debug!(email, "password reset for unknown account");
    }
    Ok(())
  }

  async fn update_password(&self, new_password: &str) -> Result<()> {
    let mut state = self.state.lock();
    let email = state
      .user
      .as_ref()
      .and_then(|u| u.email.clone())
      .ok_or_else(|| eyre!("Sign in before changing your password"))?;
    if let Some((stored, _)) = state.accounts.get_mut(&email) {
      *stored = new_password.to_string();
    }
    Ok(())
  }
}

#[async_trait]
impl AssetStore for MemoryBackend {
  async fn upload(&self, user_id: &str, file: Upload) -> Result<String> {
    let mut state = self.state.lock();
    let path = format!("{}/{}.{}", user_id, Uuid::new_v4(), file.extension());
    state.calls.push(RecordedCall::Upload { path: path.clone() });
    state.check(EntityKind::VisionBoard)?;
    state.objects.insert(path.clone(), file.bytes);
    Ok(format!("{}/{}", LOCAL_URL, path))
  }

  async fn remove(&self, public_url: &str) -> Result<()> {
    let mut state = self.state.lock();
    let path = public_url
      .strip_prefix(LOCAL_URL)
      .map(|p| p.trim_start_matches('/').to_string())
      .ok_or_else(|| eyre!("Unknown image: {}", public_url))?;
    state.calls.push(RecordedCall::Remove { path: path.clone() });
    state.objects.remove(&path);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_insert_assigns_id_and_timestamps() {
    let backend = MemoryBackend::new();
    let row = backend
      .insert(EntityKind::FutureLetters, json!({ "user_id": "u1", "title": "Hi" }))
      .await
      .unwrap();

    assert!(row.get("id").and_then(Value::as_str).is_some());
    assert!(row.get("created_at").is_some());
    assert!(row.get("updated_at").is_some());
    assert_eq!(backend.rows(EntityKind::FutureLetters).len(), 1);
  }

  #[tokio::test]
  async fn test_select_filters_and_orders() {
    let backend = MemoryBackend::new();
    backend.seed(EntityKind::VisionBoard, json!({ "user_id": "u1", "order_index": 2 }));
    backend.seed(EntityKind::VisionBoard, json!({ "user_id": "u2", "order_index": 0 }));
    backend.seed(EntityKind::VisionBoard, json!({ "user_id": "u1", "order_index": 1 }));

    let rows = backend
      .select(
        EntityKind::VisionBoard,
        &Select::owned_by("u1").order_by("order_index", Direction::Asc),
      )
      .await
      .unwrap();

    let order: Vec<i64> = rows
      .iter()
      .map(|r| r["order_index"].as_i64().unwrap())
      .collect();
    assert_eq!(order, vec![1, 2]);
  }

  #[tokio::test]
  async fn test_update_merges_patch_and_records_it() {
    let backend = MemoryBackend::new();
    let row = backend.seed(EntityKind::JournalEntries, json!({ "user_id": "u1", "gratitude": null }));
    let id = row["id"].as_str().unwrap().to_string();

    backend
      .update(
        EntityKind::JournalEntries,
        &RowMatch::id(&id),
        json!({ "gratitude": "sunshine" }),
      )
      .await
      .unwrap();

    assert_eq!(backend.rows(EntityKind::JournalEntries)[0]["gratitude"], "sunshine");
    assert_eq!(
      backend.updates(EntityKind::JournalEntries),
      vec![json!({ "gratitude": "sunshine" })]
    );
  }

  #[tokio::test]
  async fn test_failing_kind_rejects_calls() {
    let backend = MemoryBackend::new();
    backend.set_failing(EntityKind::GuidedReflections, true);
    let result = backend
      .select(EntityKind::GuidedReflections, &Select::owned_by("u1"))
      .await;
    assert!(result.is_err());

    backend.set_failing(EntityKind::GuidedReflections, false);
    assert!(backend
      .select(EntityKind::GuidedReflections, &Select::owned_by("u1"))
      .await
      .is_ok());
  }

  #[tokio::test]
  async fn test_sign_up_then_sign_in() {
    let backend = MemoryBackend::new();
    let user = backend.sign_up("ada@example.com", "pw").await.unwrap();
    assert!(backend.current_user().await.is_none());

    assert!(backend.sign_in("ada@example.com", "wrong").await.is_err());
    let signed_in = backend.sign_in("ada@example.com", "pw").await.unwrap();
    assert_eq!(signed_in, user);
    assert_eq!(backend.current_user().await, Some(user.clone()));

    let profiles = backend.rows(EntityKind::Profiles);
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0]["user_id"], Value::String(user.id));
  }

  #[tokio::test]
  async fn test_upload_and_remove() {
    let backend = MemoryBackend::new();
    let url = backend
      .upload(
        "u1",
        Upload {
          file_name: "a.png".into(),
          content_type: "image/png",
          bytes: vec![1, 2, 3],
        },
      )
      .await
      .unwrap();
    assert!(url.starts_with("memory://vision-board/u1/"));
    assert!(url.ends_with(".png"));

    backend.remove(&url).await.unwrap();
    assert!(backend.remove("https://elsewhere/x.png").await.is_err());
  }
}
