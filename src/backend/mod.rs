//! Contracts for the hosted backend: entity persistence, sessions and file
//! storage.
//!
//! The data-access layer only talks to these traits. `RestBackend` speaks to
//! a PostgREST/GoTrue/storage deployment over HTTP, `MemoryBackend` keeps
//! everything in process for tests and `--local` runs.

mod memory;
mod rest;

pub use memory::{MemoryBackend, RecordedCall};
pub use rest::RestBackend;

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::cache::EntityKind;

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id: String,
  #[serde(default)]
  pub email: Option<String>,
}

impl User {
  /// Name to greet the user with when no nickname is set.
  pub fn display_name(&self) -> &str {
    self
      .email
      .as_deref()
      .and_then(|email| email.split('@').next())
      .filter(|name| !name.is_empty())
      .unwrap_or("there")
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Asc,
  Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
  pub column: &'static str,
  pub direction: Direction,
}

/// Row selection: equality filters plus an optional ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Select {
  pub filters: Vec<(&'static str, String)>,
  pub order: Option<Order>,
}

impl Select {
  /// All rows belonging to one user.
  pub fn owned_by(user_id: &str) -> Self {
    Self::default().eq("user_id", user_id)
  }

  pub fn eq(mut self, column: &'static str, value: impl Into<String>) -> Self {
    self.filters.push((column, value.into()));
    self
  }

  pub fn order_by(mut self, column: &'static str, direction: Direction) -> Self {
    self.order = Some(Order { column, direction });
    self
  }
}

/// Target of an update or delete: rows where `column = value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMatch {
  pub column: &'static str,
  pub value: String,
}

impl RowMatch {
  pub fn id(id: &str) -> Self {
    Self {
      column: "id",
      value: id.to_string(),
    }
  }

  pub fn user(user_id: &str) -> Self {
    Self {
      column: "user_id",
      value: user_id.to_string(),
    }
  }
}

/// Entity persistence. Rows travel as JSON objects; typing happens above.
#[async_trait]
pub trait Gateway: Send + Sync {
  async fn select(&self, kind: EntityKind, query: &Select) -> Result<Vec<Value>>;

  /// Insert one row and return it as stored (with id and timestamps).
  async fn insert(&self, kind: EntityKind, row: Value) -> Result<Value>;

  async fn update(&self, kind: EntityKind, target: &RowMatch, patch: Value) -> Result<()>;

  async fn delete(&self, kind: EntityKind, target: &RowMatch) -> Result<()>;
}

/// Who is signed in right now.
#[async_trait]
pub trait SessionProvider: Send + Sync {
  async fn current_user(&self) -> Option<User>;
}

/// Account flows. These are explicit user actions, so every failure is
/// returned to the caller for display.
#[async_trait]
pub trait Auth: SessionProvider {
  async fn sign_in(&self, email: &str, password: &str) -> Result<User>;

  async fn sign_up(&self, email: &str, password: &str) -> Result<User>;

  async fn sign_out(&self) -> Result<()>;

  async fn send_password_reset(&self, email: &str) -> Result<()>;

  async fn update_password(&self, new_password: &str) -> Result<()>;
}

/// A file to upload.
#[derive(Debug, Clone)]
pub struct Upload {
  pub file_name: String,
  pub content_type: &'static str,
  pub bytes: Vec<u8>,
}

impl Upload {
  pub fn from_path(path: &Path) -> Result<Self> {
    let bytes = std::fs::read(path)
      .map_err(|e| eyre!("Failed to read image {}: {}", path.display(), e))?;
    let file_name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .ok_or_else(|| eyre!("Not a file: {}", path.display()))?;

    Ok(Self {
      content_type: content_type_for(&file_name),
      file_name,
      bytes,
    })
  }

  /// Extension used for the stored object name.
  pub fn extension(&self) -> &str {
    self.file_name.rsplit('.').next().unwrap_or_default()
  }
}

fn content_type_for(file_name: &str) -> &'static str {
  let ext = file_name.rsplit('.').next().unwrap_or_default().to_lowercase();
  match ext.as_str() {
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "svg" => "image/svg+xml",
    _ => "application/octet-stream",
  }
}

/// Binary object storage for vision board images.
#[async_trait]
pub trait AssetStore: Send + Sync {
  /// Store the file under the user's folder and return its public URL.
  async fn upload(&self, user_id: &str, file: Upload) -> Result<String>;

  /// Remove a previously uploaded file by its public URL.
  async fn remove(&self, public_url: &str) -> Result<()>;
}

/// The three backend services, wired once at startup.
#[derive(Clone)]
pub struct Backend {
  pub gateway: Arc<dyn Gateway>,
  pub assets: Arc<dyn AssetStore>,
  pub auth: Arc<dyn Auth>,
}

impl Backend {
  pub fn rest(backend: RestBackend) -> Self {
    let backend = Arc::new(backend);
    Self {
      gateway: backend.clone(),
      assets: backend.clone(),
      auth: backend,
    }
  }

  pub fn memory(backend: MemoryBackend) -> Self {
    let backend = Arc::new(backend);
    Self {
      gateway: backend.clone(),
      assets: backend.clone(),
      auth: backend,
    }
  }

  pub fn session(&self) -> Arc<dyn SessionProvider> {
    Arc::new(AuthSession(Arc::clone(&self.auth)))
  }
}

/// Exposes an `Auth` as a plain `SessionProvider`.
struct AuthSession(Arc<dyn Auth>);

#[async_trait]
impl SessionProvider for AuthSession {
  async fn current_user(&self) -> Option<User> {
    self.0.current_user().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display_name_from_email() {
    let user = User {
      id: "u1".into(),
      email: Some("ada@example.com".into()),
    };
    assert_eq!(user.display_name(), "ada");

    let anonymous = User {
      id: "u2".into(),
      email: None,
    };
    assert_eq!(anonymous.display_name(), "there");
  }

  #[test]
  fn test_select_builder() {
    let query = Select::owned_by("u1")
      .eq("entry_date", "2024-03-01")
      .order_by("entry_date", Direction::Desc);
    assert_eq!(
      query.filters,
      vec![
        ("user_id", "u1".to_string()),
        ("entry_date", "2024-03-01".to_string())
      ]
    );
    assert_eq!(
      query.order,
      Some(Order {
        column: "entry_date",
        direction: Direction::Desc
      })
    );
  }

  #[test]
  fn test_content_type_and_extension() {
    let upload = Upload {
      file_name: "sunrise.JPG".into(),
      content_type: content_type_for("sunrise.JPG"),
      bytes: vec![],
    };
    assert_eq!(upload.content_type, "image/jpeg");
    assert_eq!(upload.extension(), "JPG");
    assert_eq!(content_type_for("notes"), "application/octet-stream");
  }
}
