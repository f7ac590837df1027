use async_trait::async_trait;
use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use parking_lot::RwLock;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use super::{
  AssetStore, Auth, Direction, Gateway, RowMatch, Select, SessionProvider, Upload, User,
};
use crate::cache::EntityKind;
use crate::config::Config;

const EMAIL_NOT_CONFIRMED: &str = "Please confirm your email address before signing in. \
  Check your inbox for the confirmation link we sent you.";

#[derive(Debug, Clone)]
struct Session {
  access_token: String,
  user: User,
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct ApiSession {
  access_token: String,
  user: User,
}

/// HTTP client for a hosted PostgREST + GoTrue + object storage deployment.
#[derive(Clone)]
pub struct RestBackend {
  http: reqwest::Client,
  base: Url,
  api_key: String,
  bucket: String,
  default_timezone: String,
  session: Arc<RwLock<Option<Session>>>,
}

impl RestBackend {
  pub fn new(config: &Config) -> Result<Self> {
    let backend = config.backend()?;
    let api_key = Config::get_api_key()?;
    Self::with_key(&backend.url, api_key, &backend.bucket, &config.default_timezone)
  }

  fn with_key(url: &str, api_key: String, bucket: &str, default_timezone: &str) -> Result<Self> {
    // Url::join drops the last path segment unless the base ends in '/'
    let normalized = format!("{}/", url.trim_end_matches('/'));
    let base =
      Url::parse(&normalized).map_err(|e| eyre!("Invalid backend URL {}: {}", url, e))?;

    Ok(Self {
      http: reqwest::Client::new(),
      base,
      api_key,
      bucket: bucket.to_string(),
      default_timezone: default_timezone.to_string(),
      session: Arc::new(RwLock::new(None)),
    })
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))
  }

  fn table_url(&self, kind: EntityKind) -> Result<Url> {
    self.endpoint(&format!("rest/v1/{}", kind.table()))
  }

  fn select_url(&self, kind: EntityKind, query: &Select) -> Result<Url> {
    let mut url = self.table_url(kind)?;
    {
      let mut pairs = url.query_pairs_mut();
      pairs.append_pair("select", "*");
      for (column, value) in &query.filters {
        pairs.append_pair(column, &format!("eq.{}", value));
      }
      if let Some(order) = query.order {
        let direction = match order.direction {
          Direction::Asc => "asc",
          Direction::Desc => "desc",
        };
        pairs.append_pair("order", &format!("{}.{}", order.column, direction));
      }
    }
    Ok(url)
  }

  fn match_url(&self, kind: EntityKind, target: &RowMatch) -> Result<Url> {
    let mut url = self.table_url(kind)?;
    url
      .query_pairs_mut()
      .append_pair(target.column, &format!("eq.{}", target.value));
    Ok(url)
  }

  fn public_url(&self, path: &str) -> Result<Url> {
    self.endpoint(&format!("storage/v1/object/public/{}/{}", self.bucket, path))
  }

  /// Build a request carrying the API key and the session token when signed in.
  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    let token = self
      .session
      .read()
      .as_ref()
      .map(|s| s.access_token.clone())
      .unwrap_or_else(|| self.api_key.clone());

    self
      .http
      .request(method, url)
      .header("apikey", &self.api_key)
      .bearer_auth(token)
  }

  fn set_session(&self, session: Option<Session>) {
    *self.session.write() = session;
  }
}

/// Turn a non-success response into an error carrying the backend's message.
async fn check(response: Response, action: &str) -> Result<Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  let body = response.text().await.unwrap_or_default();
  Err(eyre!("Failed to {} ({}): {}", action, status, error_message(&body)))
}

/// Extract the human message from a PostgREST/GoTrue error body.
fn error_message(body: &str) -> String {
  let parsed: Option<Value> = serde_json::from_str(body).ok();
  parsed
    .as_ref()
    .and_then(|v| {
      ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|field| v.get(field).and_then(Value::as_str))
    })
    .map(String::from)
    .unwrap_or_else(|| body.trim().to_string())
}

/// Object path inside the bucket, recovered from a public URL.
fn object_path<'a>(public_url: &'a str, bucket: &str) -> Option<&'a str> {
  public_url
    .split_once(&format!("/{}/", bucket))
    .map(|(_, path)| path)
    .filter(|path| !path.is_empty())
}

#[async_trait]
impl Gateway for RestBackend {
  async fn select(&self, kind: EntityKind, query: &Select) -> Result<Vec<Value>> {
    let url = self.select_url(kind, query)?;
    let response = self
      .request(Method::GET, url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", kind.label(), e))?;

    check(response, &format!("fetch {}", kind.label()))
      .await?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse {}: {}", kind.label(), e))
  }

  async fn insert(&self, kind: EntityKind, row: Value) -> Result<Value> {
    let url = self.table_url(kind)?;
    let response = self
      .request(Method::POST, url)
      .header("Prefer", "return=representation")
      .json(&row)
      .send()
      .await
      .map_err(|e| eyre!("Failed to create {}: {}", kind.label(), e))?;

    let mut rows: Vec<Value> = check(response, &format!("create {}", kind.label()))
      .await?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse created {}: {}", kind.label(), e))?;

    if rows.is_empty() {
      return Err(eyre!("Backend returned no row for new {}", kind.label()));
    }
    Ok(rows.swap_remove(0))
  }

  async fn update(&self, kind: EntityKind, target: &RowMatch, patch: Value) -> Result<()> {
    let url = self.match_url(kind, target)?;
    let response = self
      .request(Method::PATCH, url)
      .header("Prefer", "return=minimal")
      .json(&patch)
      .send()
      .await
      .map_err(|e| eyre!("Failed to update {}: {}", kind.label(), e))?;

    check(response, &format!("update {}", kind.label())).await?;
    Ok(())
  }

  async fn delete(&self, kind: EntityKind, target: &RowMatch) -> Result<()> {
    let url = self.match_url(kind, target)?;
    let response = self
      .request(Method::DELETE, url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to delete {}: {}", kind.label(), e))?;

    check(response, &format!("delete {}", kind.label())).await?;
    Ok(())
  }
}

#[async_trait]
impl SessionProvider for RestBackend {
  async fn current_user(&self) -> Option<User> {
    self.session.read().as_ref().map(|s| s.user.clone())
  }
}

#[async_trait]
impl Auth for RestBackend {
  async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
    let mut url = self.endpoint("auth/v1/token")?;
    url.query_pairs_mut().append_pair("grant_type", "password");

    let response = self
      .request(Method::POST, url)
      .json(&json!({ "email": email, "password": password }))
      .send()
      .await
      .map_err(|e| eyre!("Failed to sign in: {}", e))?;

    let response = match check(response, "sign in").await {
      Ok(response) => response,
      Err(e) if e.to_string().contains("Email not confirmed") => {
        return Err(eyre!(EMAIL_NOT_CONFIRMED));
      }
      Err(e) => return Err(e),
    };

    let session: ApiSession = response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse session: {}", e))?;

    info!(user_id = %session.user.id, "signed in");
    let user = session.user.clone();
    self.set_session(Some(Session {
      access_token: session.access_token,
      user: session.user,
    }));
    Ok(user)
  }

  async fn sign_up(&self, email: &str, password: &str) -> Result<User> {
    let url = self.endpoint("auth/v1/signup")?;
    let response = self
      .request(Method::POST, url)
      .json(&json!({ "email": email, "password": password }))
      .send()
      .await
      .map_err(|e| eyre!("Failed to sign up: {}", e))?;

    let body: Value = check(response, "sign up")
      .await?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse sign-up response: {}", e))?;

    // With email confirmation on, the response is the bare user object
    let user: User = match body.get("user") {
      Some(user) => serde_json::from_value(user.clone()),
      None => serde_json::from_value(body.clone()),
    }
    .map_err(|e| eyre!("Failed to parse new user: {}", e))?;

    if let Some(token) = body.get("access_token").and_then(Value::as_str) {
      self.set_session(Some(Session {
        access_token: token.to_string(),
        user: user.clone(),
      }));
    }

    let profile = json!({
      "user_id": user.id,
      "email": user.email,
      "timezone": self.default_timezone,
    });
    if let Err(e) = self.insert(EntityKind::Profiles, profile).await {
      // Not fatal: the journal view creates the profile on first load
      warn!(error = %e, "profile creation after sign-up failed");
    }

    info!(user_id = %user.id, "signed up");
    Ok(user)
  }

  async fn sign_out(&self) -> Result<()> {
    if self.session.read().is_none() {
      return Ok(());
    }
    let url = self.endpoint("auth/v1/logout")?;
    let response = self
      .request(Method::POST, url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to sign out: {}", e))?;

    check(response, "sign out").await?;
    self.set_session(None);
    info!("signed out");
    Ok(())
  }

  async fn send_password_reset(&self, email: &str) -> Result<()> {
    let url = self.endpoint("auth/v1/recover")?;
    let response = self
      .request(Method::POST, url)
      .json(&json!({ "email": email }))
      .send()
      .await
      .map_err(|e| eyre!("Failed to request password reset: {}", e))?;

    check(response, "request password reset").await?;
    Ok(())
  }

  async fn update_password(&self, new_password: &str) -> Result<()> {
    if self.session.read().is_none() {
      return Err(eyre!("Sign in before changing your password"));
    }
    let url = self.endpoint("auth/v1/user")?;
    let response = self
      .request(Method::PUT, url)
      .json(&json!({ "password": new_password }))
      .send()
      .await
      .map_err(|e| eyre!("Failed to update password: {}", e))?;

    check(response, "update password").await?;
    Ok(())
  }
}

#[async_trait]
impl AssetStore for RestBackend {
  async fn upload(&self, user_id: &str, file: Upload) -> Result<String> {
    let path = format!(
      "{}/{}.{}",
      user_id,
      Utc::now().timestamp_millis(),
      file.extension()
    );
    let url = self.endpoint(&format!("storage/v1/object/{}/{}", self.bucket, path))?;

    let response = self
      .request(Method::POST, url)
      .header("Content-Type", file.content_type)
      .body(file.bytes)
      .send()
      .await
      .map_err(|e| eyre!("Failed to upload image: {}", e))?;

    check(response, "upload image").await?;
    let public = self.public_url(&path)?;
    info!(%public, "image uploaded");
    Ok(public.to_string())
  }

  async fn remove(&self, public_url: &str) -> Result<()> {
    let path = object_path(public_url, &self.bucket)
      .ok_or_else(|| eyre!("Not an image in bucket {}: {}", self.bucket, public_url))?;
    let url = self.endpoint(&format!("storage/v1/object/{}", self.bucket))?;

    let response = self
      .request(Method::DELETE, url)
      .json(&json!({ "prefixes": [path] }))
      .send()
      .await
      .map_err(|e| eyre!("Failed to delete image: {}", e))?;

    check(response, "delete image").await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn backend() -> RestBackend {
    RestBackend::with_key(
      "https://demo.supabase.co/",
      "anon".to_string(),
      "vision-board",
      "Asia/Kolkata",
    )
    .unwrap()
  }

  #[test]
  fn test_select_url() {
    let query = Select::owned_by("u1")
      .eq("entry_date", "2024-03-01")
      .order_by("entry_date", Direction::Desc);
    let url = backend()
      .select_url(EntityKind::JournalEntries, &query)
      .unwrap();
    assert_eq!(
      url.as_str(),
      "https://demo.supabase.co/rest/v1/journal_entries?select=*&user_id=eq.u1&entry_date=eq.2024-03-01&order=entry_date.desc"
    );
  }

  #[test]
  fn test_match_url() {
    let url = backend()
      .match_url(EntityKind::Profiles, &RowMatch::user("u1"))
      .unwrap();
    assert_eq!(
      url.as_str(),
      "https://demo.supabase.co/rest/v1/profiles?user_id=eq.u1"
    );
  }

  #[test]
  fn test_base_without_trailing_slash() {
    let backend =
      RestBackend::with_key("https://demo.supabase.co", "anon".into(), "b", "UTC").unwrap();
    assert_eq!(
      backend.table_url(EntityKind::VisionBoard).unwrap().as_str(),
      "https://demo.supabase.co/rest/v1/vision_board_items"
    );
  }

  #[test]
  fn test_public_url_and_object_path_round_trip() {
    let backend = backend();
    let url = backend.public_url("u1/1700000000000.png").unwrap();
    assert_eq!(
      url.as_str(),
      "https://demo.supabase.co/storage/v1/object/public/vision-board/u1/1700000000000.png"
    );
    assert_eq!(
      object_path(url.as_str(), "vision-board"),
      Some("u1/1700000000000.png")
    );
    assert_eq!(object_path("https://elsewhere/img.png", "vision-board"), None);
  }

  #[test]
  fn test_error_message_extraction() {
    assert_eq!(
      error_message(r#"{"code":"PGRST116","message":"No rows found"}"#),
      "No rows found"
    );
    assert_eq!(
      error_message(r#"{"error":"invalid_grant","error_description":"Email not confirmed"}"#),
      "Email not confirmed"
    );
    assert_eq!(error_message("  gateway timeout "), "gateway timeout");
  }

  #[tokio::test]
  async fn test_no_session_until_sign_in() {
    let backend = backend();
    assert!(backend.current_user().await.is_none());
    // Signing out without a session is a no-op
    backend.sign_out().await.unwrap();
    assert!(backend.update_password("secret").await.is_err());
  }
}
