use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Hosted backend; absent when running with `--local`
  pub backend: Option<BackendConfig>,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub autosave: AutosaveConfig,
  /// Timezone written into newly created profiles
  #[serde(default = "default_timezone")]
  pub default_timezone: String,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      backend: None,
      cache: CacheConfig::default(),
      autosave: AutosaveConfig::default(),
      default_timezone: default_timezone(),
    }
  }
}

fn default_timezone() -> String {
  DEFAULT_TIMEZONE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  /// Project URL, e.g. https://abcd.supabase.co
  pub url: String,
  /// Account email used for sign-in at startup
  pub email: Option<String>,
  /// Storage bucket for vision board images
  #[serde(default = "default_bucket")]
  pub bucket: String,
}

fn default_bucket() -> String {
  "vision-board".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_secs: default_ttl_secs(),
    }
  }
}

impl CacheConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_secs(self.ttl_secs)
  }
}

fn default_ttl_secs() -> u64 {
  5 * 60
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutosaveConfig {
  #[serde(default = "default_entry_delay")]
  pub entry_delay_ms: u64,
  #[serde(default = "default_entry_delay")]
  pub profile_delay_ms: u64,
  #[serde(default = "default_reflection_delay")]
  pub reflection_delay_ms: u64,
}

impl Default for AutosaveConfig {
  fn default() -> Self {
    Self {
      entry_delay_ms: default_entry_delay(),
      profile_delay_ms: default_entry_delay(),
      reflection_delay_ms: default_reflection_delay(),
    }
  }
}

fn default_entry_delay() -> u64 {
  800
}

fn default_reflection_delay() -> u64 {
  1000
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./reverie.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/reverie/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/reverie/config.yaml\n\
                 or run with --local to try reverie without a backend."
      )),
    }
  }

  /// Like `load`, but falls back to defaults when no file exists.
  pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
    if explicit_path.is_some() {
      return Self::load(explicit_path);
    }
    match Self::find_config_file() {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("reverie.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("reverie").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// The backend section, required for anything but `--local`.
  pub fn backend(&self) -> Result<&BackendConfig> {
    self
      .backend
      .as_ref()
      .ok_or_else(|| eyre!("No backend configured. Add a `backend:` section or use --local."))
  }

  /// Get the backend API key from the environment.
  ///
  /// Checks REVERIE_ANON_KEY first, then SUPABASE_ANON_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("REVERIE_ANON_KEY")
      .or_else(|_| std::env::var("SUPABASE_ANON_KEY"))
      .map_err(|_| {
        eyre!("Backend API key not found. Set REVERIE_ANON_KEY or SUPABASE_ANON_KEY environment variable.")
      })
  }

  /// Get the account password from the environment.
  pub fn get_password() -> Result<String> {
    std::env::var("REVERIE_PASSWORD")
      .map_err(|_| eyre!("Password not found. Set REVERIE_PASSWORD environment variable."))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("backend:\n  url: https://demo.supabase.co\n").unwrap();
    let backend = config.backend().unwrap();
    assert_eq!(backend.url, "https://demo.supabase.co");
    assert_eq!(backend.bucket, "vision-board");
    assert!(backend.email.is_none());
    assert_eq!(config.cache.ttl(), Duration::from_secs(300));
    assert_eq!(config.autosave.entry_delay_ms, 800);
    assert_eq!(config.autosave.profile_delay_ms, 800);
    assert_eq!(config.autosave.reflection_delay_ms, 1000);
    assert_eq!(config.default_timezone, DEFAULT_TIMEZONE);
  }

  #[test]
  fn test_overrides() {
    let yaml = r#"
backend:
  url: https://demo.supabase.co
  email: me@example.com
  bucket: boards
cache:
  ttl_secs: 60
autosave:
  entry_delay_ms: 500
  reflection_delay_ms: 1500
default_timezone: Europe/Berlin
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.backend().unwrap().email.as_deref(), Some("me@example.com"));
    assert_eq!(config.backend().unwrap().bucket, "boards");
    assert_eq!(config.cache.ttl_secs, 60);
    assert_eq!(config.autosave.entry_delay_ms, 500);
    assert_eq!(config.autosave.profile_delay_ms, 800);
    assert_eq!(config.autosave.reflection_delay_ms, 1500);
    assert_eq!(config.default_timezone, "Europe/Berlin");
  }

  #[test]
  fn test_missing_backend_is_an_error() {
    let config = Config::default();
    assert!(config.backend().is_err());
  }
}
