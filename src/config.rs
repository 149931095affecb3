use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::DemoCredentials;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub smart: SmartConfig,
  /// View opened at startup (defaults to exchanges)
  pub default_view: Option<String>,
  /// Custom title for header (defaults to the backend host if not set)
  pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub url: String,
  pub supabase_url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_ttl_secs")]
  pub default_ttl_secs: u64,
  #[serde(default = "default_max_size")]
  pub max_size: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      default_ttl_secs: default_ttl_secs(),
      max_size: default_max_size(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmartConfig {
  /// Serve bundled sample data when the backend and cache both fail
  #[serde(default)]
  pub use_fallback: bool,
  /// Account used for automatic re-login; password from EXDESK_DEMO_PASSWORD
  pub demo_email: Option<String>,
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_ttl_secs() -> u64 {
  5 * 60
}

fn default_max_size() -> usize {
  100
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./exdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/exdesk/config.yaml
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
        "No configuration file found. Create one at ~/.config/exdesk/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("exdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("exdesk").join("config.yaml");
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

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.api.timeout_secs)
  }

  pub fn cache_ttl(&self) -> Duration {
    Duration::from_secs(self.cache.default_ttl_secs)
  }

  /// Demo account for automatic re-login, if both halves are configured.
  pub fn demo_credentials(&self) -> Option<DemoCredentials> {
    let email = self.smart.demo_email.clone()?;
    let password = std::env::var("EXDESK_DEMO_PASSWORD").ok()?;
    Some(DemoCredentials { email, password })
  }

  /// Get the Supabase anon key from the environment.
  ///
  /// Checks EXDESK_SUPABASE_KEY.
  pub fn get_supabase_key() -> Result<String> {
    std::env::var("EXDESK_SUPABASE_KEY")
      .map_err(|_| eyre!("Supabase key not found. Set EXDESK_SUPABASE_KEY environment variable."))
  }

  /// Get the login password from the environment.
  ///
  /// Checks EXDESK_PASSWORD.
  pub fn get_password() -> Result<String> {
    std::env::var("EXDESK_PASSWORD")
      .map_err(|_| eyre!("Password not found. Set EXDESK_PASSWORD environment variable."))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_applies_defaults() {
    let config = Config::parse(
      "api:\n  url: https://backend.test/api\n  supabase_url: https://proj.supabase.co\n",
    )
    .unwrap();

    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.cache.max_size, 100);
    assert_eq!(config.cache_ttl(), Duration::from_secs(300));
    assert!(!config.smart.use_fallback);
    assert!(config.default_view.is_none());
  }

  #[test]
  fn test_parse_full_file() {
    let config = Config::parse(
      r#"
api:
  url: https://backend.test/api
  supabase_url: https://proj.supabase.co
  timeout_secs: 5
cache:
  default_ttl_secs: 60
  max_size: 10
smart:
  use_fallback: true
  demo_email: demo@exdesk.io
default_view: tasks
title: Acme 1031
"#,
    )
    .unwrap();

    assert_eq!(config.timeout(), Duration::from_secs(5));
    assert_eq!(config.cache.max_size, 10);
    assert!(config.smart.use_fallback);
    assert_eq!(config.smart.demo_email.as_deref(), Some("demo@exdesk.io"));
    assert_eq!(config.default_view.as_deref(), Some("tasks"));
    assert_eq!(config.title.as_deref(), Some("Acme 1031"));
  }

  #[test]
  fn test_missing_api_section_is_an_error() {
    assert!(Config::parse("title: x\n").is_err());
  }

  #[test]
  fn test_load_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exdesk.yaml");
    std::fs::write(
      &path,
      "api:\n  url: http://localhost:5001/api\n  supabase_url: http://localhost:54321\n",
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.api.url, "http://localhost:5001/api");

    let missing = dir.path().join("nope.yaml");
    assert!(Config::load(Some(&missing)).is_err());
  }
}
