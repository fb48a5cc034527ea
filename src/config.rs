use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub server: ServerConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Organization whose secrets `:orgsecrets` opens without an argument
  pub default_namespace: Option<String>,
  /// Custom title for header (defaults to the server host if not set)
  pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub url: String,
  /// Per-request timeout
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Persist list snapshots between sessions
  #[serde(default = "default_persist")]
  pub persist: bool,
  /// Snapshot database location (default: $XDG_DATA_HOME/d9s/cache.db)
  pub path: Option<PathBuf>,
}

fn default_persist() -> bool {
  true
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      persist: default_persist(),
      path: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./d9s.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/d9s/config.yaml
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
        "No configuration file found. Create one at ~/.config/d9s/config.yaml\n\
                 or pass --server <url>."
      )),
    }
  }

  /// Configuration for a server given on the command line, used when no
  /// config file exists.
  pub fn for_server(url: &str) -> Self {
    Self {
      server: ServerConfig {
        url: url.to_string(),
        timeout_secs: default_timeout_secs(),
      },
      cache: CacheConfig::default(),
      default_namespace: None,
      title: None,
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("d9s.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("d9s").join("config.yaml");
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

  /// Get the API token from environment variables.
  ///
  /// Checks D9S_TOKEN first, then DRONE_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("D9S_TOKEN")
      .or_else(|_| std::env::var("DRONE_TOKEN"))
      .map_err(|_| eyre!("API token not found. Set D9S_TOKEN or DRONE_TOKEN environment variable."))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("server:\n  url: https://drone.example.com\n").expect("config");
    assert_eq!(config.server.url, "https://drone.example.com");
    assert_eq!(config.server.timeout_secs, 30);
    assert!(config.cache.persist);
    assert!(config.cache.path.is_none());
    assert!(config.default_namespace.is_none());
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
server:
  url: http://localhost:8080
  timeout_secs: 5
cache:
  persist: false
  path: /tmp/d9s.db
default_namespace: octocat
title: staging
"#;
    let config = Config::parse(yaml).expect("config");
    assert_eq!(config.server.timeout_secs, 5);
    assert!(!config.cache.persist);
    assert_eq!(config.cache.path, Some(PathBuf::from("/tmp/d9s.db")));
    assert_eq!(config.default_namespace.as_deref(), Some("octocat"));
    assert_eq!(config.title.as_deref(), Some("staging"));
  }

  #[test]
  fn test_missing_server_is_rejected() {
    assert!(Config::parse("title: x\n").is_err());
  }

  #[test]
  fn test_explicit_missing_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/d9s.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
