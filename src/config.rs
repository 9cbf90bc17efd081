use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::timetable::DEFAULT_WINDOW_DAYS;
use crate::remote::DEFAULT_PAGE_SIZE;

/// Environment variable holding the API bearer token
pub const TOKEN_ENV: &str = "EDUSYNC_TOKEN";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub server: ServerConfig,
  #[serde(default = "default_page_size")]
  pub page_size: usize,
  #[serde(default)]
  pub timetable: TimetableConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub url: String,
  /// Whose records to view
  pub student_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimetableConfig {
  #[serde(default = "default_window_days")]
  pub window_days: u32,
  pub class_id: Option<i64>,
}

impl Default for TimetableConfig {
  fn default() -> Self {
    Self {
      window_days: DEFAULT_WINDOW_DAYS,
      class_id: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Record responses and serve them when the server is unreachable
  #[serde(default)]
  pub offline: bool,
  /// Mirror database location (defaults under the user data directory)
  pub path: Option<PathBuf>,
  /// Oldest recorded response still served offline, in minutes
  #[serde(default = "default_stale_minutes")]
  pub stale_minutes: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      offline: false,
      path: None,
      stale_minutes: default_stale_minutes(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Directory for the rolling log file (defaults under the user data directory)
  pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      dir: None,
    }
  }
}

fn default_page_size() -> usize {
  DEFAULT_PAGE_SIZE
}

fn default_window_days() -> u32 {
  DEFAULT_WINDOW_DAYS
}

fn default_stale_minutes() -> i64 {
  60
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./edusync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/edusync/config.yaml
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
        "No configuration file found. Create one at ~/.config/edusync/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("edusync.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("edusync").join("config.yaml");
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
    if config.page_size == 0 {
      return Err(eyre!("page_size must be at least 1"));
    }
    if config.timetable.window_days == 0 {
      return Err(eyre!("timetable.window_days must be at least 1"));
    }
    Ok(config)
  }

  /// Get the API token from the environment, if one is set.
  pub fn get_api_token() -> Option<String> {
    std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty())
  }
}
