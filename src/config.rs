use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::controller::OptionsTree;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub marketplace: MarketplaceConfig,
  /// Custom title for the header (defaults to the marketplace host)
  pub title: Option<String>,
  #[serde(default)]
  pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceConfig {
  /// Base URL of the marketplace analytics server
  pub url: String,
  /// Company the session options are scoped to
  pub company_id: String,
  /// Restrict the dashboard to one marketplace instance
  pub instance_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
  /// Date filter applied when no session options exist (e.g. "this_month")
  pub default_filter: Option<String>,
  /// Seconds between notification polls
  pub notification_poll_secs: u64,
}

impl Default for DashboardConfig {
  fn default() -> Self {
    Self {
      default_filter: None,
      notification_poll_secs: 30,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./mkdash.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/mkdash/config.yaml
  /// 4. ~/.config/mkdash/config.yaml
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
        "No configuration file found. Create one at ~/.config/mkdash/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("mkdash.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("mkdash").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Get the marketplace API token from environment variables.
  ///
  /// Checks MKDASH_TOKEN first, then MARKETPLACE_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("MKDASH_TOKEN")
      .or_else(|_| std::env::var("MARKETPLACE_API_TOKEN"))
      .map_err(|_| {
        eyre!(
          "API token not found. Set MKDASH_TOKEN or MARKETPLACE_API_TOKEN environment variable."
        )
      })
  }

  /// Options submitted on a first load, before any session state exists.
  pub fn default_options(&self) -> OptionsTree {
    let mut value = json!({ "show_breakdown": true });
    if let Some(filter) = &self.dashboard.default_filter {
      value["date"] = json!({ "filter": filter });
    }
    OptionsTree::from_value(value).unwrap_or_default()
  }
}
