//! Configuration: optional `~/.wfg-analytics/config.json` overlaid with
//! environment variables. Missing store credentials are fatal at startup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::DashboardError;

const STATE_DIR_NAME: &str = ".wfg-analytics";
const CONFIG_FILE: &str = "config.json";

/// Environment variables checked in order for each setting.
const URL_VARS: &[&str] = &["SUPABASE_URL", "VITE_SUPABASE_URL"];
const KEY_VARS: &[&str] = &["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"];
const HOME_VAR: &str = "WFG_ANALYTICS_HOME";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anon_key: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_table() -> String {
    "user_chart_data".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            table: default_table(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Validated settings for the remote store.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub url: Url,
    pub anon_key: String,
    pub table: String,
    pub request_timeout: Duration,
}

impl Config {
    /// Load from an optional file, then let `env` override store credentials.
    pub fn load_from(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Config, DashboardError> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let content = fs::read_to_string(p).map_err(|e| {
                    DashboardError::Configuration(format!("Failed to read {}: {}", p.display(), e))
                })?;
                serde_json::from_str(&content).map_err(|e| {
                    DashboardError::Configuration(format!("Failed to parse {}: {}", p.display(), e))
                })?
            }
            _ => Config::default(),
        };

        let first_set = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| env(name))
                .find(|v| !v.trim().is_empty())
        };
        if let Some(url) = first_set(URL_VARS) {
            config.store.url = Some(url);
        }
        if let Some(key) = first_set(KEY_VARS) {
            config.store.anon_key = Some(key);
        }

        Ok(config)
    }

    /// Load from `~/.wfg-analytics/config.json` and the process environment.
    pub fn load() -> Result<Config, DashboardError> {
        let path = config_path().ok();
        Config::load_from(path.as_deref(), |name| std::env::var(name).ok())
    }

    /// Resolve store settings. The process must not proceed without them.
    pub fn store_settings(&self) -> Result<StoreSettings, DashboardError> {
        let url = self
            .store
            .url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let anon_key = self
            .store
            .anon_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let (Some(url), Some(anon_key)) = (url, anon_key) else {
            return Err(DashboardError::Configuration(
                "Missing Supabase environment variables. Set SUPABASE_URL and SUPABASE_ANON_KEY."
                    .to_string(),
            ));
        };

        let url = Url::parse(url)
            .map_err(|e| DashboardError::Configuration(format!("Invalid store URL {}: {}", url, e)))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(DashboardError::Configuration(format!(
                "Store URL must be http(s): {}",
                url
            )));
        }
        if self.store.table.trim().is_empty() {
            return Err(DashboardError::Configuration(
                "Store table name is empty".to_string(),
            ));
        }

        Ok(StoreSettings {
            url,
            anon_key: anon_key.to_string(),
            table: self.store.table.trim().to_string(),
            request_timeout: Duration::from_secs(self.store.request_timeout_secs.max(1)),
        })
    }
}

/// Get the state directory (`$WFG_ANALYTICS_HOME` or `~/.wfg-analytics`)
pub fn state_dir() -> Result<PathBuf, DashboardError> {
    if let Some(dir) = std::env::var_os(HOME_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir()
        .ok_or_else(|| DashboardError::Configuration("Could not find home directory".into()))?;
    Ok(home.join(STATE_DIR_NAME))
}

/// Get the config file path inside the state directory
pub fn config_path() -> Result<PathBuf, DashboardError> {
    Ok(state_dir()?.join(CONFIG_FILE))
}
