//! Configuration management for gwork.
//!
//! Settings merge three layers: built-in defaults, an optional TOML config
//! file, and environment variables (loaded through dotenvy for `.env`
//! support). Credentials never live in the config file.

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::LlmConfig;

/// Resolved application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename inside the data directory.
    pub database_filename: String,
    /// Request timeout in seconds for upstream calls.
    pub request_timeout: u64,
    /// Per-source search result limit for interactive searches.
    pub per_source_limit: usize,
    /// Upstream credentials (environment only).
    pub credentials: SourceCredentials,
    /// LLM scoring configuration.
    pub llm: LlmConfig,
}

/// Credentials for the credentialed upstreams. Missing entries degrade the
/// corresponding source to an informational result, never a crash.
#[derive(Debug, Clone, Default)]
pub struct SourceCredentials {
    pub superjob_api_key: Option<String>,
    pub habr_client_id: Option<String>,
    pub habr_client_secret: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("gwork");
        Self {
            data_dir,
            database_filename: "gwork.db".to_string(),
            request_timeout: 30,
            per_source_limit: 4,
            credentials: SourceCredentials::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Settings {
    /// Full path to the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)
    }
}

/// Configuration file structure (TOML).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory override.
    #[serde(default)]
    pub target: Option<String>,
    /// Database filename override.
    #[serde(default)]
    pub database: Option<String>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub request_timeout: Option<u64>,
    /// Per-source result limit.
    #[serde(default)]
    pub per_source_limit: Option<usize>,
    /// LLM scoring configuration.
    #[serde(default)]
    pub llm: Option<LlmConfig>,
}

impl Config {
    /// Load the config file from an explicit path or the default location
    /// (`<config dir>/gwork/config.toml`). A missing file yields defaults.
    pub fn load(path: Option<&PathBuf>) -> Config {
        let path = path.cloned().or_else(|| {
            dirs::config_dir().map(|dir| dir.join("gwork").join("config.toml"))
        });
        let Some(path) = path else {
            return Config::default();
        };
        match fs::read_to_string(&path) {
            Ok(text) => match toml::from_str(&text) {
                Ok(config) => {
                    debug!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Ignoring malformed config {}: {}", path.display(), e);
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    /// Apply file-level configuration onto settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref target) = self.target {
            settings.data_dir = PathBuf::from(target);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(limit) = self.per_source_limit {
            settings.per_source_limit = limit;
        }
        if let Some(ref llm) = self.llm {
            settings.llm = llm.clone();
        }
    }
}

/// Read credentials from the environment (after dotenvy has loaded `.env`).
fn credentials_from_env() -> SourceCredentials {
    SourceCredentials {
        superjob_api_key: env::var("GWORK_SUPERJOB_API_KEY").ok(),
        habr_client_id: env::var("GWORK_HABR_CLIENT_ID").ok(),
        habr_client_secret: env::var("GWORK_HABR_CLIENT_SECRET").ok(),
    }
}

/// Load settings: defaults, then config file, then environment.
pub fn load_settings(config_path: Option<&PathBuf>) -> Settings {
    // Best-effort .env loading; absence is normal.
    let _ = dotenvy::dotenv();

    let mut settings = Settings::default();
    Config::load(config_path).apply_to_settings(&mut settings);
    settings.credentials = credentials_from_env();

    if settings.llm.api_key.is_none() {
        settings.llm.api_key = env::var("DEEPSEEK_API_KEY").ok();
    }
    if settings.llm.api_key.is_some() && !settings.llm.enabled {
        settings.llm.enabled = true;
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_point_at_gwork_db() {
        let settings = Settings::default();
        assert_eq!(settings.database_filename, "gwork.db");
        assert!(settings.database_path().ends_with("gwork/gwork.db"));
    }

    #[test]
    fn config_file_overrides_apply() {
        let toml_text = r#"
            target = "/tmp/gwork-test"
            database = "other.db"
            request_timeout = 10
            per_source_limit = 8
        "#;
        let config: Config = toml::from_str(toml_text).unwrap();
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings);

        assert_eq!(settings.data_dir, PathBuf::from("/tmp/gwork-test"));
        assert_eq!(settings.database_filename, "other.db");
        assert_eq!(settings.request_timeout, 10);
        assert_eq!(settings.per_source_limit, 8);
    }

    #[test]
    fn empty_config_keeps_defaults() {
        let config: Config = toml::from_str("").unwrap();
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings);
        assert_eq!(settings.per_source_limit, 4);
    }
}
