use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Result, StudioError};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_top_keywords")]
    pub top_keywords: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_attempts: default_max_attempts(),
            user_agent: default_user_agent(),
            cache_capacity: default_cache_capacity(),
            top_keywords: default_top_keywords(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    15
}

fn default_max_attempts() -> u32 {
    3
}

fn default_user_agent() -> String {
    format!("archetype-studio/{}", env!("CARGO_PKG_VERSION"))
}

fn default_cache_capacity() -> usize {
    64
}

fn default_top_keywords() -> usize {
    25
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_alpha() -> f64 {
    0.3
}

fn default_history_limit() -> usize {
    500
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StorageConfig {
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    pub openai: Option<OpenAiConfig>,
    pub server: Option<ServerConfig>,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub storage: Option<StorageConfig>,
}

impl Config {
    pub fn convention_defaults(db_path: &str) -> Self {
        Self {
            openai: Some(OpenAiConfig {
                api_key: None,
                model: Some("gpt-4.1-mini".to_string()),
                base_url: Some("https://api.openai.com/v1".to_string()),
            }),
            server: Some(ServerConfig {
                host: Some("127.0.0.1".to_string()),
                port: Some(7979),
                token: None,
            }),
            scraper: ScraperConfig::default(),
            metrics: MetricsConfig::default(),
            storage: Some(StorageConfig {
                sqlite_path: Some(db_path.to_string()),
            }),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            StudioError::Config(format!("failed to read {}: {e}", path.to_string_lossy()))
        })?;
        let config: Config =
            serde_json::from_str(&raw).map_err(|e| StudioError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise falls back to
    /// [`Config::convention_defaults`]. Environment overrides apply either way.
    pub fn load_or_default(path: Option<&str>, db_path: &str) -> Result<Self> {
        let config = match path {
            Some(path) if Path::new(path).exists() => Self::from_file(path)?,
            Some(path) => {
                tracing::warn!("Config file {} not found; using defaults", path);
                Self::convention_defaults(db_path)
            }
            None => Self::convention_defaults(db_path),
        };
        Ok(config.apply_env_overrides())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StudioError::Config(e.to_string()))?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw).map_err(|e| StudioError::Config(e.to_string()))
    }

    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(key) = crate::vault::env_secret(crate::vault::OPENAI_KEY_ENV) {
            let openai = self.openai.get_or_insert_with(OpenAiConfig::default);
            if openai.api_key.is_none() {
                openai.api_key = Some(key);
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.metrics.alpha > 0.0 && self.metrics.alpha <= 1.0) {
            return Err(StudioError::Config(format!(
                "metrics.alpha must be in (0, 1], got {}",
                self.metrics.alpha
            )));
        }
        if self.scraper.max_attempts == 0 {
            return Err(StudioError::Config(
                "scraper.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sqlite_path(&self) -> String {
        self.storage
            .as_ref()
            .and_then(|storage| storage.sqlite_path.as_deref())
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty())
            .unwrap_or_else(crate::runtime_paths::default_db_path)
    }

    pub fn openai_api_key(&self) -> Option<String> {
        self.openai
            .as_ref()
            .and_then(|openai| openai.api_key.clone())
            .filter(|key| !key.trim().is_empty())
    }
}
