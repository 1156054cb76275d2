use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// API key for the news search service. The NEWSFLOW_API_KEY
    /// environment variable takes precedence when set.
    pub api_key: Option<String>,

    /// Webhook endpoint for failure alerts. Alerts are logged only
    /// when unset.
    pub alert_webhook_url: Option<String>,

    /// Taxonomy categories combined with boolean AND in every query.
    #[serde(default = "default_category_uris")]
    pub category_uris: Vec<String>,

    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_hours: u32,

    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("newsflow");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("news.db").to_string_lossy().to_string()
}

fn default_category_uris() -> Vec<String> {
    vec![
        "dmoz/Computers/Artificial_Intelligence".to_string(),
        "dmoz/Business/Marketing_and_Advertising".to_string(),
    ]
}

fn default_fetch_interval() -> u32 {
    6
}

fn default_monitor_interval() -> u64 {
    3600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            api_key: None,
            alert_webhook_url: None,
            category_uris: default_category_uris(),
            fetch_interval_hours: default_fetch_interval(),
            monitor_interval_secs: default_monitor_interval(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        if let Ok(key) = std::env::var("NEWSFLOW_API_KEY") {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("newsflow")
            .join("config.toml")
    }
}
