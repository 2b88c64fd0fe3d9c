use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1-0528-qwen3-8b:free";

/// Application configuration, loaded from `~/.confab/config.toml` and merged
/// with the `OPENROUTER_API_KEY` environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bearer credential for OpenRouter. The environment variable wins over
    /// an absent config entry; merging happens once at load time.
    pub api_key: Option<String>,

    /// Model identifier sent with every request
    pub model: String,

    /// Chat-completions endpoint prefix
    pub base_url: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Reply length cap
    pub max_tokens: u32,

    /// How many prior turns accompany each request
    pub history_window: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: OPENROUTER_BASE_URL.to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            history_window: 10,
        }
    }
}

impl Config {
    /// Load configuration from file, then fill the API key from the
    /// environment if the file didn't provide one.
    pub fn load() -> Result<Self> {
        let config_path = Self::path()?;

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            toml::from_str(&content)
                .context("Failed to parse config file")?
        } else {
            Config::default()
        };

        if config.api_key.is_none() {
            config.api_key = std::env::var("OPENROUTER_API_KEY").ok();
        }

        Ok(config)
    }

    /// Save configuration to `~/.confab/config.toml`.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::path()?;
        if let Some(dir) = config_path.parent() {
            fs::create_dir_all(dir).context("Failed to create .confab directory")?;
        }
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .context("Failed to write config file")?;
        Ok(())
    }

    /// Check whether a credential is available. Detected before any network
    /// call is made.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Location of the config file
    pub fn path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".confab").join("config.toml"))
    }
}
