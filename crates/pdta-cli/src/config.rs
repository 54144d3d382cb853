//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration for pdta-assist
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model to use
    pub model: Option<String>,
    /// Whether replies are streamed by default
    pub streaming: Option<bool>,
    /// Whether to use TUI mode by default
    pub tui: Option<bool>,
    /// Color theme ("dark" or "light")
    pub theme: Option<String>,
    /// Deadline for each runtime call, in seconds
    pub request_timeout_secs: Option<u64>,
    /// Alternative OpenAI-compatible endpoint
    pub base_url: Option<String>,
    /// API key (alternative to the OPENAI_API_KEY environment variable)
    pub api_key: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pdta-assist")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        // PDTA_ASSIST_CONFIG_PATH overrides the default location
        if let Ok(path) = std::env::var("PDTA_ASSIST_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            model: Some(pdta_agent::session::DEFAULT_MODEL.to_string()),
            streaming: Some(true),
            tui: Some(true),
            theme: Some("dark".to_string()),
            request_timeout_secs: Some(120),
            base_url: None,
            api_key: None,
        };

        default_config.save()?;
        Ok(path)
    }

    /// Get the API key, checking config then environment
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.trim().is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# pdta-assist configuration file
# Place at ~/.config/pdta-assist/config.toml (Linux/Mac)
# or %APPDATA%\pdta-assist\config.toml (Windows)

# Model to use
model = "gpt-4o-mini"

# Stream replies fragment by fragment (toggle at runtime with Ctrl+T)
streaming = true

# Whether to use TUI mode by default (true by default)
# Set to false for simple stdin/stdout mode
tui = true

# Color theme: "dark" or "light"
theme = "dark"

# Deadline for each call to the remote runtime, in seconds
request_timeout_secs = 120

# Alternative OpenAI-compatible endpoint (optional)
# base_url = "https://api.openai.com/v1"

# API key (optional - the OPENAI_API_KEY environment variable is
# recommended instead for security)
# api_key = "sk-..."
"#
}
