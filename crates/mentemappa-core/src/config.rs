//! Configuration management for mentemappa.
//!
//! Loads configuration from ${MENTEMAPPA_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::session::{DEFAULT_MODEL, DEFAULT_TEMPERATURE, SessionSettings};
use crate::prompts::MINDMAP_SYSTEM_PROMPT;
use crate::render::Viewport;

pub mod paths {
    //! Path resolution for mentemappa configuration and data directories.
    //!
    //! MENTEMAPPA_HOME resolution order:
    //! 1. MENTEMAPPA_HOME environment variable (if set)
    //! 2. ~/.config/mentemappa (default)

    use std::path::PathBuf;

    pub const HOME_ENV: &str = "MENTEMAPPA_HOME";

    /// Returns the mentemappa home directory.
    pub fn mentemappa_home() -> PathBuf {
        if let Ok(home) = std::env::var(HOME_ENV) {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".mentemappa"),
            |h| h.join(".config").join("mentemappa"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        mentemappa_home().join("config.toml")
    }

    /// Returns the directory holding log files.
    pub fn logs_dir() -> PathBuf {
        mentemappa_home().join("logs")
    }
}

fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Drawing surface used for fitting and exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        let viewport = Viewport::default();
        Self {
            width: viewport.width,
            height: viewport.height,
        }
    }
}

impl From<ViewportConfig> for Viewport {
    fn from(config: ViewportConfig) -> Self {
        Viewport::new(config.width.max(1), config.height.max(1))
    }
}

/// Export destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory that receives `mappa_mentale.*` files.
    pub out_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
        }
    }
}

/// Gemini provider settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiProviderConfig {
    /// API key (falls back to `GEMINI_API_KEY`).
    pub api_key: Option<String>,
    /// Base URL override (`GEMINI_BASE_URL` wins over this).
    pub base_url: Option<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gemini model used for every exchange
    pub model: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Optional cap on reply length
    pub max_output_tokens: Option<u32>,
    /// Replaces the built-in mind-map preamble when set
    pub system_prompt: Option<String>,
    pub viewport: ViewportConfig,
    pub export: ExportConfig,
    pub gemini: GeminiProviderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: None,
            system_prompt: None,
            viewport: ViewportConfig::default(),
            export: ExportConfig::default(),
            gemini: GeminiProviderConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the default path.
    /// Returns defaults if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    ///
    /// # Errors
    /// Returns an error if the file exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Session settings derived from this config.
    pub fn session_settings(&self) -> SessionSettings {
        let system_prompt = self
            .system_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| MINDMAP_SYSTEM_PROMPT.trim());

        SessionSettings {
            model: self.model.clone(),
            temperature: self.temperature,
            system_prompt: system_prompt.to_string(),
            max_output_tokens: self.max_output_tokens,
        }
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}
