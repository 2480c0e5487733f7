use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_YEAR;

/// Stored credentials plus the optional report-year override.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub backlog_url: Option<String>,
    pub api_key: Option<String>,
    pub year: Option<i32>,
}

impl AppConfig {
    pub fn year(&self) -> i32 {
        self.year.unwrap_or(DEFAULT_YEAR)
    }
}

fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".backlog-wrapped")
        .join("config.toml")
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&config_path())
}

fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig =
        toml::from_str(&contents).with_context(|| "Failed to parse config.toml")?;
    Ok(config)
}

/// Written back on every run trigger, matching the submit-then-fetch
/// behavior of the form this tool replaces.
pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to(config, &config_path())
}

fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    Ok(())
}
