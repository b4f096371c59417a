use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "watchdesk.toml";
const CONFIG_PATH_ENV: &str = "WATCHDESK_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_host: String,
    pub api_port: u16,
    /// Origin port of the admin dashboard, for CORS.
    pub dashboard_port: u16,
    pub db_path: PathBuf,
    /// Six-field cron expression driving the HITL expiry sweep.
    pub sweep_cron: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_host: "127.0.0.1".to_string(),
            api_port: 8310,
            dashboard_port: 3000,
            db_path: PathBuf::from("data/watchdesk.db"),
            sweep_cron: "0 */10 * * * *".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads the TOML config named by `WATCHDESK_CONFIG` (falling back to
    /// `watchdesk.toml` in the working directory). A missing file means
    /// defaults; a malformed file is an error.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }
}
