mod types;

pub use types::*;

use crate::error::Result;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".mysql_drive_backup"))
        .unwrap_or_else(|| PathBuf::from(".mysql_drive_backup"))
}
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}
pub fn load() -> Result<AppConfig> {
    load_from(&config_path())
}
pub fn load_from(path: &PathBuf) -> Result<AppConfig> {
    if !path.exists() {
        debug!("Config file not found at {:?}, using defaults", path);
        return Ok(AppConfig::default());
    }

    info!("Loading configuration from {:?}", path);
    let contents = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&contents)?;
    Ok(config)
}
