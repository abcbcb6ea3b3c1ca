use serde::{Deserialize, Serialize};
use std::path::PathBuf;
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseTarget {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Default for DatabaseTarget {
    fn default() -> Self {
        Self {
            name: String::new(),
            host: "localhost".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: String::new(),
        }
    }
}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    pub access_token: String,
    pub folder_name: String,
    #[serde(default)]
    pub owner_email: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://www.googleapis.com".to_string()
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            folder_name: "backups".to_string(),
            owner_email: None,
            api_base: default_api_base(),
        }
    }
}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub enabled: bool,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3000,
            username: String::new(),
            password: String::new(),
        }
    }
}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub databases: Vec<DatabaseTarget>,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default = "default_schedule")]
    pub schedule: String,
    #[serde(default = "default_backup_dir")]
    pub local_backup_dir: PathBuf,
}

fn default_schedule() -> String {
    "0 2 * * *".to_string()
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            databases: Vec::new(),
            drive: DriveConfig::default(),
            web: WebConfig::default(),
            schedule: default_schedule(),
            local_backup_dir: default_backup_dir(),
        }
    }
}
