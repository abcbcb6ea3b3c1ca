mod mysqldump;

pub use mysqldump::MysqldumpExecutor;

use crate::config::DatabaseTarget;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// One local dump file produced for a single database.
#[derive(Debug, Clone)]
pub struct BackupArtifact {
    pub database: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}
#[async_trait]
pub trait DumpExecutor: Send + Sync {
    /// Dumps one database into `dest_dir`, returning the produced artifact.
    async fn dump(&self, target: &DatabaseTarget, dest_dir: &Path) -> Result<BackupArtifact>;
    fn tool_name(&self) -> &'static str;
}

/// Builds the artifact file name: `{database}_{timestamp}.sql`, with the
/// timestamp reduced to filesystem-safe characters (no colons or separators).
pub fn artifact_filename(database: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "{}_{}.sql",
        database,
        timestamp.format("%Y_%m_%dT%H_%M_%S_%3fZ")
    )
}
