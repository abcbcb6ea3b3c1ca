use super::{artifact_filename, BackupArtifact, DumpExecutor};
use crate::config::DatabaseTarget;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

/// Runs the external `mysqldump` binary for one database.
pub struct MysqldumpExecutor {
    binary: String,
}

impl MysqldumpExecutor {
    pub fn new() -> Self {
        Self {
            binary: "mysqldump".to_string(),
        }
    }

    #[cfg(test)]
    fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for MysqldumpExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DumpExecutor for MysqldumpExecutor {
    async fn dump(&self, target: &DatabaseTarget, dest_dir: &Path) -> Result<BackupArtifact> {
        fs::create_dir_all(dest_dir)?;

        let created_at = Utc::now();
        let file_name = artifact_filename(&target.name, created_at);
        let dump_path = dest_dir.join(&file_name);

        info!(
            "Dumping database '{}' from {}:{} to {}",
            target.name,
            target.host,
            target.port,
            dump_path.display()
        );

        // The password goes through MYSQL_PWD so it never shows up in the
        // process argument list.
        let output = Command::new(&self.binary)
            .arg("--host")
            .arg(&target.host)
            .arg("--port")
            .arg(target.port.to_string())
            .arg("--user")
            .arg(&target.username)
            .arg("--result-file")
            .arg(&dump_path)
            .arg(&target.name)
            .env("MYSQL_PWD", &target.password)
            .output()
            .await
            .map_err(|e| {
                BackupError::Dump(format!("Failed to launch {}: {}", self.binary, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // mysqldump may leave a partial file behind on failure.
            let _ = fs::remove_file(&dump_path);
            return Err(BackupError::Dump(format!(
                "{} exited with {} for database '{}': {}",
                self.binary,
                output.status,
                target.name,
                stderr.trim()
            )));
        }

        if !dump_path.exists() {
            return Err(BackupError::Dump(format!(
                "{} reported success but no dump file exists at {}",
                self.binary,
                dump_path.display()
            )));
        }

        debug!("Dump of '{}' completed: {}", target.name, file_name);
        Ok(BackupArtifact {
            database: target.name.clone(),
            path: dump_path,
            created_at,
        })
    }

    fn tool_name(&self) -> &'static str {
        "mysqldump"
    }
}
