use crate::config::{AppConfig, DatabaseTarget};
use crate::dump::{BackupArtifact, DumpExecutor};
use crate::error::Result;
use crate::remote::{FolderResolver, RemoteFolderRef, RemoteStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

const HISTORY_LIMIT: usize = 20;

/// Terminal classification of one database's pipeline execution.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackupOutcome {
    Succeeded { remote_id: String },
    DumpFailed { error: String },
    UploadFailed { error: String },
}

impl BackupOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BackupOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub database: String,
    #[serde(flatten)]
    pub outcome: BackupOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub duration_secs: u64,
    pub results: Vec<BackupReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Runs the dump-then-upload pipeline over the configured database targets.
///
/// Shared between the scheduler and the HTTP trigger; a run-in-progress flag
/// keeps overlapping triggers from starting a second batch.
pub struct BackupEngine {
    config: Arc<AppConfig>,
    dumper: Box<dyn DumpExecutor>,
    store: Box<dyn RemoteStore>,
    running: AtomicBool,
    history: RwLock<Vec<BatchReport>>,
}

impl BackupEngine {
    pub fn new(
        config: Arc<AppConfig>,
        dumper: Box<dyn DumpExecutor>,
        store: Box<dyn RemoteStore>,
    ) -> Self {
        Self {
            config,
            dumper,
            store,
            running: AtomicBool::new(false),
            history: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn last_batch(&self) -> Option<BatchReport> {
        self.history.read().await.first().cloned()
    }

    pub async fn history(&self) -> Vec<BatchReport> {
        self.history.read().await.clone()
    }

    /// Starts a batch run unless one is already in progress.
    ///
    /// Returns `None` when the overlap guard rejects the trigger.
    pub async fn try_run_batch(&self) -> Option<BatchReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("A batch run is already in progress, skipping this trigger");
            return None;
        }

        let report = self.run_batch().await;
        self.running.store(false, Ordering::SeqCst);

        let mut history = self.history.write().await;
        history.insert(0, report.clone());
        history.truncate(HISTORY_LIMIT);

        Some(report)
    }

    /// One full pass over the configured targets, in configured order.
    ///
    /// Failures are isolated per database; one failing target never stops
    /// the remaining ones.
    async fn run_batch(&self) -> BatchReport {
        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            "Starting backup batch for {} database(s) ({} -> {})",
            self.config.databases.len(),
            self.dumper.tool_name(),
            self.store.name()
        );

        // The destination folder is resolved once and reused across the run.
        let mut resolver = FolderResolver::new(
            self.config.drive.folder_name.clone(),
            self.config.drive.owner_email.clone(),
        );

        let mut results = Vec::with_capacity(self.config.databases.len());
        for target in &self.config.databases {
            let report = self.backup_target(target, &mut resolver).await;
            match &report.outcome {
                BackupOutcome::Succeeded { remote_id } => {
                    info!(
                        "Backup of '{}' succeeded, remote object {}",
                        report.database, remote_id
                    );
                }
                BackupOutcome::DumpFailed { error } => {
                    error!("Backup of '{}' failed during dump: {}", report.database, error);
                }
                BackupOutcome::UploadFailed { error } => {
                    error!(
                        "Backup of '{}' failed during upload, local dump kept: {}",
                        report.database, error
                    );
                }
            }
            results.push(report);
        }

        let report = BatchReport {
            started_at,
            duration_secs: start.elapsed().as_secs(),
            results,
        };

        info!(
            "Backup batch completed: {} succeeded, {} failed in {} second(s)",
            report.succeeded(),
            report.failed(),
            report.duration_secs
        );
        report
    }

    /// Dump, then resolve + publish. A failed dump short-circuits before any
    /// remote call is made; every collaborator error becomes a typed outcome
    /// here and never propagates past this boundary.
    async fn backup_target(
        &self,
        target: &DatabaseTarget,
        resolver: &mut FolderResolver,
    ) -> BackupReport {
        let artifact = match self
            .dumper
            .dump(target, &self.config.local_backup_dir)
            .await
        {
            Ok(artifact) => artifact,
            Err(e) => {
                return BackupReport {
                    database: target.name.clone(),
                    outcome: BackupOutcome::DumpFailed {
                        error: e.to_string(),
                    },
                }
            }
        };

        let folder = match resolver.resolve(self.store.as_ref()).await {
            Ok(folder) => folder,
            Err(e) => {
                // The dump stays on disk for manual recovery.
                return BackupReport {
                    database: target.name.clone(),
                    outcome: BackupOutcome::UploadFailed {
                        error: e.to_string(),
                    },
                };
            }
        };

        match self.publish(&artifact, &folder).await {
            Ok(remote_id) => BackupReport {
                database: target.name.clone(),
                outcome: BackupOutcome::Succeeded { remote_id },
            },
            Err(e) => BackupReport {
                database: target.name.clone(),
                outcome: BackupOutcome::UploadFailed {
                    error: e.to_string(),
                },
            },
        }
    }

    /// Uploads the artifact and, only on confirmed success, deletes the
    /// local file. No other component removes artifacts.
    async fn publish(&self, artifact: &BackupArtifact, folder: &RemoteFolderRef) -> Result<String> {
        let file_name = artifact
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}.sql", artifact.database));

        tracing::debug!(
            "Publishing '{}' (dumped at {}) into folder '{}' ({})",
            file_name,
            artifact.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            folder.name,
            folder.id
        );

        let remote_id = self
            .store
            .upload_file(&artifact.path, &file_name, &folder.id)
            .await?;

        if let Err(e) = fs::remove_file(&artifact.path) {
            warn!(
                "Uploaded '{}' but could not delete local file {}: {}",
                file_name,
                artifact.path.display(),
                e
            );
        }

        Ok(remote_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriveConfig;
    use crate::error::BackupError;
    use crate::remote::RemoteFolder;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    struct FakeDumper {
        fail_for: Vec<String>,
    }

    #[async_trait]
    impl DumpExecutor for FakeDumper {
        async fn dump(
            &self,
            target: &DatabaseTarget,
            dest_dir: &Path,
        ) -> crate::error::Result<BackupArtifact> {
            if self.fail_for.contains(&target.name) {
                return Err(BackupError::Dump(format!(
                    "mysqldump exited with exit status: 1 for database '{}': access denied",
                    target.name
                )));
            }
            fs::create_dir_all(dest_dir).unwrap();
            let path = dest_dir.join(format!("{}_dump.sql", target.name));
            fs::write(&path, "-- dump\n").unwrap();
            Ok(BackupArtifact {
                database: target.name.clone(),
                path,
                created_at: Utc::now(),
            })
        }

        fn tool_name(&self) -> &'static str {
            "fake-dump"
        }
    }

    #[derive(Clone, Default)]
    struct FakeStore {
        folder_exists: bool,
        fail_upload_for: Vec<String>,
        remove_local_on_upload: bool,
        remote_calls: Arc<AtomicUsize>,
        create_calls: Arc<AtomicUsize>,
        grant_calls: Arc<AtomicUsize>,
        uploaded: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl RemoteStore for FakeStore {
        async fn list_folders(&self, name: &str) -> crate::error::Result<Vec<RemoteFolder>> {
            self.remote_calls.fetch_add(1, Ordering::SeqCst);
            if self.folder_exists {
                Ok(vec![RemoteFolder {
                    id: "existing-folder".to_string(),
                    name: name.to_string(),
                }])
            } else {
                Ok(Vec::new())
            }
        }

        async fn create_folder(&self, _name: &str) -> crate::error::Result<String> {
            self.remote_calls.fetch_add(1, Ordering::SeqCst);
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            Ok("new-folder".to_string())
        }

        async fn grant_writer(&self, _folder_id: &str, _email: &str) -> crate::error::Result<()> {
            self.remote_calls.fetch_add(1, Ordering::SeqCst);
            self.grant_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn upload_file(
            &self,
            local_path: &Path,
            file_name: &str,
            _folder_id: &str,
        ) -> crate::error::Result<String> {
            self.remote_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_upload_for.iter().any(|db| file_name.starts_with(db)) {
                return Err(BackupError::Upload("quota exceeded".to_string()));
            }
            if self.remove_local_on_upload {
                fs::remove_file(local_path).unwrap();
            }
            self.uploaded.lock().unwrap().push(file_name.to_string());
            Ok("obj123".to_string())
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn target(name: &str) -> DatabaseTarget {
        DatabaseTarget {
            name: name.to_string(),
            host: "db1".to_string(),
            port: 3306,
            username: "u".to_string(),
            password: "p".to_string(),
        }
    }

    fn engine(
        backup_dir: PathBuf,
        databases: Vec<DatabaseTarget>,
        dumper: impl DumpExecutor + 'static,
        store: FakeStore,
    ) -> BackupEngine {
        let config = AppConfig {
            databases,
            drive: DriveConfig {
                access_token: "token".to_string(),
                folder_name: "backups".to_string(),
                owner_email: Some("ops@example.com".to_string()),
                api_base: String::new(),
            },
            local_backup_dir: backup_dir,
            ..Default::default()
        };
        BackupEngine::new(Arc::new(config), Box::new(dumper), Box::new(store))
    }

    #[tokio::test]
    async fn test_one_dump_failure_does_not_stop_the_batch() {
        let dir = TempDir::new().unwrap();
        let store = FakeStore {
            folder_exists: true,
            ..Default::default()
        };
        let engine = engine(
            dir.path().to_path_buf(),
            vec![target("a"), target("b"), target("c")],
            FakeDumper {
                fail_for: vec!["b".to_string()],
            },
            store,
        );

        let report = engine.try_run_batch().await.unwrap();

        assert_eq!(report.results.len(), 3);
        let names: Vec<&str> = report.results.iter().map(|r| r.database.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(report.results[0].outcome.is_success());
        assert!(matches!(
            report.results[1].outcome,
            BackupOutcome::DumpFailed { .. }
        ));
        assert!(report.results[2].outcome.is_success());
    }

    #[tokio::test]
    async fn test_local_file_deleted_on_success_kept_on_upload_failure() {
        let dir = TempDir::new().unwrap();
        let store = FakeStore {
            folder_exists: true,
            fail_upload_for: vec!["bad".to_string()],
            ..Default::default()
        };
        let engine = engine(
            dir.path().to_path_buf(),
            vec![target("good"), target("bad")],
            FakeDumper { fail_for: vec![] },
            store,
        );

        let report = engine.try_run_batch().await.unwrap();

        assert!(report.results[0].outcome.is_success());
        assert!(!dir.path().join("good_dump.sql").exists());

        assert!(matches!(
            report.results[1].outcome,
            BackupOutcome::UploadFailed { .. }
        ));
        assert!(dir.path().join("bad_dump.sql").exists());
    }

    #[tokio::test]
    async fn test_local_delete_failure_does_not_downgrade_success() {
        let dir = TempDir::new().unwrap();
        // The file disappears under us before cleanup runs; the upload is
        // still confirmed, so the outcome must stay Succeeded.
        let store = FakeStore {
            folder_exists: true,
            remove_local_on_upload: true,
            ..Default::default()
        };
        let engine = engine(
            dir.path().to_path_buf(),
            vec![target("orders")],
            FakeDumper { fail_for: vec![] },
            store,
        );

        let report = engine.try_run_batch().await.unwrap();

        match &report.results[0].outcome {
            BackupOutcome::Succeeded { remote_id } => assert_eq!(remote_id, "obj123"),
            other => panic!("expected Succeeded, got {:?}", other),
        }
        assert!(!dir.path().join("orders_dump.sql").exists());
    }

    #[tokio::test]
    async fn test_failed_dump_makes_no_remote_calls() {
        let dir = TempDir::new().unwrap();
        let store = FakeStore::default();
        let remote_calls = store.remote_calls.clone();
        let engine = engine(
            dir.path().to_path_buf(),
            vec![target("orders")],
            FakeDumper {
                fail_for: vec!["orders".to_string()],
            },
            store,
        );

        let report = engine.try_run_batch().await.unwrap();

        match &report.results[0].outcome {
            BackupOutcome::DumpFailed { error } => assert!(error.contains("access denied")),
            other => panic!("expected DumpFailed, got {:?}", other),
        }
        assert_eq!(remote_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_folder_is_created_with_grant_and_upload_succeeds() {
        let dir = TempDir::new().unwrap();
        let store = FakeStore::default();
        let create_calls = store.create_calls.clone();
        let grant_calls = store.grant_calls.clone();
        let uploaded = store.uploaded.clone();
        let engine = engine(
            dir.path().to_path_buf(),
            vec![target("orders")],
            FakeDumper { fail_for: vec![] },
            store,
        );

        let report = engine.try_run_batch().await.unwrap();

        match &report.results[0].outcome {
            BackupOutcome::Succeeded { remote_id } => assert_eq!(remote_id, "obj123"),
            other => panic!("expected Succeeded, got {:?}", other),
        }
        assert_eq!(create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(grant_calls.load(Ordering::SeqCst), 1);
        assert_eq!(uploaded.lock().unwrap().as_slice(), ["orders_dump.sql"]);
        assert!(!dir.path().join("orders_dump.sql").exists());
    }

    #[tokio::test]
    async fn test_folder_resolved_once_per_batch() {
        let dir = TempDir::new().unwrap();
        let store = FakeStore {
            folder_exists: true,
            ..Default::default()
        };
        let remote_calls = store.remote_calls.clone();
        let engine = engine(
            dir.path().to_path_buf(),
            vec![target("a"), target("b"), target("c")],
            FakeDumper { fail_for: vec![] },
            store,
        );

        engine.try_run_batch().await.unwrap();

        // One list call plus three uploads; no re-resolution per database.
        assert_eq!(remote_calls.load(Ordering::SeqCst), 4);
    }

    struct SlowDumper;

    #[async_trait]
    impl DumpExecutor for SlowDumper {
        async fn dump(
            &self,
            target: &DatabaseTarget,
            dest_dir: &Path,
        ) -> crate::error::Result<BackupArtifact> {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            fs::create_dir_all(dest_dir).unwrap();
            let path = dest_dir.join(format!("{}_dump.sql", target.name));
            fs::write(&path, "-- dump\n").unwrap();
            Ok(BackupArtifact {
                database: target.name.clone(),
                path,
                created_at: Utc::now(),
            })
        }

        fn tool_name(&self) -> &'static str {
            "slow-dump"
        }
    }

    #[tokio::test]
    async fn test_trigger_during_running_batch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(engine(
            dir.path().to_path_buf(),
            vec![target("orders")],
            SlowDumper,
            FakeStore {
                folder_exists: true,
                ..Default::default()
            },
        ));

        let first = tokio::spawn({
            let engine = engine.clone();
            async move { engine.try_run_batch().await }
        });

        // Let the first run get past the guard and into the slow dump.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(engine.try_run_batch().await.is_none());

        let report = first.await.unwrap().unwrap();
        assert_eq!(report.results.len(), 1);
        assert!(report.results[0].outcome.is_success());
        assert_eq!(engine.history().await.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_is_recorded_in_history() {
        let dir = TempDir::new().unwrap();
        let engine = engine(
            dir.path().to_path_buf(),
            vec![target("a")],
            FakeDumper { fail_for: vec![] },
            FakeStore {
                folder_exists: true,
                ..Default::default()
            },
        );

        assert!(engine.last_batch().await.is_none());
        engine.try_run_batch().await.unwrap();

        let last = engine.last_batch().await.unwrap();
        assert_eq!(last.results.len(), 1);
        assert_eq!(last.succeeded(), 1);
    }
}
