mod drive;
mod resolver;

pub use drive::DriveClient;
pub use resolver::FolderResolver;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// A folder as reported by the remote storage service.
#[derive(Debug, Clone)]
pub struct RemoteFolder {
    pub id: String,
    pub name: String,
}

/// A resolved destination folder, cached for the lifetime of one batch run.
#[derive(Debug, Clone)]
pub struct RemoteFolderRef {
    pub name: String,
    pub id: String,
}
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Lists folders whose name matches exactly.
    async fn list_folders(&self, name: &str) -> Result<Vec<RemoteFolder>>;
    /// Creates a folder and returns its identifier.
    async fn create_folder(&self, name: &str) -> Result<String>;
    /// Grants write access on a folder to an email principal, without
    /// sending a notification.
    async fn grant_writer(&self, folder_id: &str, email: &str) -> Result<()>;
    /// Uploads a local file into a folder and returns the remote object id.
    async fn upload_file(&self, local_path: &Path, file_name: &str, folder_id: &str)
        -> Result<String>;
    fn name(&self) -> &'static str;
}
