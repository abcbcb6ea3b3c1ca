use super::{RemoteFolderRef, RemoteStore};
use crate::error::Result;
use tracing::{debug, info, warn};

/// Find-or-create resolution of the destination folder.
///
/// One resolver instance lives for one batch run; after the first successful
/// resolution every later call answers from the cache without touching the
/// remote service.
pub struct FolderResolver {
    folder_name: String,
    owner_email: Option<String>,
    cached: Option<RemoteFolderRef>,
}

impl FolderResolver {
    pub fn new(folder_name: impl Into<String>, owner_email: Option<String>) -> Self {
        Self {
            folder_name: folder_name.into(),
            owner_email,
            cached: None,
        }
    }

    pub async fn resolve(&mut self, store: &dyn RemoteStore) -> Result<RemoteFolderRef> {
        if let Some(cached) = &self.cached {
            return Ok(cached.clone());
        }

        let matches = store.list_folders(&self.folder_name).await?;

        let id = match matches.first() {
            Some(folder) => {
                if matches.len() > 1 {
                    // Pre-existing ambiguous state: first result wins.
                    warn!(
                        "{} folders named '{}' exist, using {}",
                        matches.len(),
                        self.folder_name,
                        folder.id
                    );
                }
                debug!("Found existing folder '{}' ({})", folder.name, folder.id);
                folder.id.clone()
            }
            None => {
                info!("Creating remote folder: {}", self.folder_name);
                let id = store.create_folder(&self.folder_name).await?;
                if let Some(email) = &self.owner_email {
                    // The folder exists and is usable even if the grant
                    // fails, so a grant failure never fails resolution.
                    if let Err(e) = store.grant_writer(&id, email).await {
                        warn!("Permission grant on new folder {} failed: {}", id, e);
                    }
                }
                id
            }
        };

        let resolved = RemoteFolderRef {
            name: self.folder_name.clone(),
            id,
        };
        self.cached = Some(resolved.clone());
        Ok(resolved)
    }
}
