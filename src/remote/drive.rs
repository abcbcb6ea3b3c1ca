use super::{RemoteFolder, RemoteStore};
use crate::config::DriveConfig;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const SQL_MIME_TYPE: &str = "application/sql";

pub struct DriveClient {
    config: DriveConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct CreateFolder {
    name: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

#[derive(Debug, Serialize)]
struct CreatePermission {
    role: String,
    #[serde(rename = "type")]
    grantee_type: String,
    #[serde(rename = "emailAddress")]
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

impl DriveClient {
    pub fn new(config: &DriveConfig) -> Self {
        let client = Client::builder()
            .user_agent("mysql-drive-backup/1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config: config.clone(),
            client,
        }
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.config.access_token)
    }

    async fn error_text(response: reqwest::Response) -> String {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        format!("{} - {}", status, text)
    }
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn list_folders(&self, name: &str) -> Result<Vec<RemoteFolder>> {
        let url = format!("{}/drive/v3/files", self.config.api_base);
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            name.replace('\'', "\\'"),
            FOLDER_MIME_TYPE
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .query(&[("q", query.as_str()), ("fields", "files(id, name)")])
            .send()
            .await
            .map_err(|e| BackupError::Resolve(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackupError::Resolve(format!(
                "Failed to list folders named '{}': {}",
                name,
                Self::error_text(response).await
            )));
        }

        let list: FileList = response
            .json()
            .await
            .map_err(|e| BackupError::Resolve(e.to_string()))?;

        debug!("Found {} folder(s) named '{}'", list.files.len(), name);
        Ok(list
            .files
            .into_iter()
            .map(|f| RemoteFolder {
                id: f.id,
                name: f.name,
            })
            .collect())
    }

    async fn create_folder(&self, name: &str) -> Result<String> {
        let url = format!("{}/drive/v3/files", self.config.api_base);
        let body = CreateFolder {
            name: name.to_string(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .query(&[("fields", "id")])
            .json(&body)
            .send()
            .await
            .map_err(|e| BackupError::Resolve(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackupError::Resolve(format!(
                "Failed to create folder '{}': {}",
                name,
                Self::error_text(response).await
            )));
        }

        let created: CreatedFile = response
            .json()
            .await
            .map_err(|e| BackupError::Resolve(e.to_string()))?;

        info!("Created remote folder '{}' ({})", name, created.id);
        Ok(created.id)
    }

    async fn grant_writer(&self, folder_id: &str, email: &str) -> Result<()> {
        let url = format!(
            "{}/drive/v3/files/{}/permissions",
            self.config.api_base, folder_id
        );
        let body = CreatePermission {
            role: "writer".to_string(),
            grantee_type: "user".to_string(),
            email_address: email.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .query(&[("sendNotificationEmail", "false")])
            .json(&body)
            .send()
            .await
            .map_err(|e| BackupError::Permission(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackupError::Permission(format!(
                "Failed to grant writer access on folder {} to {}: {}",
                folder_id,
                email,
                Self::error_text(response).await
            )));
        }

        info!("Granted writer access on folder {} to {}", folder_id, email);
        Ok(())
    }

    async fn upload_file(
        &self,
        local_path: &Path,
        file_name: &str,
        folder_id: &str,
    ) -> Result<String> {
        let url = format!("{}/upload/drive/v3/files", self.config.api_base);

        let mut file = File::open(local_path).await?;
        let mut file_bytes = Vec::new();
        file.read_to_end(&mut file_bytes).await?;

        let metadata = serde_json::json!({
            "name": file_name,
            "parents": [folder_id],
        });

        let metadata_part = Part::text(metadata.to_string()).mime_str("application/json")?;
        let media_part = Part::bytes(file_bytes)
            .file_name(file_name.to_string())
            .mime_str(SQL_MIME_TYPE)?;

        let form = Form::new()
            .part("metadata", metadata_part)
            .part("media", media_part);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackupError::Upload(format!(
                "Failed to upload '{}': {}",
                file_name,
                Self::error_text(response).await
            )));
        }

        let created: CreatedFile = response.json().await?;
        debug!("Uploaded '{}' as remote object {}", file_name, created.id);
        Ok(created.id)
    }

    fn name(&self) -> &'static str {
        "Google Drive"
    }
}
