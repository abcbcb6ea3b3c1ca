use crate::backup::BackupEngine;
use crate::config::WebConfig;
use std::sync::Arc;

/// Shared state for the trigger endpoint: the engine plus optional HTTP
/// Basic credentials.
pub struct AppState {
    pub engine: Arc<BackupEngine>,
    credentials: Option<(String, String)>,
}

impl AppState {
    pub fn new(engine: Arc<BackupEngine>, web: &WebConfig) -> Arc<Self> {
        let credentials = if web.username.is_empty() {
            None
        } else {
            Some((web.username.clone(), web.password.clone()))
        };

        Arc::new(Self {
            engine,
            credentials,
        })
    }

    /// With no configured credentials the endpoint is open.
    pub fn check_credentials(&self, username: &str, password: &str) -> bool {
        match &self.credentials {
            Some((u, p)) => u == username && p == password,
            None => true,
        }
    }

    pub fn auth_required(&self) -> bool {
        self.credentials.is_some()
    }
}
