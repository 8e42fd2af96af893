use std::{path::PathBuf, sync::Arc};

use tracing::info;

use crate::credentials::Credential;
use crate::errors::ServiceError;
use crate::storage::json_map_store::JsonMapStore;

const TOKEN_KEY: &str = "github_token";

/// Persists the pasted access token and keeps the live [`Credential`] in step.
pub struct TokenStore {
    settings: Arc<JsonMapStore<String>>,
    credential: Credential,
}

impl TokenStore {
    /// Open the settings file. A saved token wins over `seed` (from config/env).
    pub async fn open<P: Into<PathBuf>>(path: P, seed: Option<String>) -> Result<Arc<Self>, ServiceError> {
        let settings = JsonMapStore::<String>::open(path).await?;
        let saved = settings.get(TOKEN_KEY).await;
        let credential = Credential::new(saved.or(seed));
        Ok(Arc::new(Self { settings, credential }))
    }

    pub fn credential(&self) -> Credential {
        self.credential.clone()
    }

    pub async fn set(&self, token: &str) -> Result<(), ServiceError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ServiceError::Validation("token must not be empty".into()));
        }
        self.settings.put(TOKEN_KEY, token.to_string()).await?;
        self.credential.set(Some(token.to_string()));
        info!("access token updated");
        Ok(())
    }

    /// Forget the saved token; returns whether one was saved.
    pub async fn clear(&self) -> Result<bool, ServiceError> {
        let existed = self.settings.remove(TOKEN_KEY).await?;
        self.credential.set(None);
        info!(existed, "access token cleared");
        Ok(existed)
    }
}
