use std::{path::PathBuf, sync::Arc};

use tracing::debug;

use crate::errors::ServiceError;
use crate::storage::json_map_store::JsonMapStore;
use crate::versions::model::StoreFile;

/// Last known version mapping per chart type, used when the published file
/// cannot be read. Overwritten after every successful remote read or write.
pub struct VersionCache {
    store: Arc<JsonMapStore<StoreFile>>,
}

impl VersionCache {
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, ServiceError> {
        let store = JsonMapStore::open(path).await?;
        Ok(Arc::new(Self { store }))
    }

    pub async fn load(&self, chart: &str) -> Option<StoreFile> {
        self.store.get(chart).await
    }

    pub async fn replace(&self, chart: &str, file: &StoreFile) -> Result<(), ServiceError> {
        debug!(chart, versions = file.versions.len(), "version cache replaced");
        self.store.put(chart, file.clone()).await
    }

    /// Drop entries for charts not in `keep`; returns the dropped keys.
    pub async fn prune(&self, keep: &[&str]) -> Result<Vec<String>, ServiceError> {
        let mut dropped = Vec::new();
        for key in self.store.keys().await {
            if !keep.contains(&key.as_str()) && self.store.remove(&key).await? {
                dropped.push(key);
            }
        }
        if !dropped.is_empty() {
            debug!(?dropped, "stale charts dropped from version cache");
        }
        Ok(dropped)
    }
}
