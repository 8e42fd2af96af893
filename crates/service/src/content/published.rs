use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::content::PublishedFiles;
use crate::errors::ServiceError;

/// Plain `GET {base}/{path}` against the published site, no credential.
#[derive(Clone)]
pub struct HttpPublished {
    http: Client,
    base_url: String,
}

impl HttpPublished {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Transport { status: None, message: e.to_string() })?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl PublishedFiles for HttpPublished {
    async fn fetch(&self, path: &str) -> Result<String, ServiceError> {
        let url = self.url_for(path);
        // published copies can lag behind the repository; never take a cached one
        let resp = self
            .http
            .get(&url)
            .header("Cache-Control", "no-cache")
            .send()
            .await
            .map_err(|e| ServiceError::Transport { status: None, message: e.to_string() })?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(url));
        }
        if !status.is_success() {
            return Err(ServiceError::Transport {
                status: Some(status.as_u16()),
                message: format!("GET {url}"),
            });
        }
        let text = resp
            .text()
            .await
            .map_err(|e| ServiceError::Transport { status: None, message: e.to_string() })?;
        debug!(%url, bytes = text.len(), "published file fetched");
        Ok(text)
    }
}

/// The published site as served from a local checkout: reads `<site_dir>/<path>`.
#[derive(Clone, Debug)]
pub struct SiteDirPublished {
    root: PathBuf,
}

impl SiteDirPublished {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl PublishedFiles for SiteDirPublished {
    async fn fetch(&self, path: &str) -> Result<String, ServiceError> {
        let rel = Path::new(path.trim_start_matches('/'));
        if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(ServiceError::Validation(format!("path '{path}' is not allowed")));
        }
        let full = self.root.join(rel);
        match tokio::fs::read_to_string(&full).await {
            Ok(text) => {
                debug!(path = %full.display(), bytes = text.len(), "published file read from site dir");
                Ok(text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ServiceError::NotFound(full.display().to_string()))
            }
            Err(e) => Err(ServiceError::storage(e)),
        }
    }
}
