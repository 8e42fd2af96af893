//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

use tracing::warn;

/// Ensure the data directory exists; warn when the published site directory is missing.
pub async fn ensure_env(site_dir: &str, data_dir: &str) -> anyhow::Result<()> {
    if tokio::fs::metadata(site_dir).await.is_err() {
        warn!(%site_dir, "site directory not found; static charts and local CSV saves will fail");
    }
    tokio::fs::create_dir_all(data_dir)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {data_dir}: {e}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_env_creates_data_dir() -> anyhow::Result<()> {
        let root = std::env::temp_dir().join(format!("grafer_env_{}", uuid::Uuid::new_v4()));
        let data = root.join("data");
        ensure_env("/nonexistent-site-dir", data.to_str().unwrap_or_default()).await?;
        assert!(tokio::fs::metadata(&data).await?.is_dir());
        let _ = tokio::fs::remove_dir_all(&root).await;
        Ok(())
    }
}
