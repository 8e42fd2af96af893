//! Runtime environment helpers
//!
//! Thin wrapper around `common::env` so the server crate can prepare its
//! directories without depending on `common` for it.

/// Ensure the data directory exists; warn when the site checkout is missing.
pub async fn ensure_env(site_dir: &str, data_dir: &str) -> anyhow::Result<()> {
    common::env::ensure_env(site_dir, data_dir).await
}
