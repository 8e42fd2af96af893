use std::{future::Future, net::SocketAddr, path::Path, sync::Arc, time::Duration};

use axum::Router;
use configs::AppConfig;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::errors::StartupError;
use crate::routes;
use crate::state::AppState;
use service::{
    content::{GithubContents, HttpPublished, PublishedFiles, SiteDirPublished},
    runtime,
    storage::{TokenStore, VersionCache},
};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(cfg: &AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("bind address: {e}")))
}

/// Where the unauthenticated bootstrap read goes: the configured published
/// site, or the local checkout that this server also serves.
fn published_source(cfg: &AppConfig) -> Result<Arc<dyn PublishedFiles>, StartupError> {
    match cfg.site.published_base() {
        Some(base) => {
            let timeout = Duration::from_secs(cfg.github.request_timeout_secs);
            info!(%base, "bootstrapping versions from published site");
            let published: Arc<dyn PublishedFiles> = Arc::new(HttpPublished::new(base, timeout)?);
            Ok(published)
        }
        None => {
            info!(site_dir = %cfg.storage.site_dir, "bootstrapping versions from site directory");
            let published: Arc<dyn PublishedFiles> = Arc::new(SiteDirPublished::new(&cfg.storage.site_dir));
            Ok(published)
        }
    }
}

/// Wire the stores over the real contents API and the published site.
pub async fn build_app(cfg: &AppConfig) -> Result<(AppState, Router), StartupError> {
    let data_dir = Path::new(&cfg.storage.data_dir);
    let cache = VersionCache::open(data_dir.join("version_cache.json")).await?;
    let tokens = TokenStore::open(data_dir.join("settings.json"), cfg.github.token.clone()).await?;
    if !tokens.credential().is_configured() {
        warn!("no access token configured; saving is disabled until one is set");
    }

    let remote = Arc::new(GithubContents::new(&cfg.github, tokens.credential())?);
    let published = published_source(cfg)?;

    let state = AppState::build(cfg, remote, published, cache, tokens);
    let app = routes::build_router(state.clone(), &cfg.storage.site_dir, build_cors());
    Ok((state, app))
}

/// Serve `cfg` until `shutdown` resolves.
pub async fn run<S>(cfg: AppConfig, shutdown: S) -> anyhow::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    runtime::ensure_env(&cfg.storage.site_dir, &cfg.storage.data_dir).await?;

    let (state, app) = build_app(&cfg).await?;
    let addr = bind_addr(&cfg)?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    state.load_all().await;

    info!(%addr, charts = cfg.charts.len(), repo = %format!("{}/{}", cfg.github.owner, cfg.github.repo), "serving");
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    info!("server stopped");
    Ok(())
}
