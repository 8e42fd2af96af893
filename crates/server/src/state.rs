use std::collections::HashMap;
use std::sync::Arc;

use configs::AppConfig;
use service::content::{ContentStore, PublishedFiles};
use service::csv::{CsvPublisher, GitPublisher, LocalCsvStore};
use service::embed::ResizerVariant;
use service::retry::RetryPolicy;
use service::storage::{TokenStore, VersionCache};
use service::versions::{ChartContext, LoadSource, TracingObserver, VersionStore};
use tracing::{info, warn};

use crate::errors::ApiError;

/// Everything the handlers share; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub charts: Arc<HashMap<String, Arc<VersionStore>>>,
    pub tokens: Arc<TokenStore>,
    pub cache: Arc<VersionCache>,
    pub published: Arc<dyn PublishedFiles>,
    pub csv: Arc<CsvPublisher>,
    pub local_csv: LocalCsvStore,
    pub git: GitPublisher,
    pub embed_variant: ResizerVariant,
}

impl AppState {
    /// Wire one version store per configured chart over the given remote.
    pub fn build(
        cfg: &AppConfig,
        remote: Arc<dyn ContentStore>,
        published: Arc<dyn PublishedFiles>,
        cache: Arc<VersionCache>,
        tokens: Arc<TokenStore>,
    ) -> Self {
        let retry = RetryPolicy::from_config(&cfg.sync.retry);
        info!(enabled = retry.is_enabled(), max_attempts = retry.max_attempts(), "conflict retry policy");
        let charts = cfg
            .charts
            .iter()
            .map(|chart| {
                let store = VersionStore::new(ChartContext::from_config(chart, &cfg.site), remote.clone(), cache.clone())
                    .with_retry(retry.clone())
                    .with_observer(Arc::new(TracingObserver));
                (chart.key.clone(), Arc::new(store))
            })
            .collect::<HashMap<_, _>>();

        Self {
            charts: Arc::new(charts),
            tokens,
            cache,
            published,
            csv: Arc::new(CsvPublisher::new(remote)),
            local_csv: LocalCsvStore::new(&cfg.storage.site_dir),
            git: GitPublisher::new(&cfg.storage.site_dir),
            embed_variant: cfg.embed.variant.parse().unwrap_or_default(),
        }
    }

    pub fn chart(&self, key: &str) -> Result<Arc<VersionStore>, ApiError> {
        self.charts
            .get(key)
            .cloned()
            .ok_or_else(|| ApiError::UnknownChart(key.to_string()))
    }

    /// Bootstrap every chart from the published site, forgetting cached
    /// charts that are no longer configured.
    pub async fn load_all(&self) {
        let keep: Vec<&str> = self.charts.keys().map(String::as_str).collect();
        if let Err(e) = self.cache.prune(&keep).await {
            warn!(error = %e, "could not prune version cache");
        }
        for (key, store) in self.charts.iter() {
            let source: LoadSource = store.load_versions(&*self.published).await;
            info!(chart = %key, ?source, "chart bootstrapped");
        }
    }
}
