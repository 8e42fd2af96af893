use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use common::slug::{slug_candidate, unique_slug};
use configs::{ChartConfig, SiteConfig};

use crate::content::{ContentStore, PublishedFiles, VersionTag};
use crate::embed;
use crate::errors::ServiceError;
use crate::observability;
use crate::retry::RetryPolicy;
use crate::storage::VersionCache;
use crate::versions::model::{StoreFile, VersionRecord};

/// Where one chart type lives: its key, its page on the site and its store file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartContext {
    pub key: String,
    pub public_path: String,
    pub store_path: String,
    pub public_base_url: String,
}

impl ChartContext {
    pub fn from_config(chart: &ChartConfig, site: &SiteConfig) -> Self {
        Self {
            key: chart.key.clone(),
            public_path: chart.public_path(),
            store_path: chart.store_path(),
            public_base_url: site.public_base_url.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    FetchingLatest,
    Mutating,
    Writing,
    Synced,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionOp {
    Load,
    Save,
    Update,
    Rename,
    Delete,
}

impl VersionOp {
    pub fn as_str(self) -> &'static str {
        match self {
            VersionOp::Load => "load",
            VersionOp::Save => "save",
            VersionOp::Update => "update",
            VersionOp::Rename => "rename",
            VersionOp::Delete => "delete",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            VersionOp::Load => "Load",
            VersionOp::Save => "Save",
            VersionOp::Update => "Update",
            VersionOp::Rename => "Rename",
            VersionOp::Delete => "Delete",
        }
    }
}

/// Presentation hooks. Both methods default to no-ops.
pub trait VersionObserver: Send + Sync {
    fn phase_changed(&self, _chart: &str, _op: VersionOp, _phase: SyncPhase) {}
    fn versions_changed(&self, _chart: &str, _versions: &[VersionRecord]) {}
}

/// Observer that only logs.
pub struct TracingObserver;

impl VersionObserver for TracingObserver {
    fn phase_changed(&self, chart: &str, op: VersionOp, phase: SyncPhase) {
        debug!(chart, op = op.as_str(), ?phase, "sync phase");
    }

    fn versions_changed(&self, chart: &str, versions: &[VersionRecord]) {
        debug!(chart, count = versions.len(), "version list changed");
    }
}

/// Which source `load_versions` ended up using.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    Published,
    Cache,
    Empty,
}

/// Result of applying a change to a freshly fetched store file.
enum Mutation<T> {
    /// Persist the file; `name` is the version name for the commit message.
    Write { name: String, value: T },
    /// Nothing changed, skip the write.
    Unchanged(T),
}

/// Saved versions of one chart type, kept in step with the remote store file.
///
/// Every mutation re-reads the remote file, applies the change to that fresh
/// copy and writes it back with the tag just read. Mutations through one
/// store are serialized; a concurrent writer elsewhere shows up as
/// [`ServiceError::Conflict`].
pub struct VersionStore<C: ContentStore + ?Sized = dyn ContentStore> {
    chart: ChartContext,
    remote: Arc<C>,
    cache: Arc<VersionCache>,
    retry: RetryPolicy,
    observer: Arc<dyn VersionObserver>,
    current: RwLock<StoreFile>,
    phase: watch::Sender<SyncPhase>,
    op_lock: Mutex<()>,
}

impl<C: ContentStore + ?Sized> VersionStore<C> {
    pub fn new(chart: ChartContext, remote: Arc<C>, cache: Arc<VersionCache>) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            chart,
            remote,
            cache,
            retry: RetryPolicy::disabled(),
            observer: Arc::new(TracingObserver),
            current: RwLock::new(StoreFile::default()),
            phase,
            op_lock: Mutex::new(()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn VersionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn chart(&self) -> &ChartContext {
        &self.chart
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, op: VersionOp, phase: SyncPhase) {
        self.phase.send_replace(phase);
        self.observer.phase_changed(&self.chart.key, op, phase);
    }

    /// All records, most recently touched first.
    pub async fn list_sorted_by_recency(&self) -> Vec<VersionRecord> {
        self.current.read().await.sorted_by_recency()
    }

    pub async fn get(&self, id: &str) -> Option<VersionRecord> {
        self.current.read().await.versions.get(id).cloned()
    }

    pub fn public_url(&self, id: &str) -> String {
        embed::public_url(&self.chart.public_base_url, &self.chart.public_path, id)
    }

    pub fn embed_snippet(&self, id: &str) -> String {
        embed::embed_snippet(&self.chart.public_base_url, &self.chart.public_path, id)
    }

    /// Read-only bootstrap from the published site, without a credential.
    /// Falls back to the cached mapping, then to an empty store.
    pub async fn load_versions(&self, published: &dyn PublishedFiles) -> LoadSource {
        let _guard = self.op_lock.lock().await;
        let chart = self.chart.key.as_str();

        let fetched = match published.fetch(&self.chart.store_path).await {
            Ok(text) => StoreFile::parse(&text).map_err(|e| ServiceError::Decode {
                path: self.chart.store_path.clone(),
                message: e.to_string(),
            }),
            Err(e) => Err(e),
        };

        let (file, source) = match fetched {
            Ok(file) => {
                if let Err(e) = self.cache.replace(chart, &file).await {
                    warn!(chart, error = %e, "could not refresh version cache");
                }
                (file, LoadSource::Published)
            }
            Err(e) => {
                warn!(chart, error = %e, "published versions unavailable; falling back to cache");
                match self.cache.load(chart).await {
                    Some(cached) => (cached, LoadSource::Cache),
                    None => (StoreFile::default(), LoadSource::Empty),
                }
            }
        };

        info!(chart, source = ?source, versions = file.versions.len(), "versions loaded");
        observability::record_version_op(VersionOp::Load.as_str(), "ok");
        self.adopt(file).await;
        source
    }

    /// Save the current chart settings under a new version named `name`; returns its id.
    pub async fn save(&self, name: &str, config: serde_json::Value) -> Result<String, ServiceError> {
        let name = validate_name(name)?;
        let candidate = slug_candidate(name);
        self.mutate(VersionOp::Save, move |file, now| {
            let id = unique_slug(&candidate, file.versions.keys());
            file.versions.insert(
                id.clone(),
                VersionRecord {
                    id: id.clone(),
                    name: name.to_string(),
                    created_at: now,
                    updated_at: Some(now),
                    config: config.clone(),
                },
            );
            Ok(Mutation::Write { name: name.to_string(), value: id })
        })
        .await
    }

    /// Overwrite the settings of an existing version.
    pub async fn update(&self, id: &str, config: serde_json::Value) -> Result<(), ServiceError> {
        let chart = self.chart.key.as_str();
        self.mutate(VersionOp::Update, move |file, now| {
            let record = file
                .versions
                .get_mut(id)
                .ok_or_else(|| ServiceError::NotFound(format!("version '{id}' of {chart}")))?;
            record.config = config.clone();
            record.updated_at = Some(now);
            Ok(Mutation::Write { name: record.name.clone(), value: () })
        })
        .await
    }

    /// Change the display name of a version; its id stays the same.
    pub async fn rename(&self, id: &str, name: &str) -> Result<(), ServiceError> {
        let name = validate_name(name)?;
        let chart = self.chart.key.as_str();
        self.mutate(VersionOp::Rename, move |file, now| {
            let record = file
                .versions
                .get_mut(id)
                .ok_or_else(|| ServiceError::NotFound(format!("version '{id}' of {chart}")))?;
            record.name = name.to_string();
            record.updated_at = Some(now);
            Ok(Mutation::Write { name: name.to_string(), value: () })
        })
        .await
    }

    /// Remove a version. Deleting an id that is not there succeeds and writes nothing.
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.mutate(VersionOp::Delete, move |file, _| match file.versions.remove(id) {
            Some(removed) => Ok(Mutation::Write { name: removed.name, value: () }),
            None => Ok(Mutation::Unchanged(())),
        })
        .await
    }

    async fn mutate<T, F>(&self, op: VersionOp, mutation: F) -> Result<T, ServiceError>
    where
        T: Send,
        F: Fn(&mut StoreFile, DateTime<Utc>) -> Result<Mutation<T>, ServiceError> + Sync,
    {
        let _guard = self.op_lock.lock().await;
        let mutation = &mutation;
        let result = self
            .retry
            .run(op.as_str(), move || self.fetch_mutate_write(op, mutation))
            .await;

        match &result {
            Ok(_) => observability::record_version_op(op.as_str(), "ok"),
            Err(e) => {
                warn!(chart = %self.chart.key, op = op.as_str(), error = %e, "version operation failed");
                observability::record_version_op(op.as_str(), e.kind());
            }
        }
        result
    }

    async fn fetch_mutate_write<T, F>(&self, op: VersionOp, mutation: &F) -> Result<T, ServiceError>
    where
        F: Fn(&mut StoreFile, DateTime<Utc>) -> Result<Mutation<T>, ServiceError>,
    {
        self.set_phase(op, SyncPhase::FetchingLatest);
        let (latest, tag) = match self.fetch_latest().await {
            Ok(v) => v,
            Err(e) => {
                self.set_phase(op, SyncPhase::Failed);
                return Err(e);
            }
        };

        self.set_phase(op, SyncPhase::Mutating);
        let mut next = latest.clone();
        let change = match mutation(&mut next, Utc::now()) {
            Ok(c) => c,
            Err(e) => {
                self.adopt(latest).await;
                self.set_phase(op, SyncPhase::Failed);
                return Err(e);
            }
        };

        let (name, value) = match change {
            Mutation::Unchanged(value) => {
                self.adopt(latest).await;
                self.set_phase(op, SyncPhase::Synced);
                return Ok(value);
            }
            Mutation::Write { name, value } => (name, value),
        };

        self.set_phase(op, SyncPhase::Writing);
        let message = format!("{} version \"{}\" ({})", op.verb(), name, self.chart.key);
        let written = match next.to_pretty_json() {
            Ok(text) => self.remote.write(&self.chart.store_path, &text, &message, tag.as_ref()).await,
            Err(e) => Err(ServiceError::Decode { path: self.chart.store_path.clone(), message: e.to_string() }),
        };
        let outcome = match written {
            Ok(outcome) => outcome,
            Err(e) => {
                self.adopt(latest).await;
                self.set_phase(op, SyncPhase::Failed);
                return Err(e);
            }
        };

        info!(
            chart = %self.chart.key,
            op = op.as_str(),
            tag = %outcome.tag,
            commit = outcome.commit_url.as_deref().unwrap_or("-"),
            "versions written"
        );
        if let Err(e) = self.cache.replace(&self.chart.key, &next).await {
            warn!(chart = %self.chart.key, error = %e, "could not refresh version cache");
        }
        self.adopt(next).await;
        self.set_phase(op, SyncPhase::Synced);
        Ok(value)
    }

    /// Authenticated read of the store file; a missing file is an empty store with no tag.
    async fn fetch_latest(&self) -> Result<(StoreFile, Option<VersionTag>), ServiceError> {
        let path = &self.chart.store_path;
        let Some(remote) = self.remote.read(path).await? else {
            debug!(chart = %self.chart.key, path = %path, "no store file yet");
            return Ok((StoreFile::default(), None));
        };
        let file = StoreFile::parse(&remote.content)
            .map_err(|e| ServiceError::Decode { path: path.clone(), message: e.to_string() })?;
        if let Err(e) = self.cache.replace(&self.chart.key, &file).await {
            warn!(chart = %self.chart.key, error = %e, "could not refresh version cache");
        }
        Ok((file, Some(remote.tag)))
    }

    /// Make `file` the in-memory list and tell the observer.
    async fn adopt(&self, file: StoreFile) {
        let versions = file.sorted_by_recency();
        *self.current.write().await = file;
        self.observer.versions_changed(&self.chart.key, &versions);
    }
}

fn validate_name(name: &str) -> Result<&str, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("version name must not be empty".into()));
    }
    Ok(name)
}
