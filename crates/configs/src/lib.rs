use std::collections::HashSet;

use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub charts: Vec<ChartConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub embed: EmbedConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

/// Where version files and CSV data live on the source-hosting service.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Seed credential; a token pasted through the settings endpoint takes precedence.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            owner: String::new(),
            repo: String::new(),
            branch: default_branch(),
            token: None,
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_api_base() -> String { "https://api.github.com".into() }
fn default_branch() -> String { "main".into() }
fn default_request_timeout() -> u64 { 30 }
fn default_user_agent() -> String { format!("grafer-sync/{}", env!("CARGO_PKG_VERSION")) }

/// The published site: public URLs and embed snippets are derived from `public_base_url`.
/// The unauthenticated bootstrap read goes to `published_base_url` when set, otherwise
/// to the local checkout in `storage.site_dir`.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default)]
    pub published_base_url: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { public_base_url: default_public_base_url(), published_base_url: None }
    }
}

fn default_public_base_url() -> String { "http://127.0.0.1:8080".into() }

impl SiteConfig {
    pub fn published_base(&self) -> Option<&str> {
        self.published_base_url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

/// One chart type; each owns one version store file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChartConfig {
    pub key: String,
    /// Path of the chart page relative to the site root, e.g. `prisutvikling/`.
    #[serde(default)]
    pub public_path: Option<String>,
    /// Repository path of the version store file, e.g. `prisutvikling/versions.json`.
    #[serde(default)]
    pub store_path: Option<String>,
}

impl ChartConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), public_path: None, store_path: None }
    }

    pub fn public_path(&self) -> String {
        self.public_path.clone().unwrap_or_else(|| format!("{}/", self.key))
    }

    pub fn store_path(&self) -> String {
        self.store_path.clone().unwrap_or_else(|| format!("{}/versions.json", self.key))
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SyncConfig {
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Bounded re-run of a version mutation after a conflicting write. Off unless enabled.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
        }
    }
}

fn default_max_attempts() -> u32 { 3 }
fn default_backoff_base() -> u64 { 200 }
fn default_backoff_max() -> u64 { 2000 }

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedConfig {
    /// `standard` (400px, no buffer) or `padded` (600px, 5px buffer).
    #[serde(default = "default_variant")]
    pub variant: String,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self { variant: default_variant() }
    }
}

fn default_variant() -> String { "standard".into() }

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Local cache and persisted settings.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Checked-out copy of the published site; served statically and used by local CSV saves.
    #[serde(default = "default_site_dir")]
    pub site_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir(), site_dir: default_site_dir() }
    }
}

fn default_data_dir() -> String { "data".into() }
fn default_site_dir() -> String { "site".into() }

/// `CONFIG_PATH`, or `config.toml` in the working directory.
pub fn config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string())
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// The config file at `path` when it exists, otherwise the environment.
    /// A file that exists but does not parse or validate is an error.
    pub fn load_or_env(path: &str) -> Result<Self> {
        if !std::path::Path::new(path).exists() {
            return Self::from_env();
        }
        let mut cfg = load_from_file(path).map_err(|e| anyhow!("{path}: {e}"))?;
        cfg.normalize_and_validate().map_err(|e| anyhow!("{path}: {e}"))?;
        Ok(cfg)
    }

    /// Config from environment only, for running without a `config.toml`.
    pub fn from_env() -> Result<Self> {
        let mut cfg = AppConfig::default();
        if let Ok(host) = std::env::var("SERVER_HOST") {
            cfg.server.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            cfg.server.port = port;
        }
        if let Ok(charts) = std::env::var("GRAFER_CHARTS") {
            cfg.charts = charts
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(ChartConfig::new)
                .collect();
        }
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.github.normalize_from_env();
        self.github.validate()?;
        self.site.validate()?;
        for chart in &mut self.charts {
            chart.key = chart.key.trim().to_string();
        }
        self.validate_charts()?;
        self.sync.retry.validate()?;
        self.embed.validate()?;
        Ok(())
    }

    pub fn chart(&self, key: &str) -> Option<&ChartConfig> {
        self.charts.iter().find(|c| c.key == key)
    }

    fn validate_charts(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for chart in &self.charts {
            let key = chart.key.as_str();
            if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\']) {
                return Err(anyhow!("charts[].key must be a plain folder name, got '{key}'"));
            }
            if !seen.insert(key) {
                return Err(anyhow!("duplicate chart key: {key}"));
            }
        }
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        if let Some(w) = self.worker_threads {
            if w == 0 { self.worker_threads = Some(4); }
        } else {
            self.worker_threads = Some(4);
        }
        Ok(())
    }
}

impl GithubConfig {
    /// Fill owner/repo/token from `GITHUB_OWNER`, `GITHUB_REPO`, `GITHUB_TOKEN` when TOML leaves them empty.
    pub fn normalize_from_env(&mut self) {
        if self.owner.trim().is_empty() {
            if let Ok(owner) = std::env::var("GITHUB_OWNER") {
                self.owner = owner;
            }
        }
        if self.repo.trim().is_empty() {
            if let Ok(repo) = std::env::var("GITHUB_REPO") {
                self.repo = repo;
            }
        }
        if self.token.as_deref().map_or(true, |t| t.trim().is_empty()) {
            self.token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.trim().is_empty());
        }
        self.api_base = self.api_base.trim_end_matches('/').to_string();
    }

    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() || self.repo.trim().is_empty() {
            return Err(anyhow!("github.owner and github.repo are required (or GITHUB_OWNER / GITHUB_REPO)"));
        }
        if !is_http_url(&self.api_base) {
            return Err(anyhow!("github.api_base must start with http:// or https://"));
        }
        if self.branch.trim().is_empty() {
            return Err(anyhow!("github.branch must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("github.request_timeout_secs must be a positive number of seconds"));
        }
        Ok(())
    }
}

impl SiteConfig {
    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.public_base_url) {
            return Err(anyhow!("site.public_base_url must start with http:// or https://"));
        }
        if let Some(url) = self.published_base() {
            if !is_http_url(url) {
                return Err(anyhow!("site.published_base_url must start with http:// or https://"));
            }
        }
        Ok(())
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow!("sync.retry.max_attempts must be >= 1"));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(anyhow!("sync.retry.backoff_max_ms must be >= backoff_base_ms"));
        }
        Ok(())
    }
}

impl EmbedConfig {
    pub fn validate(&self) -> Result<()> {
        match self.variant.as_str() {
            "standard" | "padded" => Ok(()),
            other => Err(anyhow!("embed.variant must be 'standard' or 'padded', got '{other}'")),
        }
    }
}

fn is_http_url(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
