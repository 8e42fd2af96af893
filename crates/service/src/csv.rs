//! Publishing chart data files.
//!
//! Two routes to the same repository: through the contents API (no local
//! checkout needed), or by writing into a local checkout of the site and
//! running `git add / commit / push` there.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::fs;
use tokio::process::Command;
use tracing::{info, warn};

use crate::content::{ContentStore, WriteOutcome};
use crate::errors::ServiceError;
use crate::observability;

pub const DEFAULT_FILENAME: &str = "data.csv";

/// `folder/filename` relative to a root, refusing anything that could escape it.
pub fn relative_data_path(folder: Option<&str>, filename: Option<&str>) -> Result<PathBuf, ServiceError> {
    let filename = filename.map(str::trim).filter(|f| !f.is_empty()).unwrap_or(DEFAULT_FILENAME);
    if filename.contains('/') || filename.contains('\\') {
        return Err(ServiceError::Validation(format!("filename '{filename}' must not contain a path")));
    }

    let mut path = PathBuf::new();
    if let Some(folder) = folder.map(str::trim).filter(|f| !f.is_empty()) {
        path.push(folder);
    }
    path.push(filename);

    let safe = path.components().all(|c| matches!(c, Component::Normal(_)));
    if !safe {
        return Err(ServiceError::Validation(format!("path '{}' is not allowed", path.display())));
    }
    Ok(path)
}

/// CSV saves through the contents API, with the usual read-tag-then-write.
pub struct CsvPublisher {
    remote: Arc<dyn ContentStore>,
}

impl CsvPublisher {
    pub fn new(remote: Arc<dyn ContentStore>) -> Self {
        Self { remote }
    }

    pub async fn save_remote(&self, path: &str, csv: &str, message: Option<&str>) -> Result<WriteOutcome, ServiceError> {
        let path = path.trim_start_matches('/');
        if path.is_empty() || path.split('/').any(|seg| seg.is_empty() || seg == "..") {
            return Err(ServiceError::Validation(format!("path '{path}' is not allowed")));
        }
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Update {path}"));

        let result = async {
            let current = self.remote.read(path).await?;
            let tag = current.map(|f| f.tag);
            self.remote.write(path, csv, &message, tag.as_ref()).await
        }
        .await;

        observability::record_csv_save("remote", result.is_ok());
        match &result {
            Ok(outcome) => info!(path, tag = %outcome.tag, bytes = csv.len(), "csv saved to repository"),
            Err(e) => warn!(path, error = %e, "csv save to repository failed"),
        }
        result
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedCsv {
    pub path: PathBuf,
    pub backup: Option<PathBuf>,
    pub bytes: usize,
}

/// CSV saves into a local checkout of the site, keeping one backup per file.
#[derive(Debug, Clone)]
pub struct LocalCsvStore {
    root: PathBuf,
}

impl LocalCsvStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Write `csv` to `<root>/<folder>/<filename>`; an existing file is first
    /// copied to `<stem>_backup<.ext>` next to it.
    pub async fn save(&self, folder: Option<&str>, filename: Option<&str>, csv: &str) -> Result<SavedCsv, ServiceError> {
        let rel = relative_data_path(folder, filename)?;
        let target = self.root.join(&rel);
        if let Some(parent) = target.parent() {
            if fs::metadata(parent).await.is_err() {
                return Err(ServiceError::NotFound(format!("folder '{}'", parent.display())));
            }
        }

        let backup = if fs::metadata(&target).await.is_ok() {
            let backup = backup_path(&target);
            fs::copy(&target, &backup).await.map_err(ServiceError::storage)?;
            Some(backup)
        } else {
            None
        };

        let result = fs::write(&target, csv).await.map_err(ServiceError::storage);
        observability::record_csv_save("local", result.is_ok());
        result?;
        info!(path = %target.display(), bytes = csv.len(), backup = backup.is_some(), "csv saved locally");
        Ok(SavedCsv { path: rel, backup, bytes: csv.len() })
    }
}

fn backup_path(target: &Path) -> PathBuf {
    let stem = target.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let name = match target.extension() {
        Some(ext) => format!("{stem}_backup.{}", ext.to_string_lossy()),
        None => format!("{stem}_backup"),
    };
    target.with_file_name(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushOutcome {
    Pushed,
    NothingToCommit,
}

/// Runs `git add`, `git commit` and `git push` in a local checkout.
#[derive(Debug, Clone)]
pub struct GitPublisher {
    repo_dir: PathBuf,
}

struct GitOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl GitPublisher {
    pub fn new<P: Into<PathBuf>>(repo_dir: P) -> Self {
        Self { repo_dir: repo_dir.into() }
    }

    async fn git(&self, args: &[&str]) -> Result<GitOutput, ServiceError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .env("LC_ALL", "C")
            .output()
            .await
            .map_err(|e| ServiceError::Git(format!("cannot run git {}: {e}", args.first().unwrap_or(&""))))?;
        Ok(GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Commit `folder/filename` with `message` and push. The push runs even
    /// when there is nothing new to commit, so earlier unpushed commits still
    /// go out; that case is reported as [`PushOutcome::NothingToCommit`].
    pub async fn push(&self, folder: Option<&str>, filename: Option<&str>, message: Option<&str>) -> Result<PushOutcome, ServiceError> {
        let rel = relative_data_path(folder, filename)?;
        let rel = rel.to_string_lossy().into_owned();
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Update {rel}"));

        let add = self.git(&["add", "--", &rel]).await?;
        if !add.success {
            return Err(ServiceError::Git(add.stderr.trim().to_string()));
        }
        let commit = self.git(&["commit", "-m", &message]).await?;
        let nothing_to_commit = commit.stdout.contains("nothing to commit") || commit.stderr.contains("nothing to commit");
        if !commit.success && !nothing_to_commit {
            let detail = [commit.stderr.trim(), commit.stdout.trim()]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or("git commit failed")
                .to_string();
            warn!(file = %rel, error = %detail, "git commit failed");
            return Err(ServiceError::Git(detail));
        }

        let push = self.git(&["push"]).await?;
        if push.success || nothing_to_commit {
            let outcome = if nothing_to_commit { PushOutcome::NothingToCommit } else { PushOutcome::Pushed };
            info!(file = %rel, %message, ?outcome, pushed = push.success, "git publish finished");
            return Ok(outcome);
        }

        let detail = [push.stderr.trim(), commit.stderr.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or("unknown git error")
            .to_string();
        warn!(file = %rel, error = %detail, "git push failed");
        Err(ServiceError::Git(detail))
    }
}
