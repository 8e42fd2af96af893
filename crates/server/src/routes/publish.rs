//! Chart data publishing: straight to the repository through the contents
//! API, or into the local checkout followed by `git push`.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use common::types::StatusMessage;
use service::csv::PushOutcome;

use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct RemoteCsvInput {
    /// File name inside the chart folder; `data.csv` when omitted.
    pub filename: Option<String>,
    pub csv: String,
    pub message: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCsvSaved {
    pub success: bool,
    pub path: String,
    pub tag: String,
    pub commit_url: Option<String>,
}

pub async fn save_remote_csv(
    State(state): State<AppState>,
    Path(chart): Path<String>,
    Json(input): Json<RemoteCsvInput>,
) -> Result<Json<RemoteCsvSaved>, ApiError> {
    let store = state.chart(&chart)?;
    let folder = store.chart().public_path.trim_matches('/').to_string();
    let rel = service::csv::relative_data_path(Some(&folder), input.filename.as_deref())?;
    let path = rel.to_string_lossy().replace('\\', "/");
    let outcome = state.csv.save_remote(&path, &input.csv, input.message.as_deref()).await?;
    Ok(Json(RemoteCsvSaved {
        success: true,
        path,
        tag: outcome.tag.to_string(),
        commit_url: outcome.commit_url,
    }))
}

#[derive(Deserialize, Debug)]
pub struct LocalCsvInput {
    pub csv: Option<String>,
    pub folder: Option<String>,
    pub filename: Option<String>,
}

/// `POST /save-csv`
pub async fn save_local_csv(
    State(state): State<AppState>,
    Json(input): Json<LocalCsvInput>,
) -> Result<Json<StatusMessage>, ApiError> {
    let csv = input
        .csv
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No CSV data provided".into()))?;
    let saved = state
        .local_csv
        .save(input.folder.as_deref(), input.filename.as_deref(), &csv)
        .await?;
    let message = match saved.backup {
        Some(_) => format!("Saved {} (previous version kept as backup)", saved.path.display()),
        None => format!("Saved {}", saved.path.display()),
    };
    Ok(Json(StatusMessage::ok(message)))
}

#[derive(Deserialize, Debug)]
pub struct GitPushInput {
    pub message: Option<String>,
    pub folder: Option<String>,
    pub filename: Option<String>,
}

/// `POST /git-push`
pub async fn git_push(
    State(state): State<AppState>,
    Json(input): Json<GitPushInput>,
) -> Result<Json<StatusMessage>, ApiError> {
    let outcome = state
        .git
        .push(input.folder.as_deref(), input.filename.as_deref(), input.message.as_deref())
        .await?;
    let message = match outcome {
        PushOutcome::Pushed => "Pushed to GitHub",
        PushOutcome::NothingToCommit => "Nothing to commit",
    };
    Ok(Json(StatusMessage::ok(message)))
}
