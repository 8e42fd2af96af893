use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use common::types::StatusMessage;
use service::versions::{LoadSource, VersionRecord};
use service::ServiceError;

use crate::errors::ApiError;
use crate::state::AppState;

/// One saved version as the panels see it, with its shareable addresses.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VersionView {
    #[serde(flatten)]
    pub record: VersionRecord,
    pub public_url: String,
    pub embed_snippet: String,
}

#[derive(Serialize, Debug)]
pub struct VersionList {
    pub chart: String,
    pub versions: Vec<VersionView>,
}

#[derive(Deserialize, Debug)]
pub struct SaveInput {
    pub name: String,
    pub config: serde_json::Value,
}

#[derive(Serialize, Debug)]
pub struct Saved {
    pub success: bool,
    pub id: String,
    pub url: String,
    pub embed: String,
    pub message: String,
}

#[derive(Deserialize, Debug)]
pub struct UpdateInput {
    pub config: serde_json::Value,
}

#[derive(Deserialize, Debug)]
pub struct RenameInput {
    pub name: String,
}

#[derive(Serialize, Debug)]
pub struct Reloaded {
    pub source: LoadSource,
    pub count: usize,
}

pub async fn list(
    State(state): State<AppState>,
    Path(chart): Path<String>,
) -> Result<Json<VersionList>, ApiError> {
    let store = state.chart(&chart)?;
    let versions = store
        .list_sorted_by_recency()
        .await
        .into_iter()
        .map(|record| VersionView {
            public_url: store.public_url(&record.id),
            embed_snippet: store.embed_snippet(&record.id),
            record,
        })
        .collect();
    Ok(Json(VersionList { chart, versions }))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path((chart, id)): Path<(String, String)>,
) -> Result<Json<VersionView>, ApiError> {
    let store = state.chart(&chart)?;
    let record = store
        .get(&id)
        .await
        .ok_or_else(|| ServiceError::not_found(&format!("version '{id}'")))?;
    Ok(Json(VersionView {
        public_url: store.public_url(&record.id),
        embed_snippet: store.embed_snippet(&record.id),
        record,
    }))
}

pub async fn save(
    State(state): State<AppState>,
    Path(chart): Path<String>,
    Json(input): Json<SaveInput>,
) -> Result<(StatusCode, Json<Saved>), ApiError> {
    let store = state.chart(&chart)?;
    let id = store.save(&input.name, input.config).await?;
    let message = format!("Saved \"{}\"", input.name.trim());
    Ok((
        StatusCode::CREATED,
        Json(Saved {
            success: true,
            url: store.public_url(&id),
            embed: store.embed_snippet(&id),
            id,
            message,
        }),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path((chart, id)): Path<(String, String)>,
    Json(input): Json<UpdateInput>,
) -> Result<Json<StatusMessage>, ApiError> {
    let store = state.chart(&chart)?;
    store.update(&id, input.config).await?;
    Ok(Json(StatusMessage::ok(format!("Updated {id}"))))
}

pub async fn rename(
    State(state): State<AppState>,
    Path((chart, id)): Path<(String, String)>,
    Json(input): Json<RenameInput>,
) -> Result<Json<StatusMessage>, ApiError> {
    let store = state.chart(&chart)?;
    store.rename(&id, &input.name).await?;
    Ok(Json(StatusMessage::ok(format!("Renamed {id}"))))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((chart, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let store = state.chart(&chart)?;
    store.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Re-run the bootstrap for one chart: published file, then cache.
pub async fn reload(
    State(state): State<AppState>,
    Path(chart): Path<String>,
) -> Result<Json<Reloaded>, ApiError> {
    let store = state.chart(&chart)?;
    let source = store.load_versions(&*state.published).await;
    let count = store.list_sorted_by_recency().await.len();
    Ok(Json(Reloaded { source, count }))
}
