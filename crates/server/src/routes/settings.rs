use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use common::types::StatusMessage;

use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct TokenInput {
    pub token: String,
}

#[derive(Serialize, Debug)]
pub struct TokenStatus {
    pub configured: bool,
}

/// Never echoes the token itself.
pub async fn token_status(State(state): State<AppState>) -> Json<TokenStatus> {
    Json(TokenStatus { configured: state.tokens.credential().is_configured() })
}

pub async fn set_token(
    State(state): State<AppState>,
    Json(input): Json<TokenInput>,
) -> Result<Json<StatusMessage>, ApiError> {
    state.tokens.set(&input.token).await?;
    Ok(Json(StatusMessage::ok("Access token saved")))
}

pub async fn clear_token(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.tokens.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}
