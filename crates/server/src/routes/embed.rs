use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};

use service::embed;

use crate::state::AppState;

/// `GET /embed.js`: the iframe loader/resizer for the configured variant.
pub async fn resizer_script(State(state): State<AppState>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=300"),
        ],
        embed::resizer_script(state.embed_variant),
    )
}
