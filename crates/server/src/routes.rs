use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{TraceLayer, DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, DefaultOnFailure},
};
use tracing::Level;

use common::types::Health;
use service::observability;

use crate::state::AppState;

pub mod versions;
pub mod settings;
pub mod publish;
pub mod embed;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn metrics() -> impl IntoResponse {
    match observability::encode_metrics() {
        Ok(text) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, [(header::CONTENT_TYPE, "text/plain")], e),
    }
}

/// Build the full application router: JSON API, embed script, publishing
/// endpoints and the static site as fallback.
pub fn build_router(state: AppState, site_dir: &str, cors: CorsLayer) -> Router {
    let api = Router::new()
        .route("/api/charts/:chart/versions", get(versions::list).post(versions::save))
        .route(
            "/api/charts/:chart/versions/:id",
            get(versions::get_one)
                .put(versions::update)
                .patch(versions::rename)
                .delete(versions::delete),
        )
        .route("/api/charts/:chart/reload", post(versions::reload))
        .route("/api/charts/:chart/csv", post(publish::save_remote_csv))
        .route(
            "/api/settings/token",
            put(settings::set_token).get(settings::token_status).delete(settings::clear_token),
        );

    // Used by the data admin page
    let admin = Router::new()
        .route("/save-csv", post(publish::save_local_csv))
        .route("/git-push", post(publish::git_push));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/embed.js", get(embed::resizer_script))
        .merge(api)
        .merge(admin)
        .fallback_service(ServeDir::new(site_dir))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(
                    DefaultOnRequest::new()
                        .level(Level::INFO),
                )
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_failure(
                    DefaultOnFailure::new()
                        .level(Level::ERROR),
                )
        )
}
