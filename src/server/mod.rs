use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::error::Result;
use crate::fetch::ReadingFetcher;
use crate::history::{HistoryEntry, HistoryStore};

/// The reading changes slowly, so clients and intermediaries may cache it
/// briefly; history gets a shorter hint since it grows every cycle.
const CURRENT_CACHE_CONTROL: &str = "public, max-age=120";
const HISTORY_CACHE_CONTROL: &str = "public, max-age=60";

#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<ReadingFetcher>,
    pub history: Arc<HistoryStore>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    details: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(current))
        .route("/history", get(history))
        .route("/history/", get(history))
        .fallback(not_found)
        .layer(map_response(allow_cross_origin))
        .with_state(state)
}

pub async fn serve(bind_addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    log::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// GET / — run one aggregation cycle and return the merged reading. The
/// history write happens only on success; a failed cycle leaves the log
/// untouched and surfaces the failure as structured JSON.
async fn current(State(state): State<AppState>) -> Response {
    match state.fetcher.fetch().await {
        Ok(reading) => {
            state.history.record(HistoryEntry::new(Utc::now(), reading));
            (
                [(header::CACHE_CONTROL, CURRENT_CACHE_CONTROL)],
                Json(reading),
            )
                .into_response()
        }
        Err(err) => {
            log::error!("Aggregation cycle failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "Failed to fetch temperature data".to_string(),
                    details: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// GET /history — the retained log verbatim, oldest first.
async fn history(State(state): State<AppState>) -> Response {
    (
        [(header::CACHE_CONTROL, HISTORY_CACHE_CONTROL)],
        Json(state.history.all()),
    )
        .into_response()
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

/// Every response, including 404/405, carries permissive CORS headers.
async fn allow_cross_origin(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET"),
    );
    response
}
