use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bold::errors::BackendError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    q: Option<String>,
    query: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl SearchParams {
    /// Query string form: `q` wins over `query`
    fn url_query(self) -> Option<String> {
        non_blank(self.q).or_else(|| non_blank(self.query))
    }

    /// JSON body form: `query` wins over `q`
    fn body_query(self) -> Option<String> {
        non_blank(self.query).or_else(|| non_blank(self.q))
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

async fn search(state: &AppState, query: Option<String>) -> Response {
    let Some(query) = query else {
        return error_response(StatusCode::BAD_REQUEST, "Missing query parameter");
    };

    match state.backend.search(&query).await {
        Ok(results) => Json(results).into_response(),
        Err(BackendError::Upstream { status, body, .. }) => {
            warn!(status, body = %body, "search upstream refused query");
            error_response(
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                format!("Search request failed with status {}", status),
            )
        }
        Err(err @ (BackendError::MissingConfiguration | BackendError::InvalidConfiguration)) => {
            error!("Search is not configured: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        Err(BackendError::Http(e)) => {
            error!("Search request error: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to perform search")
        }
    }
}

async fn search_get(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    search(&state, params.url_query()).await
}

async fn search_post(State(state): State<AppState>, body: Bytes) -> Response {
    match serde_json::from_slice::<SearchParams>(&body) {
        Ok(params) => search(&state, params.body_query()).await,
        Err(e) => {
            warn!("Rejecting search request: {}", e);
            error_response(StatusCode::BAD_REQUEST, "Invalid request format")
        }
    }
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/search", get(search_get).post(search_post))
        .with_state(state)
}
