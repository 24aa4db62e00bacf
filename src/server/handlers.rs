//! HTTP request handlers for the web server.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::error::ScrapeError;

/// Body of `POST /scrape`. Both the short and the long field names are accepted.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeBody {
    #[serde(default, alias = "targetUrl")]
    pub url: Option<String>,
    #[serde(default, alias = "waitSelector")]
    pub wait_for_selector: Option<String>,
    #[serde(default, alias = "timeoutMs")]
    pub timeout: Option<u64>,
}

impl IntoResponse for ScrapeError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            tracing::error!("Extraction failed: {}", self);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Run one extraction.
pub async fn scrape(State(state): State<AppState>, body: Bytes) -> Response {
    // An empty body is treated like a body without a url.
    let body: ScrapeBody = if body.iter().all(u8::is_ascii_whitespace) {
        ScrapeBody::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(body) => body,
            Err(e) => {
                return ScrapeError::InvalidRequest(format!("invalid JSON body: {}", e))
                    .into_response()
            }
        }
    };

    let request = match state.extractor.request(
        body.url.as_deref().unwrap_or_default(),
        body.wait_for_selector,
        body.timeout,
    ) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    match state.extractor.extract(&request).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Liveness check.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
