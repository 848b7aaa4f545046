//! Transliteration HTTP API.
//!
//! - GET  /               liveness message
//! - POST /transliterate  `{"word": "..."}` -> `{"output": "..."}`
//! - GET  /model_info     static model metadata

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::inference::engine::Transliterator;
use crate::inference::info::ModelInfo;

pub const LIVENESS_MESSAGE: &str = "BackEnd Transliteration API is running!";

/// Application state shared across handlers.
pub struct AppState {
    pub engine: Arc<Transliterator>,
    pub info: ModelInfo,
}

impl AppState {
    pub fn new(engine: Transliterator) -> Self {
        let info = ModelInfo::from_engine(&engine);
        Self {
            engine: Arc::new(engine),
            info,
        }
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>, cors: bool) -> Router {
    let router = Router::new()
        .route("/", get(home))
        .route("/transliterate", post(transliterate))
        .route("/model_info", get(model_info))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

// ─── Request/Response Types ────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct TransliterateRequest {
    #[serde(default)]
    pub word: String,
}

impl TransliterateRequest {
    /// Parse a request body. Anything unusable (bad JSON, missing or
    /// non-string `word`) becomes an empty request.
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransliterateResponse {
    pub output: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HomeResponse {
    pub message: String,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn home() -> Json<HomeResponse> {
    Json(HomeResponse {
        message: LIVENESS_MESSAGE.to_string(),
    })
}

async fn transliterate(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Json<TransliterateResponse> {
    let request_id = Uuid::new_v4().to_string();
    let req = TransliterateRequest::from_body(&body);
    let text = req.word.trim().to_string();

    if text.is_empty() {
        return Json(TransliterateResponse {
            output: String::new(),
        });
    }

    let started = Instant::now();
    let words = text.split_whitespace().count();
    let engine = state.engine.clone();
    let input = text.clone();

    let output = match tokio::task::spawn_blocking(move || engine.transliterate_sentence(&input)).await {
        Ok(output) => output,
        Err(e) => {
            warn!(request_id = request_id, error = %e, "Inference task failed, echoing input");
            text
        }
    };

    info!(
        request_id = request_id,
        words,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Transliteration request"
    );

    Json(TransliterateResponse { output })
}

async fn model_info(State(state): State<Arc<AppState>>) -> Json<ModelInfo> {
    Json(state.info.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parsing_degrades() {
        assert_eq!(TransliterateRequest::from_body(br#"{"word": "ghar"}"#).word, "ghar");
        assert_eq!(TransliterateRequest::from_body(b"{}").word, "");
        assert_eq!(TransliterateRequest::from_body(b"not json").word, "");
        assert_eq!(TransliterateRequest::from_body(br#"{"word": 42}"#).word, "");
        assert_eq!(TransliterateRequest::from_body(b"").word, "");
    }
}
