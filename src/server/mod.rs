//! HTTP boundary
//!
//! A thin axum collaborator over the synthesis engine: one speech endpoint
//! returning WAV bytes and one health endpoint. Field validation lives
//! here, not in the engine; the engine only sees well-formed jobs.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::engine::SynthesisEngine;
use crate::engine::SynthesisJob;

const MAX_TEXT_CHARS: usize = 10_000;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SynthesisEngine>,
}

#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    #[serde(default)]
    pub speaker_id: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_temperature() -> f32 {
    0.75
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub error_code: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub service: &'static str,
    pub version: &'static str,
}

fn bad_request(detail: impl Into<String>, error_code: &'static str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            detail: detail.into(),
            error_code,
        }),
    )
        .into_response()
}

fn server_error(detail: impl Into<String>, error_code: &'static str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            detail: detail.into(),
            error_code,
        }),
    )
        .into_response()
}

/// POST /v1/generate/speech
async fn generate_speech(
    State(state): State<AppState>,
    Json(request): Json<SpeechRequest>,
) -> Response {
    if request.text.trim().is_empty() {
        return bad_request("text must not be empty", "INVALID_TEXT");
    }
    if request.text.chars().count() > MAX_TEXT_CHARS {
        return bad_request(
            format!("text exceeds {MAX_TEXT_CHARS} characters"),
            "TEXT_TOO_LONG",
        );
    }
    if !(0.0..=2.0).contains(&request.temperature) {
        return bad_request(
            "temperature must be between 0.0 and 2.0",
            "INVALID_TEMPERATURE",
        );
    }

    let request_id = uuid::Uuid::new_v4().to_string();
    let output = match tempfile::Builder::new()
        .prefix("speech-")
        .suffix(".wav")
        .tempfile()
    {
        Ok(file) => file,
        Err(e) => {
            return server_error(
                format!("Failed to allocate output file: {e}"),
                "SYNTHESIS_FAILED",
            )
        }
    };

    info!(
        request_id = %request_id,
        chars = request.text.chars().count(),
        language = %request.language,
        "Speech request accepted"
    );

    let job = SynthesisJob {
        id: request_id.clone(),
        text: request.text,
        output_path: output.path().to_path_buf(),
        quality: None,
        temperature: Some(request.temperature),
        speaker: request.speaker_id,
    };
    let result = state.engine.synthesize(&job).await;
    if !result.success {
        let detail = result
            .error
            .unwrap_or_else(|| "synthesis failed".to_string());
        warn!(request_id = %request_id, "Speech request failed: {}", detail);
        return server_error(detail, "SYNTHESIS_FAILED");
    }

    let bytes = match tokio::fs::read(output.path()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return server_error(
                format!("Failed to read synthesized audio: {e}"),
                "SYNTHESIS_FAILED",
            )
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/wav"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"speech.wav\"",
            ),
        ],
        bytes,
    )
        .into_response()
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_loaded: state.engine.is_ready().await,
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/generate/speech", post(generate_speech))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until the cancellation token fires
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP service listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SyntheticBackend;
    use crate::engine::{
        MemoryGuard, ModelLifecycle, Quality, SystemMemoryProbe,
    };
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn test_router() -> Router {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("model.gguf");
        std::fs::write(&artifact, b"weights").unwrap();

        let mut lifecycle =
            ModelLifecycle::new(Arc::new(SyntheticBackend::new()), artifact);
        lifecycle.load().await.unwrap();
        let guard = MemoryGuard::new(Arc::new(SystemMemoryProbe::new()), 0);
        let engine = Arc::new(SynthesisEngine::new(lifecycle, guard, Quality::High));
        // The artifact can disappear after load; the handle stays valid.
        drop(dir);
        create_router(AppState { engine })
    }

    fn speech_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/generate/speech")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_generate_speech_returns_wav_bytes() {
        let router = test_router().await;
        let response = router
            .oneshot(speech_request(r#"{"text": "Hello there"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "audio/wav"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.len() > 44);
        assert_eq!(&body[..4], b"RIFF");
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let router = test_router().await;
        let response = router
            .oneshot(speech_request(r#"{"text": "   "}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error_code"], "INVALID_TEXT");
    }

    #[tokio::test]
    async fn test_out_of_range_temperature_is_rejected() {
        let router = test_router().await;
        let response = router
            .oneshot(speech_request(r#"{"text": "hi", "temperature": 3.5}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error_code"], "INVALID_TEMPERATURE");
    }

    #[tokio::test]
    async fn test_oversized_text_is_rejected() {
        let router = test_router().await;
        let text = "a".repeat(MAX_TEXT_CHARS + 1);
        let response = router
            .oneshot(speech_request(&format!(r#"{{"text": "{text}"}}"#)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_reports_model_state() {
        let router = test_router().await;
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["model_loaded"], true);
        assert!(json["version"].is_string());
    }
}
