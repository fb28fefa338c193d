use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::Instrument;

use crate::config::Config;
use crate::transcribe::TranscriptionPipeline;
use crate::TranscriberError;

pub mod error;

pub use error::{error_mapper, HttpError, MISSING_GCS_PATH};

/// Shared, read-only state built once at startup
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<TranscriptionPipeline>,
    limiter: Arc<Semaphore>,
}

impl AppState {
    /// Build the Video Intelligence pipeline and request limiter from configuration
    pub fn init(config: &Config) -> Result<Self> {
        let pipeline = TranscriptionPipeline::new(config)
            .context("Failed to initialize transcription pipeline")?;
        Ok(Self::new(pipeline, config.server.max_concurrent_requests))
    }

    pub fn new(pipeline: TranscriptionPipeline, max_concurrent_requests: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            limiter: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StartProcessingResponse {
    pub status: &'static str,
    pub transcript: String,
}

/// Fields accepted in the request body
#[derive(Debug, PartialEq)]
struct StartProcessingRequest {
    gcs_path: String,
    max_chars_per_line: Option<usize>,
}

impl StartProcessingRequest {
    /// Missing, empty or non-string `gcsPath`, or a body that is not a JSON object, is a validation error
    fn parse(body: &[u8]) -> Result<Self, TranscriberError> {
        let missing = || TranscriberError::Validation(MISSING_GCS_PATH.to_string());

        let value: serde_json::Value = serde_json::from_slice(body).map_err(|_| missing())?;
        let gcs_path = value
            .get("gcsPath")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(missing)?;

        let max_chars_per_line = match value.get("maxCharsPerLine") {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => Some(
                v.as_u64()
                    .filter(|n| *n > 0)
                    .map(|n| n as usize)
                    .ok_or_else(|| {
                        TranscriberError::Validation(
                            "maxCharsPerLine must be a positive integer.".to_string(),
                        )
                    })?,
            ),
        };

        Ok(Self {
            gcs_path: gcs_path.to_string(),
            max_chars_per_line,
        })
    }
}

/// Build the HTTP router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(start_processing).options(preflight))
        .route("/start_processing", post(start_processing).options(preflight))
        .route("/healthz", get(health))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Serve until Ctrl-C
pub async fn run(state: AppState, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn start_processing(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StartProcessingResponse>, HttpError> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("start_processing", %request_id);

    handle_start_processing(state, body).instrument(span).await
}

async fn handle_start_processing(
    state: AppState,
    body: Bytes,
) -> Result<Json<StartProcessingResponse>, HttpError> {
    let request = StartProcessingRequest::parse(&body).map_err(|e| {
        tracing::warn!(error = %e, "Rejected transcription request");
        error_mapper(e)
    })?;

    let video = state.pipeline.resolve(&request.gcs_path);

    let _permit = state.limiter.acquire().await.map_err(|e| HttpError::Internal {
        message: format!("Transcription failed: {}", e),
    })?;

    match state
        .pipeline
        .transcribe(&video, request.max_chars_per_line)
        .await
    {
        Ok(result) => Ok(Json(StartProcessingResponse {
            status: "Success",
            transcript: result.transcript.render(),
        })),
        Err(error) => {
            tracing::error!(video = %video, error = %error, "Transcription failed");
            Err(error_mapper(error))
        }
    }
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Attach the CORS headers the browser frontend needs to every response
async fn cors(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

pub fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("3600"));
}
