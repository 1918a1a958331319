use crate::config::ServerConfig;
use crate::error::CaptchaError;
use crate::predictor::Predictor;
use crate::segmentation::{CAPTCHA_LENGTH, CROP_SIZE};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<Predictor>,
    pub config: Arc<ServerConfig>,
}

/// Prediction response
#[derive(Serialize)]
pub struct PredictResponse {
    pub text: String,
    pub scores: Vec<Vec<f32>>,
    pub processing_time_ms: u64,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub captcha_length: usize,
    pub crop_size: u32,
    pub max_file_size_bytes: usize,
}

/// Build the router around an already loaded predictor
pub fn router(predictor: Predictor, config: ServerConfig) -> Router {
    let max_file_size = config.max_file_size;
    let state = AppState {
        predictor: Arc::new(predictor),
        config: Arc::new(config),
    };

    Router::new()
        .route("/predict", post(handle_predict))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        // multipart framing needs headroom above the raw file size
        .layer(DefaultBodyLimit::max(max_file_size + 64 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let predictor = Predictor::from_file(&config.weights_path)?;
    let addr = format!("{}:{}", config.host, config.port);

    let app = router(predictor, config);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Handle prediction requests
async fn handle_predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, CaptchaError> {
    let start = Instant::now();

    let mut file_data: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CaptchaError::InvalidRequest(format!("Failed to parse multipart: {}", e)))?
    {
        if field.name() == Some("file") {
            file_data = Some(field.bytes().await.map_err(|e| {
                CaptchaError::InvalidRequest(format!("Failed to read file data: {}", e))
            })?);
        }
    }

    let data = file_data.ok_or(CaptchaError::MissingFile)?;

    if data.len() > state.config.max_file_size {
        return Err(CaptchaError::ImageTooLarge {
            size: data.len(),
            max: state.config.max_file_size,
        });
    }

    let result = state.predictor.predict_bytes(&data)?;
    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        "Prediction '{}' completed in {}ms",
        result.text,
        processing_time_ms
    );

    Ok(Json(PredictResponse {
        text: result.text,
        scores: result.scores,
        processing_time_ms,
    }))
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        captcha_length: CAPTCHA_LENGTH,
        crop_size: CROP_SIZE,
        max_file_size_bytes: state.config.max_file_size,
    })
}
