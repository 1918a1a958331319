use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptchaError {
    #[error("Malformed label: '{identifier}' does not start with 4 digit characters")]
    MalformedLabel { identifier: String },

    #[error("Missing or invalid classifier weights: {0}")]
    MissingWeights(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CaptchaError {
    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            CaptchaError::MalformedLabel { .. } => "MALFORMED_LABEL",
            CaptchaError::MissingWeights(_) => "MISSING_WEIGHTS",
            CaptchaError::ShapeMismatch(_) => "SHAPE_MISMATCH",
            CaptchaError::EmptyDataset(_) => "EMPTY_DATASET",
            CaptchaError::InvalidConfig(_) => "INVALID_CONFIG",
            CaptchaError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            CaptchaError::Model(_) => "MODEL_ERROR",
            CaptchaError::Io(_) => "IO_ERROR",
            CaptchaError::ImageTooLarge { .. } => "IMAGE_TOO_LARGE",
            CaptchaError::MissingFile => "MISSING_FILE",
            CaptchaError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }
}

impl From<candle_core::Error> for CaptchaError {
    fn from(err: candle_core::Error) -> Self {
        CaptchaError::Model(err.to_string())
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for CaptchaError {
    fn into_response(self) -> Response {
        let status = match &self {
            CaptchaError::ImageDecode(_)
            | CaptchaError::MissingFile
            | CaptchaError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CaptchaError::ShapeMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CaptchaError::ImageTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CaptchaError::MissingWeights(_) => StatusCode::SERVICE_UNAVAILABLE,
            CaptchaError::MalformedLabel { .. }
            | CaptchaError::EmptyDataset(_)
            | CaptchaError::InvalidConfig(_)
            | CaptchaError::Model(_)
            | CaptchaError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });

        (status, body).into_response()
    }
}
