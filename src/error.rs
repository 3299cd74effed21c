use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures of the OCR provider. Every variant is terminal for the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OcrError {
    #[error("{0}")]
    UnsupportedPlatform(String),

    #[error("{0}")]
    DecodeFailed(String),

    #[error("{0}")]
    EngineUnavailable(String),

    #[error("{0}")]
    RecognizeFailed(String),
}

impl OcrError {
    pub fn code(&self) -> &'static str {
        match self {
            OcrError::UnsupportedPlatform(_) => "ERR_OCR_UNSUPPORTED_PLATFORM",
            OcrError::DecodeFailed(_) => "ERR_OCR_DECODE_FAILED",
            OcrError::EngineUnavailable(_) => "ERR_OCR_ENGINE_UNAVAILABLE",
            OcrError::RecognizeFailed(_) => "ERR_OCR_RECOGNIZE_FAILED",
        }
    }

    /// The human-readable part, without the code.
    pub fn message(&self) -> &str {
        match self {
            OcrError::UnsupportedPlatform(m)
            | OcrError::DecodeFailed(m)
            | OcrError::EngineUnavailable(m)
            | OcrError::RecognizeFailed(m) => m,
        }
    }
}

/// Failures of the Everything search path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Everything SDK is unavailable: {0}")]
    SdkUnavailable(String),

    #[error("Failed to convert query string to UTF-16: {0}")]
    QueryEncoding(String),

    #[error("Everything query failed, error code: {0}")]
    QueryFailed(u32),
}

impl SearchError {
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::InvalidArgument(_) => "ERR_INVALID_ARGUMENT",
            SearchError::SdkUnavailable(_) => "ERR_EVERYTHING_SDK_UNAVAILABLE",
            SearchError::QueryEncoding(_) => "ERR_EVERYTHING_QUERY_ENCODING",
            SearchError::QueryFailed(_) => "ERR_EVERYTHING_QUERY_FAILED",
        }
    }
}

/// Errors surfaced by the call boundary. Adapter errors pass through
/// untouched; the boundary only adds argument checks of its own.
#[derive(Error, Debug)]
pub enum BoundaryError {
    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BoundaryError {
    pub fn code(&self) -> &'static str {
        match self {
            BoundaryError::Ocr(e) => e.code(),
            BoundaryError::Search(e) => e.code(),
            BoundaryError::InvalidArgument(_) => "ERR_INVALID_ARGUMENT",
            BoundaryError::Internal(_) => "ERR_INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self.code() {
            "ERR_INVALID_ARGUMENT" | "ERR_EVERYTHING_QUERY_ENCODING" => StatusCode::BAD_REQUEST,
            "ERR_OCR_DECODE_FAILED" | "ERR_OCR_RECOGNIZE_FAILED" => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            "ERR_OCR_UNSUPPORTED_PLATFORM" => StatusCode::NOT_IMPLEMENTED,
            "ERR_OCR_ENGINE_UNAVAILABLE" | "ERR_EVERYTHING_SDK_UNAVAILABLE" => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            "ERR_EVERYTHING_QUERY_FAILED" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Host-visible error shape: the message plus the stable code.
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub message: String,
    pub code: String,
}

impl From<&BoundaryError> for ErrorResponse {
    fn from(error: &BoundaryError) -> Self {
        Self {
            message: error.to_string(),
            code: error.code().to_string(),
        }
    }
}

impl IntoResponse for BoundaryError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("{} ({})", self, self.code());
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}
