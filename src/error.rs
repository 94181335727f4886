use async_openai::error::OpenAIError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    HttpError(reqwest::Error),
    JsonError(serde_json::Error),
    IoError(std::io::Error),
    OpenAIError(OpenAIError),
    InvalidInput(String),
    InvalidConfig(String),
    ProductNotFound(String),
    LocationNotFound(String),
    UpstreamTimeout(String),
    Upstream(String),
    PayloadTooLarge,
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::UpstreamTimeout(err.to_string())
        } else {
            AppError::HttpError(err)
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::JsonError(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err)
    }
}

impl From<OpenAIError> for AppError {
    fn from(err: OpenAIError) -> Self {
        AppError::OpenAIError(err)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::HttpError(e) => write!(f, "http error: {}", e),
            AppError::JsonError(e) => write!(f, "json error: {}", e),
            AppError::IoError(e) => write!(f, "io error: {}", e),
            AppError::OpenAIError(e) => write!(f, "text generation error: {}", e),
            AppError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            AppError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            AppError::ProductNotFound(barcode) => write!(f, "product {} not found", barcode),
            AppError::LocationNotFound(zip) => write!(f, "location {} not found", zip),
            AppError::UpstreamTimeout(msg) => write!(f, "upstream timeout: {}", msg),
            AppError::Upstream(msg) => write!(f, "upstream error: {}", msg),
            AppError::PayloadTooLarge => write!(f, "payload too large"),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::ProductNotFound(_) => (
                StatusCode::NOT_FOUND,
                "Product not found in database".to_string(),
            ),
            AppError::LocationNotFound(zip) => (
                StatusCode::NOT_FOUND,
                format!("Could not find location for ZIP code {}", zip),
            ),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "File too large. Maximum size is 16MB.".to_string(),
            ),
            AppError::UpstreamTimeout(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Request timed out. Please try again.".to_string(),
            ),
            AppError::HttpError(_) | AppError::Upstream(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Network error: Unable to fetch data".to_string(),
            ),
            AppError::JsonError(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::IoError(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::OpenAIError(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::InvalidConfig(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
