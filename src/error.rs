use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};
use serde_json::json;
use axum::Json;

use crate::services::engine::EngineError;

#[derive(Debug)]
pub enum AppError {
    InvalidInput(String),
    IoError(std::io::Error),
    ParseError(String),
    NotFound(String),
    Internal(String),
    HttpError(String),
    FileProcessingError(String),
    Engine(EngineError),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::IoError(_) => "IO_ERROR",
            AppError::ParseError(_) => "PARSE_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::HttpError(_) => "HTTP_ERROR",
            AppError::FileProcessingError(_) => "FILE_PROCESSING_ERROR",
            AppError::Engine(err) => err.kind(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::HttpError(msg) => write!(f, "HTTP Error: {}", msg),
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::IoError(err) => write!(f, "IO error: {}", err),
            AppError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::FileProcessingError(msg) => write!(f, "File processing error: {}", msg),
            AppError::Engine(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ParseError(err.to_string())
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        AppError::Engine(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let detail = match &self {
            AppError::Engine(EngineError::SelectionRequired(dimension)) => Some(("dimension", json!(dimension))),
            AppError::Engine(EngineError::ColumnMapping { role, .. }) => Some(("role", json!(role))),
            _ => None,
        };
        let (status, message) = match self {
            AppError::HttpError(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::IoError(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            AppError::ParseError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::FileProcessingError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Engine(err) => {
                let status = match err {
                    EngineError::EmptyDataset(_)
                    | EngineError::NoDataInPeriod { .. }
                    | EngineError::SelectionRequired(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    EngineError::ColumnMapping { .. } | EngineError::InvalidSelection(_) => {
                        StatusCode::BAD_REQUEST
                    }
                };
                (status, err.to_string())
            }
        };

        if status.is_server_error() {
            tracing::error!("{}: {}", kind, message);
        }

        let mut body = json!({
            "error": message,
            "kind": kind,
        });
        if let Some((key, value)) = detail {
            body[key] = value;
        }

        (status, Json(body)).into_response()
    }
}
