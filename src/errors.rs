// errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Analysis service is unreachable: {0}")]
    NetworkUnavailable(String),

    #[error("Analysis service did not respond within {0} seconds")]
    Timeout(u64),

    #[error("{message}")]
    UpstreamHttp { status: u16, message: String },

    #[error("{0}")]
    Upstream(String),

    #[error("Unrecognized response shape: {0}")]
    UnrecognizedShape(String),

    #[error("Incomplete analysis data: {0}")]
    IncompleteData(String),

    #[error("Analysis service returned no data")]
    NoData,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("History storage error: {0}")]
    Storage(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),
}

impl AnalysisError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AnalysisError::Validation(_) => StatusCode::BAD_REQUEST,
            AnalysisError::NotFound(_) | AnalysisError::NoData => StatusCode::NOT_FOUND,
            AnalysisError::UpstreamHttp { .. }
            | AnalysisError::Upstream(_)
            | AnalysisError::UnrecognizedShape(_)
            | AnalysisError::IncompleteData(_) => StatusCode::BAD_GATEWAY,
            AnalysisError::NetworkUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AnalysisError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Сообщение, которое уходит клиенту в поле `error`
    pub fn public_message(&self) -> String {
        match self {
            AnalysisError::UnrecognizedShape(_) | AnalysisError::IncompleteData(_) => {
                "Could not parse the analysis returned by the analysis service".to_string()
            }
            AnalysisError::NoData => "Analysis not found".to_string(),
            AnalysisError::Configuration(_)
            | AnalysisError::Storage(_)
            | AnalysisError::JsonError(_)
            | AnalysisError::IoError(_)
            | AnalysisError::ConfigError(_)
            | AnalysisError::RegexError(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Запрос завершился ошибкой ({}): {}", status, self);
        } else {
            tracing::warn!("Запрос отклонён ({}): {}", status, self);
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

// Определяем псевдоним Result с фиксированным типом ошибки
pub type Result<T> = std::result::Result<T, AnalysisError>;
