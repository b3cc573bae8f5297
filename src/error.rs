use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::db::executor::ExecutorError;
use crate::db::translator::TranslateError;
use crate::security::{GuardError, ValidationError};

/// Every failure a gateway operation can report to a caller.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid database name: {0}")]
    InvalidDatabaseName(#[from] ValidationError),

    #[error("{0}")]
    InvalidConnection(String),

    #[error("Database not found")]
    DatabaseNotFound,

    #[error("Metadata not found. Please update the database connection to fetch metadata.")]
    MetadataNotFound,

    #[error("{0}")]
    InvalidSql(#[from] GuardError),

    #[error("{0}")]
    QueryFailed(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    LlmNotConfigured(String),

    #[error("Failed to generate SQL: {0}")]
    LlmGenerationFailed(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidDatabaseName(_)
            | GatewayError::InvalidConnection(_)
            | GatewayError::InvalidSql(_)
            | GatewayError::InvalidRequest(_)
            | GatewayError::LlmGenerationFailed(_) => StatusCode::BAD_REQUEST,
            GatewayError::DatabaseNotFound | GatewayError::MetadataNotFound => StatusCode::NOT_FOUND,
            GatewayError::QueryFailed(_)
            | GatewayError::LlmNotConfigured(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code carried in the error body
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidDatabaseName(_) => "INVALID_DATABASE_NAME",
            GatewayError::InvalidConnection(_) => "INVALID_CONNECTION",
            GatewayError::DatabaseNotFound => "DATABASE_NOT_FOUND",
            GatewayError::MetadataNotFound => "METADATA_NOT_FOUND",
            GatewayError::InvalidSql(_) => "INVALID_SQL",
            GatewayError::QueryFailed(_) => "QUERY_FAILED",
            GatewayError::InvalidRequest(_) => "INVALID_REQUEST",
            GatewayError::LlmNotConfigured(_) => "LLM_NOT_CONFIGURED",
            GatewayError::LlmGenerationFailed(_) => "LLM_GENERATION_FAILED",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<ExecutorError> for GatewayError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Guard(e) => GatewayError::InvalidSql(e),
            other => GatewayError::QueryFailed(other.to_string()),
        }
    }
}

impl From<TranslateError> for GatewayError {
    fn from(err: TranslateError) -> Self {
        match err {
            TranslateError::NotConfigured => GatewayError::LlmNotConfigured(err.to_string()),
            TranslateError::PromptRequired => GatewayError::InvalidRequest(err.to_string()),
            TranslateError::LlmRequestFailed(_) | TranslateError::GeneratedSqlInvalid(_) => {
                GatewayError::LlmGenerationFailed(err.to_string())
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    message: String,
    code: &'static str,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            GatewayError::Internal(e) => {
                log::error!("Internal error: {:#}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                message,
                code: self.code(),
            },
        };
        (status, Json(body)).into_response()
    }
}
