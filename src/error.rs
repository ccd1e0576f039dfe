use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use compute::error::{ComputeError, FieldErrors};
use sea_orm::{DbErr, SqlErr, TransactionError};
use tracing::{error, warn};

use crate::schemas::ErrorResponse;
use crate::storage::StorageError;

/// Message carried by every field-level validation failure.
pub const INVALID_DATA: &str = "The given data was invalid.";

/// Errors a request handler can end with. Each variant maps to one HTTP
/// status and one machine-readable code in [`ErrorResponse`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation { message: String, fields: FieldErrors },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// A validation failure on a single field.
    pub fn field(name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(name.into(), vec![message.into()]);
        ApiError::Validation {
            message: INVALID_DATA.to_string(),
            fields,
        }
    }

    pub fn not_found(what: &str, id: i32) -> Self {
        ApiError::NotFound(format!("{} with ID {} not found", what, id))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(err) if is_unique_violation(err) => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Storage(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Database(err) if is_unique_violation(err) => "CONFLICT",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

impl From<ComputeError> for ApiError {
    fn from(err: ComputeError) -> Self {
        match err {
            ComputeError::Database(db) => ApiError::Database(db),
            ComputeError::InvalidWindow { .. } => ApiError::field(
                "to_date",
                "The to date must be a date after or equal to from date.",
            ),
            ComputeError::Validation(fields) => ApiError::Validation {
                message: INVALID_DATA.to_string(),
                fields,
            },
        }
    }
}

impl From<TransactionError<ApiError>> for ApiError {
    fn from(err: TransactionError<ApiError>) -> Self {
        match err {
            TransactionError::Connection(db) => ApiError::Database(db),
            TransactionError::Transaction(inner) => inner,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        // Server-side failures are logged in full and reported generically.
        let message = match &self {
            ApiError::Database(err) if status == StatusCode::CONFLICT => {
                warn!("Unique constraint violated: {}", err);
                "The record conflicts with an existing one".to_string()
            }
            ApiError::Database(err) => {
                error!("Database error: {}", err);
                "Internal server error".to_string()
            }
            ApiError::Storage(err) => {
                error!("Storage error: {}", err);
                "Failed to store media".to_string()
            }
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let fields = match self {
            ApiError::Validation { fields, .. } => Some(fields),
            _ => None,
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            success: false,
            fields,
        };
        (status, Json(body)).into_response()
    }
}
