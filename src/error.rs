//! Error types for the circulation server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchRecord = 4,
    OutOfStock = 5,
    DebtLimitExceeded = 6,
    Duplicate = 7,
    IllegalState = 8,
    BadValue = 9,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Out of stock: {0}")]
    OutOfStock(String),

    #[error("Debt limit exceeded: {0}")]
    DebtLimitExceeded(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            match db.code().as_deref() {
                // unique_violation
                Some("23505") => return AppError::DuplicateKey(db.message().to_string()),
                // foreign_key_violation
                Some("23503") => {
                    return AppError::IllegalState(
                        "Record is still referenced by circulation transactions".to_string(),
                    )
                }
                // check_violation
                Some("23514") => return AppError::Validation(db.message().to_string()),
                // numeric_value_out_of_range, datetime_field_overflow
                Some("22003") | Some("22008") => {
                    return AppError::Validation(db.message().to_string())
                }
                _ => {}
            }
        }
        AppError::Database(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Authentication(_) | AppError::Authorization(_) => ErrorCode::NotAuthorized,
            AppError::NotFound(_) => ErrorCode::NoSuchRecord,
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::OutOfStock(_) => ErrorCode::OutOfStock,
            AppError::DebtLimitExceeded(_) => ErrorCode::DebtLimitExceeded,
            AppError::DuplicateKey(_) => ErrorCode::Duplicate,
            AppError::IllegalState(_) => ErrorCode::IllegalState,
            AppError::Database(_) => ErrorCode::DbFailure,
            AppError::Internal(_) => ErrorCode::Failure,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::OutOfStock(_)
            | AppError::DebtLimitExceeded(_)
            | AppError::DuplicateKey(_)
            | AppError::IllegalState(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::OutOfStock(msg)
            | AppError::DebtLimitExceeded(msg)
            | AppError::DuplicateKey(msg)
            | AppError::IllegalState(msg) => msg.clone(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circulation_errors_are_conflicts() {
        for err in [
            AppError::OutOfStock("x".into()),
            AppError::DebtLimitExceeded("x".into()),
            AppError::DuplicateKey("x".into()),
            AppError::IllegalState("x".into()),
        ] {
            assert_eq!(err.status(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::Validation("x".into()).code(), ErrorCode::BadValue);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::OutOfStock("x".into()).code() as u32, 5);
        assert_eq!(
            AppError::Authentication("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_non_database_sqlx_error_stays_database() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
