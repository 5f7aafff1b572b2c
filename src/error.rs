//! Error types for Odonto server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric error codes returned to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NotFound = 4,
    BadValue = 5,
    Duplicate = 6,
    SlotUnavailable = 7,
    InvalidTransition = 8,
    InsufficientStock = 9,
    Downstream = 10,
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

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Slot unavailable: {0}")]
    SlotUnavailable(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Downstream service error: {0}")]
    Downstream(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and error code for this error
    pub fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
            AppError::Validation(_) | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue)
            }
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Duplicate),
            AppError::SlotUnavailable(_) => (StatusCode::CONFLICT, ErrorCode::SlotUnavailable),
            AppError::InvalidStateTransition(_) => {
                (StatusCode::CONFLICT, ErrorCode::InvalidTransition)
            }
            AppError::InsufficientStock(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::InsufficientStock)
            }
            AppError::Downstream(_) => (StatusCode::BAD_GATEWAY, ErrorCode::Downstream),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
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
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Downstream(msg) => {
                tracing::warn!("Downstream error: {}", msg);
                msg.clone()
            }
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::SlotUnavailable(msg)
            | AppError::BadRequest(msg)
            | AppError::InvalidStateTransition(msg)
            | AppError::InsufficientStock(msg) => msg.clone(),
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

/// Map a unique-constraint violation with `conflict`, keeping other database errors as-is
pub fn on_unique(err: sqlx::Error, conflict: impl FnOnce() -> AppError) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => conflict(),
        _ => AppError::Database(err),
    }
}

/// Map a unique-constraint violation to a duplicate conflict
pub fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    on_unique(err, || AppError::Conflict(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            AppError::Validation("x".into()).status_and_code().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict("x".into()).status_and_code().0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NotFound("x".into()).status_and_code().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InvalidStateTransition("x".into()).status_and_code(),
            (StatusCode::CONFLICT, ErrorCode::InvalidTransition)
        );
        assert_eq!(
            AppError::InsufficientStock("x".into()).status_and_code().0,
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_slot_unavailable_has_its_own_code() {
        let err = AppError::SlotUnavailable("taken".into());
        assert_eq!(
            err.status_and_code(),
            (StatusCode::CONFLICT, ErrorCode::SlotUnavailable)
        );
        assert_ne!(
            AppError::Conflict("x".into()).status_and_code().1,
            ErrorCode::SlotUnavailable
        );
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_internal_details_hidden() {
        let response = AppError::Internal("secret detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_non_unique_database_error_kept() {
        let err = conflict_on_unique(sqlx::Error::RowNotFound, "duplicate");
        assert!(matches!(err, AppError::Database(sqlx::Error::RowNotFound)));

        let err = on_unique(sqlx::Error::RowNotFound, || {
            AppError::SlotUnavailable("taken".into())
        });
        assert!(matches!(err, AppError::Database(sqlx::Error::RowNotFound)));
    }
}
