//! Error types for the circulation server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Numeric error codes returned alongside every rejected request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NotFound = 4,
    InvalidState = 5,
    NoOpTransition = 6,
    InsufficientCopies = 7,
    DuplicateActiveLoan = 8,
    AlreadyPresent = 9,
    NotPresent = 10,
    ItemUnavailable = 11,
    ConsistencyViolation = 12,
    BadValue = 13,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("No-op transition: {0}")]
    NoOpTransition(String),

    #[error("Insufficient copies for item(s): {}", join_ids(.0))]
    InsufficientCopies(Vec<Uuid>),

    #[error("Item(s) already on an active loan: {}", join_ids(.0))]
    DuplicateActiveLoan(Vec<Uuid>),

    #[error("Item {0} is already in the basket")]
    AlreadyPresent(Uuid),

    #[error("Item {0} is not in the basket")]
    NotPresent(Uuid),

    #[error("Item(s) no longer available: {}", join_ids(.0))]
    ItemUnavailable(Vec<Uuid>),

    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Item or loan identifiers that caused the rejection
    pub fn offending_ids(&self) -> Vec<Uuid> {
        match self {
            AppError::InsufficientCopies(ids)
            | AppError::DuplicateActiveLoan(ids)
            | AppError::ItemUnavailable(ids) => ids.clone(),
            AppError::AlreadyPresent(id) | AppError::NotPresent(id) => vec![*id],
            _ => Vec::new(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
    /// Items or loans that caused the rejection
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Uuid>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
            AppError::InvalidState(_) => (StatusCode::CONFLICT, ErrorCode::InvalidState),
            AppError::NoOpTransition(_) => (StatusCode::CONFLICT, ErrorCode::NoOpTransition),
            AppError::InsufficientCopies(_) => {
                (StatusCode::CONFLICT, ErrorCode::InsufficientCopies)
            }
            AppError::DuplicateActiveLoan(_) => {
                (StatusCode::CONFLICT, ErrorCode::DuplicateActiveLoan)
            }
            AppError::AlreadyPresent(_) => (StatusCode::CONFLICT, ErrorCode::AlreadyPresent),
            AppError::NotPresent(_) => (StatusCode::NOT_FOUND, ErrorCode::NotPresent),
            AppError::ItemUnavailable(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::ItemUnavailable)
            }
            AppError::ConsistencyViolation(msg) => {
                tracing::error!("Consistency violation reached the API: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::ConsistencyViolation,
                )
            }
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure)
            }
        };

        let message = match &self {
            AppError::Database(_) => "Database error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
            items: self.offending_ids(),
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
