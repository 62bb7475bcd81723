use std::sync::Arc;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::NaiveDate;
use derive_more::Display;
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Display)]
pub enum AppError {
    #[display(fmt = "Database error: {}", _0)]
    Database(sqlx::Error),

    #[display(fmt = "Store error: {}", _0)]
    Store(String),

    #[display(fmt = "Serialization error: {}", _0)]
    Serialization(serde_json::Error),

    #[display(fmt = "Attendance already marked for student {} on {}", student_id, date)]
    AlreadyMarked { student_id: u64, date: NaiveDate },

    #[display(fmt = "{}", _0)]
    NotFound(String),

    #[display(fmt = "{}", _0)]
    BadRequest(String),

    #[display(fmt = "{}", _0)]
    Forbidden(String),

    #[display(fmt = "{}", _0)]
    Unauthorized(String),

    /// Error handed to every caller that waited on the same in-flight computation.
    #[display(fmt = "{}", _0)]
    Shared(Arc<AppError>),
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Database(e) => Some(e),
            AppError::Serialization(e) => Some(e),
            AppError::Shared(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e)
    }
}

impl From<Arc<AppError>> for AppError {
    fn from(shared: Arc<AppError>) -> Self {
        // Unwrap when this caller was the only waiter.
        Arc::try_unwrap(shared).unwrap_or_else(AppError::Shared)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AlreadyMarked { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Shared(inner) => inner.status_code(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(json!({
            "success": false,
            "message": message
        }))
    }
}
