use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

pub type AppResult<T> = Result<T, AppError>;

/// Every failure a request can end in. Handlers never build status codes by hand.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Internal(e) => error!(error = ?e, "request failed"),
            AppError::Unauthorized(m) | AppError::Forbidden(m) => {
                warn!(%status, reason = %m, "request rejected")
            }
            _ => debug!(%status, reason = %self, "request rejected"),
        }
        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_the_error_taxonomy() {
        assert_eq!(AppError::InvalidInput("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_pass_the_underlying_message_through() {
        let err = AppError::Internal(anyhow::anyhow!("connection reset").context("load task"));
        assert_eq!(err.to_string(), "load task: connection reset");
    }
}
