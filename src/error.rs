//! Application error type and its mapping onto HTTP responses.
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::store::StoreError;

/// Errors surfaced by request handlers.
///
/// Every handler returns `Result<_, AppError>`; the variant decides the status
/// code and the message the client sees.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// Unknown email, wrong password or an OAuth-only account. All three look
    /// the same to the client.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, invalid or expired token, or an account that may not sign in.
    #[error("{0}")]
    Auth(String),

    /// Authenticated, but not allowed to call the route.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// A store call failed. `operation` names what was being attempted.
    #[error("failed to {operation}: {source}")]
    Store {
        operation: &'static str,
        source: StoreError,
    },

    /// A collaborator outside the database failed, e.g. mail delivery.
    #[error("failed to {operation}: {source:#}")]
    External {
        operation: &'static str,
        source: anyhow::Error,
    },

    /// Anything else: hashing, token signing.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store { .. } | AppError::External { .. } | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Store { operation, .. } | AppError::External { operation, .. } => {
                format!("Failed to {operation}")
            }
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = Json(json!({
            "success": false,
            "message": self.public_message(),
        }));
        (status, body).into_response()
    }
}

// Body and path extraction failures keep the JSON error envelope.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(reason = %rejection.body_text(), "rejected request body");
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        warn!(reason = %rejection.body_text(), "rejected path parameter");
        AppError::Validation(rejection.body_text())
    }
}

/// Attach the attempted operation to a store failure.
pub trait StoreResultExt<T> {
    fn during(self, operation: &'static str) -> Result<T, AppError>;
}

impl<T> StoreResultExt<T> for Result<T, StoreError> {
    fn during(self, operation: &'static str) -> Result<T, AppError> {
        self.map_err(|source| AppError::Store { operation, source })
    }
}
