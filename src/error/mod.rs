use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::notification::StoreError;
use crate::provider::RegistryError;
use crate::scheduler::SchedulerError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    AlreadyRunning(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => AppError::NotFound(format!("notification {}", id)),
            other => AppError::Storage(other.to_string()),
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(id) => AppError::NotFound(format!("provider {}", id)),
            RegistryError::DuplicateDefault { .. } => AppError::Conflict(e.to_string()),
            RegistryError::InvalidProvider(_) | RegistryError::InvalidConfig(_) => {
                AppError::Validation(e.to_string())
            }
        }
    }
}

impl From<SchedulerError> for AppError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::AlreadyRunning => AppError::AlreadyRunning(e.to_string()),
            SchedulerError::InvalidCadence(_) => AppError::Validation(e.to_string()),
            SchedulerError::Stopped => AppError::Internal(e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String, String) {
        match self {
            AppError::Config(e) => {
                let log_msg = e.to_string();
                let client_msg = if is_production() {
                    "Configuration error".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", client_msg, log_msg)
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                msg.clone(),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                msg.clone(),
                msg.clone(),
            ),
            AppError::AlreadyRunning(msg) => (
                StatusCode::CONFLICT,
                "ALREADY_RUNNING",
                msg.clone(),
                msg.clone(),
            ),
            AppError::Storage(e) => {
                let client_msg = if is_production() {
                    "Notification storage unavailable".to_string()
                } else {
                    e.clone()
                };
                (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_ERROR", client_msg, e.clone())
            }
            AppError::Internal(e) => {
                let client_msg = if is_production() {
                    "Internal server error".to_string()
                } else {
                    e.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", client_msg, e.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, client_message, log_message) = self.parts();

        if status.is_server_error() {
            tracing::error!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API error"
            );
        } else {
            tracing::debug!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API request rejected"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_status() {
        let err: AppError = StoreError::NotFound("n-1".to_string()).into();
        assert_eq!(err.parts().0, StatusCode::NOT_FOUND);

        let err: AppError = StoreError::Unavailable("pool closed".to_string()).into();
        let (status, code, _, _) = err.parts();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "STORAGE_ERROR");
    }

    #[test]
    fn test_already_running_is_conflict() {
        let err: AppError = SchedulerError::AlreadyRunning.into();
        let (status, code, message, _) = err.parts();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "ALREADY_RUNNING");
        assert_eq!(message, "a digest cycle is already running");
    }

    #[test]
    fn test_registry_errors() {
        let err: AppError = RegistryError::InvalidProvider("name is required".to_string()).into();
        assert_eq!(err.parts().0, StatusCode::BAD_REQUEST);

        let err: AppError = RegistryError::NotFound("p9".to_string()).into();
        assert_eq!(err.parts().0, StatusCode::NOT_FOUND);
    }
}
