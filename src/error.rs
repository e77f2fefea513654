use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// A payment would exceed what the player owes.
    #[error("payment of {amount} exceeds the outstanding balance of {outstanding}")]
    Overpayment { amount: u64, outstanding: u64 },
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Timeout { .. } => ServiceError::Timeout,
            StorageError::NotFound(id) => ServiceError::NotFound(format!("tournament {id}")),
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Payment needs confirmation because it would overpay.
    #[error("conflict: payment of {amount} exceeds the outstanding balance of {outstanding}")]
    Overpayment { amount: u64, outstanding: u64 },
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Storage did not answer in time.
    #[error("gateway timeout: {0}")]
    Timeout(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::Overpayment {
                amount,
                outstanding,
            } => AppError::Overpayment {
                amount,
                outstanding,
            },
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Timeout => AppError::Timeout("storage did not answer in time".into()),
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    message: String,
    /// Balance still owed, set on overpayment conflicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    outstanding: Option<u64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, outstanding) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            AppError::Conflict(_) => (StatusCode::CONFLICT, None),
            AppError::Overpayment { outstanding, .. } => (StatusCode::CONFLICT, Some(*outstanding)),
            AppError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, None),
            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, None),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
            outstanding,
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;

    #[test]
    fn storage_errors_map_to_service_taxonomy() {
        let timeout = ServiceError::from(StorageError::Timeout {
            operation: "write",
            after: Duration::from_secs(1),
        });
        assert!(matches!(timeout, ServiceError::Timeout));

        let missing = ServiceError::from(StorageError::NotFound(Uuid::nil()));
        assert!(matches!(missing, ServiceError::NotFound(_)));
    }

    #[test]
    fn overpayment_is_a_conflict() {
        let response = AppError::from(ServiceError::Overpayment {
            amount: 5_000,
            outstanding: 1_500,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn degraded_mode_is_unavailable() {
        let response = AppError::from(ServiceError::Degraded).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
