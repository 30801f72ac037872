//! API error handling
//!
//! Domain errors are folded into [`ApiError`] here so handlers can use `?`.
//! Storage and provider failures are logged in full and answered with a
//! generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use core_kernel::{MoneyError, PortError};
use domain_banking::ReconciliationError;
use domain_building::BuildingError;
use domain_payments::LedgerError;
use domain_projects::ProjectError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    /// Never says whether the resource exists
    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Archived: {0}")]
    Archived(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ApiError {
    /// Status code and stable error code
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::Archived(_) => (StatusCode::CONFLICT, "archived"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            ApiError::InvalidAllocation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_allocation"),
            ApiError::ExternalService(_) => (StatusCode::BAD_GATEWAY, "external_service_error"),
            ApiError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Archived(msg)
            | ApiError::Validation(msg)
            | ApiError::InvalidAllocation(msg) => msg.clone(),
            ApiError::Unauthorized => "Unauthorized".to_string(),
            ApiError::Forbidden => "Access denied".to_string(),
            ApiError::ExternalService(_) => "The bank data provider is unavailable".to_string(),
            ApiError::ServiceUnavailable(_) => "Service temporarily unavailable".to_string(),
            ApiError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.public_message(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            PortError::Validation { .. } => ApiError::Validation(err.to_string()),
            PortError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            PortError::Connection { .. }
            | PortError::Timeout { .. }
            | PortError::ServiceUnavailable { .. }
            | PortError::RateLimited { .. } => ApiError::ServiceUnavailable(err.to_string()),
            PortError::Unauthorized { .. } | PortError::Internal { .. } => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<MoneyError> for ApiError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::InvalidAllocationInput(_) => ApiError::InvalidAllocation(err.to_string()),
            MoneyError::Overflow => ApiError::Internal(err.to_string()),
            _ => ApiError::Validation(err.to_string()),
        }
    }
}

impl From<BuildingError> for ApiError {
    fn from(err: BuildingError) -> Self {
        match err {
            BuildingError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            BuildingError::Validation { .. }
            | BuildingError::PermillageMismatch { .. }
            | BuildingError::InvalidIban(_) => ApiError::Validation(err.to_string()),
            BuildingError::Archived => ApiError::Archived(err.to_string()),
            BuildingError::InvalidTransition { .. } | BuildingError::Conflict(_) => {
                ApiError::Conflict(err.to_string())
            }
            BuildingError::Storage(port) => port.into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            LedgerError::Validation { .. } => ApiError::Validation(err.to_string()),
            LedgerError::InvalidTransition { .. } | LedgerError::Conflict(_) => {
                ApiError::Conflict(err.to_string())
            }
            LedgerError::ProjectArchived => ApiError::Archived(err.to_string()),
            LedgerError::Money(money) => money.into(),
            LedgerError::Storage(port) => port.into(),
        }
    }
}

impl From<ProjectError> for ApiError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ProjectError::Validation { .. } => ApiError::Validation(err.to_string()),
            ProjectError::InvalidAllocation(money) => money.into(),
            ProjectError::InvalidTransition { .. }
            | ProjectError::InvalidPaymentTransition { .. }
            | ProjectError::Conflict(_) => ApiError::Conflict(err.to_string()),
            ProjectError::ProjectArchived => ApiError::Archived(err.to_string()),
            ProjectError::Storage(port) => port.into(),
        }
    }
}

impl From<ReconciliationError> for ApiError {
    fn from(err: ReconciliationError) -> Self {
        match err {
            ReconciliationError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ReconciliationError::Validation { .. } => ApiError::Validation(err.to_string()),
            ReconciliationError::ObligationUnavailable => ApiError::Forbidden,
            ReconciliationError::InvalidTransition { .. } | ReconciliationError::Conflict(_) => {
                ApiError::Conflict(err.to_string())
            }
            ReconciliationError::ProjectArchived => ApiError::Archived(err.to_string()),
            ReconciliationError::ExternalService(port) => ApiError::ExternalService(port.to_string()),
            ReconciliationError::Ledger(ledger) => ledger.into(),
            ReconciliationError::Project(project) => project.into(),
            ReconciliationError::Storage(port) => port.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}
