//! Project domain errors

use core_kernel::{MoneyError, PeriodError, PortError};
use domain_payments::PaymentStatus;
use thiserror::Error;

use crate::project::ProjectStatus;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// The apartment snapshot cannot carry the budget
    #[error(transparent)]
    InvalidAllocation(#[from] MoneyError),

    #[error("Cannot move project from {from} to {to}")]
    InvalidTransition { from: ProjectStatus, to: ProjectStatus },

    #[error("Cannot change installment from {from} to {to}")]
    InvalidPaymentTransition { from: PaymentStatus, to: PaymentStatus },

    /// Writes against an archived project or building
    #[error("Project is archived")]
    ProjectArchived,

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(PortError),
}

impl ProjectError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ProjectError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<PortError> for ProjectError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => ProjectError::NotFound {
                entity: entity_type,
                id,
            },
            PortError::Validation { message, field } => ProjectError::Validation {
                field: field.unwrap_or_else(|| "input".to_string()),
                message,
            },
            PortError::Conflict { message } => ProjectError::Conflict(message),
            other => ProjectError::Storage(other),
        }
    }
}

impl From<PeriodError> for ProjectError {
    fn from(err: PeriodError) -> Self {
        let field = match err {
            PeriodError::InvalidYear(_) => "start_year",
            _ => "start_month",
        };
        ProjectError::validation(field, err.to_string())
    }
}
