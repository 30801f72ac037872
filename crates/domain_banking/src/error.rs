//! Reconciliation errors

use core_kernel::PortError;
use domain_payments::LedgerError;
use domain_projects::ProjectError;
use thiserror::Error;

use crate::transaction::MatchStatus;

#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// The obligation is missing or owned by another building; callers
    /// cannot tell which
    #[error("Obligation is not available to this transaction")]
    ObligationUnavailable,

    #[error("Cannot move transaction from {from} to {to}")]
    InvalidTransition { from: MatchStatus, to: MatchStatus },

    #[error("Building is archived")]
    ProjectArchived,

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    /// The bank data provider failed after retries
    #[error("Bank data provider error: {0}")]
    ExternalService(PortError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error("Storage error: {0}")]
    Storage(PortError),
}

impl ReconciliationError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ReconciliationError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<PortError> for ReconciliationError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => ReconciliationError::NotFound {
                entity: entity_type,
                id,
            },
            PortError::Validation { message, field } => ReconciliationError::Validation {
                field: field.unwrap_or_else(|| "input".to_string()),
                message,
            },
            PortError::Conflict { message } => ReconciliationError::Conflict(message),
            other => ReconciliationError::Storage(other),
        }
    }
}
