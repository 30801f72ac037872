//! Ledger errors

use core_kernel::{MoneyError, PeriodError, PortError};
use thiserror::Error;

use crate::status::PaymentStatus;

/// Errors that can occur while writing or reading the payment ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Cannot change payment from {from} to {to}")]
    InvalidTransition { from: PaymentStatus, to: PaymentStatus },

    /// Writes against an archived building or project
    #[error("Building or project is archived")]
    ProjectArchived,

    /// A concurrent write moved the row to a state the write is not allowed from
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error("Storage error: {0}")]
    Storage(PortError),
}

impl LedgerError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        LedgerError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<PortError> for LedgerError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => LedgerError::NotFound {
                entity: entity_type,
                id,
            },
            PortError::Validation { message, field } => LedgerError::Validation {
                field: field.unwrap_or_else(|| "input".to_string()),
                message,
            },
            PortError::Conflict { message } => LedgerError::Conflict(message),
            other => LedgerError::Storage(other),
        }
    }
}

impl From<PeriodError> for LedgerError {
    fn from(err: PeriodError) -> Self {
        let field = match err {
            PeriodError::InvalidYear(_) => "year",
            PeriodError::InvalidRange { .. } => "end_month",
            PeriodError::InvalidMonth(_) => "month",
        };
        LedgerError::validation(field, err.to_string())
    }
}
