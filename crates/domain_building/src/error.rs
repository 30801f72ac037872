//! Building domain errors

use core_kernel::PortError;
use thiserror::Error;

/// Errors that can occur in the building domain
#[derive(Debug, Error)]
pub enum BuildingError {
    /// A referenced building, apartment or IBAN does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Input failed validation
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Apartment permillage does not total the whole building
    #[error("Permillage totals {actual}, expected 1000")]
    PermillageMismatch { actual: u32 },

    /// Building is archived and accepts no writes
    #[error("Building is archived")]
    Archived,

    /// Building status change not allowed
    #[error("Cannot move building from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Malformed or checksum-invalid IBAN
    #[error("Invalid IBAN: {0}")]
    InvalidIban(String),

    /// The write conflicts with current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage failure
    #[error("Storage error: {0}")]
    Storage(PortError),
}

impl BuildingError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BuildingError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<PortError> for BuildingError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => BuildingError::NotFound {
                entity: entity_type,
                id,
            },
            PortError::Validation { message, field } => BuildingError::Validation {
                field: field.unwrap_or_else(|| "input".to_string()),
                message,
            },
            PortError::Conflict { message } => BuildingError::Conflict(message),
            other => BuildingError::Storage(other),
        }
    }
}
