//! Request handlers
//!
//! Each handler resolves the owning building, checks the caller against it,
//! then delegates to a domain service.

pub mod banking;
pub mod buildings;
pub mod health;
pub mod payments;
pub mod projects;

use validator::Validate;

use crate::error::ApiError;

/// Runs `validator` rules on a request body
pub(crate) fn validated<T: Validate>(request: T) -> Result<T, ApiError> {
    request.validate()?;
    Ok(request)
}
