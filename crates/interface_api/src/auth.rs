//! Authentication and authorization
//!
//! Tokens carry the caller's role and the single building they belong to.
//! Every handler calls [`require_building_access`] before touching a
//! building's data, and mutations additionally call [`require_manager`].

use chrono::{Duration, Utc};
use core_kernel::{BuildingId, ResidentId};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ApiError;

/// Upper bound on token lifetime, one year
const MAX_EXPIRATION_SECS: u64 = 365 * 24 * 3600;

/// Caller role within a building
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Manager,
    Resident,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub role: Role,
    /// Building the caller belongs to
    pub building_id: BuildingId,
    /// Set for residents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resident_id: Option<ResidentId>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
}

/// Who a token is issued for
#[derive(Debug, Clone)]
pub struct Subject {
    pub user_id: String,
    pub role: Role,
    pub building_id: BuildingId,
    pub resident_id: Option<ResidentId>,
}

/// Creates a new JWT token
///
/// # Arguments
///
/// * `subject` - Caller identity and building membership
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(subject: Subject, secret: &str, expiration_secs: u64) -> Result<String, AuthError> {
    let now = Utc::now();
    let lifetime = expiration_secs.min(MAX_EXPIRATION_SECS) as i64;
    let exp = now + Duration::seconds(lifetime);

    let claims = Claims {
        sub: subject.user_id,
        role: subject.role,
        building_id: subject.building_id,
        resident_id: subject.resident_id,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Denies callers from other buildings
pub fn require_building_access(claims: &Claims, building_id: BuildingId) -> Result<(), ApiError> {
    if claims.building_id == building_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Denies callers who cannot mutate building data
pub fn require_manager(claims: &Claims) -> Result<(), ApiError> {
    match claims.role {
        Role::Manager => Ok(()),
        Role::Resident => Err(ApiError::Forbidden),
    }
}
