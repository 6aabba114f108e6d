//! Session assertion issuance and verification.
//!
//! Sessions are stateless HS256 JWTs carrying the internal user id and an
//! expiry, independent of Google's tokens. Verification is signature plus
//! expiry only; no database access happens here.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::warn;

use super::models::Claims;
use crate::common::ApiError;

/// Session validity window
pub const SESSION_TTL_HOURS: i64 = 1;

/// Issue a session JWT for an authenticated user
pub fn issue_session(user_id: &str, secret: &str) -> Result<String, ApiError> {
    let exp = (Utc::now() + Duration::hours(SESSION_TTL_HOURS)).timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        warn!(error = %e, "Session JWT encoding failed");
        ApiError::InternalServer("session issuance failed".to_string())
    })
}

/// Verify a session JWT and return its claims
pub fn verify_session(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        warn!(error = %e, "Session JWT validation failed");
        ApiError::Unauthorized("invalid or expired session".to_string())
    })?;

    Ok(token_data.claims)
}
