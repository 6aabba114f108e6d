//! Authentication data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Session JWT claims
#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// User database model, one row per Google account.
///
/// The token columns are the user's Google credential pair; they are never
/// serialized into API responses.
#[derive(FromRow, Serialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub google_sub: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing)]
    pub token_expires_at: Option<String>,
    pub notify_email: bool,
    pub notify_push: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl User {
    /// Parse the stored RFC3339 expiry, if any
    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.token_expires_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Payload for PUT /api/me/preferences
#[derive(Deserialize, Debug)]
pub struct PreferencesPayload {
    pub notify_email: bool,
    pub notify_push: bool,
}
