// src/services/google.rs
//! Google OAuth2 provider client.
//!
//! All outbound traffic to Google's token, tokeninfo and revoke endpoints
//! lives here. The rest of the system talks to this module through the
//! [`OAuthProvider`] trait so the token lifecycle can be tested without
//! network access.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("OAuth code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("Identity verification failed: {0}")]
    IdentityVerificationFailed(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Token revocation failed: {0}")]
    RevokeFailed(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Google OAuth client configuration, injected at startup
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Response from Google's token endpoint, for both the authorization-code
/// and refresh-token grants. `refresh_token` is only present when Google
/// decides to (re)issue one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub id_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Absolute expiry timestamp derived from `expires_in`
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(self.expires_in)
    }
}

/// Identity claims extracted from a verified id_token
#[derive(Debug, Clone)]
pub struct IdentityClaims {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Provider-side token lifecycle operations.
///
/// Implemented by [`GoogleClient`] in production and by recording stubs in
/// tests. None of these calls are retried; a failure is terminal for the
/// current request.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, GoogleError>;
    async fn verify_id_token(&self, id_token: &str) -> Result<IdentityClaims, GoogleError>;
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, GoogleError>;
    async fn revoke_token(&self, token: &str) -> Result<(), GoogleError>;
}

#[derive(Debug, Clone)]
pub struct GoogleClient {
    config: GoogleConfig,
    client: Client,
}

impl GoogleClient {
    pub fn new(config: GoogleConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { config, client }
    }

    /// Build the consent-screen URL the login endpoint redirects to.
    ///
    /// `access_type=offline` and `prompt=consent` force Google to issue a
    /// refresh token on every login, not only the first one.
    pub fn authorization_url(&self) -> String {
        let scopes = vec![
            "openid",
            "email",
            "profile",
            "https://www.googleapis.com/auth/contacts.readonly",
            "https://www.googleapis.com/auth/gmail.readonly",
            "https://www.googleapis.com/auth/drive.readonly",
            "https://www.googleapis.com/auth/photoslibrary.readonly",
        ];

        let scope_param = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            AUTH_URL,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&scope_param)
        )
    }
}

#[async_trait]
impl OAuthProvider for GoogleClient {
    /// Exchange a one-time authorization code for an initial token pair
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, GoogleError> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        debug!("Exchanging authorization code for tokens");

        let response = self
            .client
            .post(TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| GoogleError::ExchangeFailed(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Token exchange failed");
            return Err(GoogleError::ExchangeFailed(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| GoogleError::SerializationError(e.to_string()))
    }

    /// Verify an id_token against Google's tokeninfo endpoint
    ///
    /// The remote check covers the signature; audience and expiry are
    /// validated here against our configured client id.
    async fn verify_id_token(&self, id_token: &str) -> Result<IdentityClaims, GoogleError> {
        let response = self
            .client
            .get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| GoogleError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Google tokeninfo rejected id_token");
            return Err(GoogleError::IdentityVerificationFailed(format!(
                "tokeninfo returned HTTP {}",
                status
            )));
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| GoogleError::SerializationError(e.to_string()))?;

        // Audience must match our client id, otherwise this token was minted
        // for some other application.
        match body.get("aud").and_then(|v| v.as_str()) {
            Some(aud) if aud == self.config.client_id => {
                debug!("id_token audience validation successful");
            }
            Some(aud) => {
                warn!(
                    token_audience = %aud,
                    "id_token audience mismatch - rejecting token"
                );
                return Err(GoogleError::IdentityVerificationFailed(
                    "token audience mismatch".to_string(),
                ));
            }
            None => {
                return Err(GoogleError::IdentityVerificationFailed(
                    "token missing audience".to_string(),
                ));
            }
        }

        if let Some(exp) = body.get("exp").and_then(|v| v.as_str()) {
            let exp: i64 = exp.parse().unwrap_or(0);
            if exp < Utc::now().timestamp() {
                return Err(GoogleError::IdentityVerificationFailed(
                    "id_token has expired".to_string(),
                ));
            }
        }

        let sub = body
            .get("sub")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                GoogleError::IdentityVerificationFailed("token missing sub".to_string())
            })?;
        let email = body
            .get("email")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                GoogleError::IdentityVerificationFailed("token missing email".to_string())
            })?;
        let name = body
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let picture = body
            .get("picture")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(IdentityClaims {
            sub,
            email,
            name,
            picture,
        })
    }

    /// Mint a new access token from a stored refresh token
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, GoogleError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        debug!("Refreshing access token with Google OAuth");

        let response = self
            .client
            .post(TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send token refresh request");
                GoogleError::RefreshFailed(e.to_string())
            })?;

        let status = response.status();

        if !status.is_success() {
            // The raw body stays in the logs for diagnostics; the caller
            // only ever sees a ReauthRequired.
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                status = %status,
                error = %error_text,
                "Token refresh failed - refresh token is likely revoked or expired"
            );
            return Err(GoogleError::RefreshFailed(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| GoogleError::SerializationError(e.to_string()))
    }

    /// Tell Google to stop honoring a token
    async fn revoke_token(&self, token: &str) -> Result<(), GoogleError> {
        let response = self
            .client
            .post(REVOKE_URL)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| GoogleError::RevokeFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(status = %status, error = %error_text, "Remote token revocation failed");
            return Err(GoogleError::RevokeFailed(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        Ok(())
    }
}
