// src/services/tokens.rs
//! Token lifecycle manager.
//!
//! Single gate for every Google API call: handlers ask
//! [`TokenService::get_live_access_token`] for a live token and never touch
//! the stored pair directly. The same service owns the authorization-code
//! exchange and revocation, so all connection state transitions go through
//! one place.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{Duration, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::models::User;
use crate::common::{safe_token_log, ApiError};
use crate::services::credentials::CredentialService;
use crate::services::google::{GoogleError, OAuthProvider};

/// Refresh this long before true expiry, so a token can't expire mid-flight
/// during the downstream provider call.
pub const REFRESH_SKEW_MINUTES: i64 = 5;

#[derive(Debug, Error)]
pub enum TokenError {
    /// No usable credential and none recoverable; only the interactive
    /// login flow can fix this.
    #[error("re-authentication required")]
    ReauthRequired,

    #[error("user not found")]
    UserNotFound,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::ReauthRequired | TokenError::UserNotFound => ApiError::ReauthRequired,
            TokenError::Database(e) => ApiError::DatabaseError(e),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("provider exchange failed: {0}")]
    Provider(#[from] GoogleError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Outcome of a revocation: local state is always cleared, remote
/// revocation may have partially failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    Complete,
    Partial,
}

pub struct TokenService {
    credentials: Arc<CredentialService>,
    provider: Arc<dyn OAuthProvider>,
    // Per-user refresh locks, created lazily. Keeps concurrent requests for
    // the same user from racing each other to Google's token endpoint.
    refresh_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TokenService {
    pub fn new(credentials: Arc<CredentialService>, provider: Arc<dyn OAuthProvider>) -> Self {
        Self {
            credentials,
            provider,
            refresh_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Return an access token that is valid for at least the skew window,
    /// refreshing transparently when the stored one is missing or stale.
    ///
    /// Refresh failures are never retried here: a failed refresh almost
    /// always means the refresh token itself was revoked or expired
    /// server-side, and only a new interactive login can recover.
    pub async fn get_live_access_token(&self, user_id: &str) -> Result<String, TokenError> {
        let user = self
            .credentials
            .find_by_id(user_id)
            .await?
            .ok_or(TokenError::UserNotFound)?;

        if let Some(token) = usable_token(&user) {
            return Ok(token);
        }

        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        // A concurrent request may have finished the refresh while we waited
        // on the lock; reuse its result instead of refreshing again.
        let user = self
            .credentials
            .find_by_id(user_id)
            .await?
            .ok_or(TokenError::UserNotFound)?;

        if let Some(token) = usable_token(&user) {
            debug!(user_id = %user_id, "Token was refreshed by a concurrent request");
            return Ok(token);
        }

        let Some(refresh_token) = user.refresh_token else {
            debug!(
                user_id = %user_id,
                "No refresh token stored; interactive login required"
            );
            return Err(TokenError::ReauthRequired);
        };

        match self.provider.refresh_token(&refresh_token).await {
            Ok(tokens) => {
                self.credentials.apply_refresh(user_id, &tokens).await?;
                info!(
                    user_id = %user_id,
                    token = %safe_token_log(&tokens.access_token),
                    "Access token refreshed"
                );
                Ok(tokens.access_token)
            }
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    error = %e,
                    "Token refresh failed; forcing re-authentication"
                );
                Err(TokenError::ReauthRequired)
            }
        }
    }

    /// One-shot authorization-code flow: exchange the code, verify the
    /// returned identity, then create-or-update the credential row.
    ///
    /// Identity verification happens before any database write, so a token
    /// minted for another application never touches the store.
    pub async fn exchange_code(&self, code: &str) -> Result<User, ExchangeError> {
        let tokens = self.provider.exchange_code(code).await?;

        let id_token = tokens.id_token.as_deref().ok_or_else(|| {
            GoogleError::IdentityVerificationFailed("token response missing id_token".to_string())
        })?;
        let claims = self.provider.verify_id_token(id_token).await?;

        let user = self
            .credentials
            .upsert_from_exchange(&claims, &tokens)
            .await?;

        info!(
            user_id = %user.id,
            has_refresh_token = user.refresh_token.is_some(),
            "Authorization code exchange completed"
        );

        Ok(user)
    }

    /// Revoke the stored token pair.
    ///
    /// Each non-null token is revoked remotely on its own; one failing must
    /// not stop the other attempt. The local columns are cleared no matter
    /// what, so a user is locked out locally even when Google is down.
    pub async fn revoke(&self, user_id: &str) -> Result<RevokeOutcome, TokenError> {
        let user = self
            .credentials
            .find_by_id(user_id)
            .await?
            .ok_or(TokenError::UserNotFound)?;

        let mut remote_failures = 0usize;
        for token in [user.access_token.as_deref(), user.refresh_token.as_deref()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = self.provider.revoke_token(token).await {
                warn!(
                    user_id = %user_id,
                    token = %safe_token_log(token),
                    error = %e,
                    "Remote revocation failed; local tokens will still be cleared"
                );
                remote_failures += 1;
            }
        }

        self.credentials.clear_tokens(user_id).await?;

        if remote_failures == 0 {
            Ok(RevokeOutcome::Complete)
        } else {
            Ok(RevokeOutcome::Partial)
        }
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .refresh_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// The stored token is usable when it exists and its expiry is more than
/// the skew window away. Expiry is checked, not just presence.
fn usable_token(user: &User) -> Option<String> {
    let token = user.access_token.as_ref()?;
    let expires_at = user.token_expiry()?;
    if expires_at - Utc::now() > Duration::minutes(REFRESH_SKEW_MINUTES) {
        Some(token.clone())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::migrations::run_migrations;
    use crate::services::google::{IdentityClaims, TokenResponse};
    use async_trait::async_trait;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Recording provider stub. A `None` result field makes that operation
    /// fail; `revoke_failures` lists tokens whose remote revoke fails.
    #[derive(Default)]
    struct MockProvider {
        exchange_result: Option<TokenResponse>,
        identity: Option<IdentityClaims>,
        refresh_result: Option<TokenResponse>,
        revoke_failures: Vec<String>,
        exchange_calls: AtomicUsize,
        verify_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
        revoke_calls: AtomicUsize,
    }

    #[async_trait]
    impl OAuthProvider for MockProvider {
        async fn exchange_code(&self, _code: &str) -> Result<TokenResponse, GoogleError> {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            self.exchange_result
                .clone()
                .ok_or_else(|| GoogleError::ExchangeFailed("mock exchange failure".to_string()))
        }

        async fn verify_id_token(&self, _id_token: &str) -> Result<IdentityClaims, GoogleError> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            self.identity.clone().ok_or_else(|| {
                GoogleError::IdentityVerificationFailed("token audience mismatch".to_string())
            })
        }

        async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenResponse, GoogleError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.refresh_result
                .clone()
                .ok_or_else(|| GoogleError::RefreshFailed("mock refresh failure".to_string()))
        }

        async fn revoke_token(&self, token: &str) -> Result<(), GoogleError> {
            self.revoke_calls.fetch_add(1, Ordering::SeqCst);
            if self.revoke_failures.iter().any(|t| t == token) {
                Err(GoogleError::RevokeFailed("mock revoke failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn token_response(access: &str, refresh: Option<&str>, expires_in: i64) -> TokenResponse {
        TokenResponse {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_in,
            id_token: Some("mock-id-token".to_string()),
            token_type: Some("Bearer".to_string()),
            scope: None,
        }
    }

    fn identity(sub: &str) -> IdentityClaims {
        IdentityClaims {
            sub: sub.to_string(),
            email: "alice@example.com".to_string(),
            name: Some("Alice".to_string()),
            picture: None,
        }
    }

    async fn setup(provider: MockProvider) -> (Arc<CredentialService>, Arc<MockProvider>, TokenService) {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();

        let credentials = Arc::new(CredentialService::new(pool));
        let provider = Arc::new(provider);
        let service = TokenService::new(credentials.clone(), provider.clone());
        (credentials, provider, service)
    }

    async fn seed_user(
        credentials: &CredentialService,
        access: &str,
        refresh: Option<&str>,
        expires_in: i64,
    ) -> User {
        credentials
            .upsert_from_exchange(&identity("sub-1"), &token_response(access, refresh, expires_in))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_token_returned_without_refresh() {
        let (credentials, provider, service) = setup(MockProvider::default()).await;
        let user = seed_user(&credentials, "A1", Some("R1"), 3600).await;

        let token = service.get_live_access_token(&user.id).await.unwrap();

        assert_eq!(token, "A1");
        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_token_within_skew_triggers_refresh() {
        // 60s until expiry is inside the 5-minute skew window
        let (credentials, provider, service) = setup(MockProvider {
            refresh_result: Some(token_response("A2", None, 3600)),
            ..Default::default()
        })
        .await;
        let user = seed_user(&credentials, "A1", Some("R1"), 60).await;

        let token = service.get_live_access_token(&user.id).await.unwrap();

        assert_eq!(token, "A2");
        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_and_persists_before_returning() {
        // Expired one second ago, refresh token "R1", provider returns a new
        // access token with no new refresh token
        let (credentials, provider, service) = setup(MockProvider {
            refresh_result: Some(token_response("A2", None, 3600)),
            ..Default::default()
        })
        .await;
        let user = seed_user(&credentials, "A1", Some("R1"), -1).await;

        let token = service.get_live_access_token(&user.id).await.unwrap();
        assert_eq!(token, "A2");
        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 1);

        let stored = credentials.find_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.access_token.as_deref(), Some("A2"));
        assert_eq!(stored.refresh_token.as_deref(), Some("R1"));

        let delta = stored.token_expiry().unwrap() - Utc::now();
        assert!(delta > Duration::seconds(3500));
        assert!(delta <= Duration::seconds(3600));
    }

    #[tokio::test]
    async fn test_no_refresh_token_returns_reauth_without_outbound_call() {
        let (credentials, provider, service) = setup(MockProvider::default()).await;
        let user = seed_user(&credentials, "A1", None, -1).await;

        let err = service.get_live_access_token(&user.id).await.unwrap_err();

        assert!(matches!(err, TokenError::ReauthRequired));
        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disconnected_user_returns_reauth_immediately() {
        let (credentials, provider, service) = setup(MockProvider::default()).await;
        let user = seed_user(&credentials, "A1", None, 3600).await;
        credentials.clear_tokens(&user.id).await.unwrap();

        let err = service.get_live_access_token(&user.id).await.unwrap_err();

        assert!(matches!(err, TokenError::ReauthRequired));
        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_user_returns_user_not_found() {
        let (_credentials, _provider, service) = setup(MockProvider::default()).await;

        let err = service.get_live_access_token("U_MISSING").await.unwrap_err();

        assert!(matches!(err, TokenError::UserNotFound));
    }

    #[tokio::test]
    async fn test_refresh_failure_maps_to_reauth_and_is_not_retried() {
        let (credentials, provider, service) = setup(MockProvider::default()).await;
        let user = seed_user(&credentials, "A1", Some("R1"), -1).await;

        let err = service.get_live_access_token(&user.id).await.unwrap_err();

        assert!(matches!(err, TokenError::ReauthRequired));
        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_hits_provider_once() {
        let (credentials, provider, service) = setup(MockProvider {
            refresh_result: Some(token_response("A2", None, 3600)),
            ..Default::default()
        })
        .await;
        let user = seed_user(&credentials, "A1", Some("R1"), -1).await;

        let service = Arc::new(service);
        let (a, b) = tokio::join!(
            {
                let service = service.clone();
                let id = user.id.clone();
                async move { service.get_live_access_token(&id).await }
            },
            {
                let service = service.clone();
                let id = user.id.clone();
                async move { service.get_live_access_token(&id).await }
            }
        );

        assert_eq!(a.unwrap(), "A2");
        assert_eq!(b.unwrap(), "A2");
        // The loser of the race must reuse the winner's persisted token
        assert_eq!(provider.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exchange_creates_user_and_repeat_updates_in_place() {
        let (credentials, _provider, service) = setup(MockProvider {
            exchange_result: Some(token_response("A1", Some("R1"), 3600)),
            identity: Some(identity("sub-1")),
            ..Default::default()
        })
        .await;

        let first = service.exchange_code("code-1").await.unwrap();
        let second = service.exchange_code("code-2").await.unwrap();

        assert_eq!(first.id, second.id);

        let stored = credentials.find_by_id(&first.id).await.unwrap().unwrap();
        assert_eq!(stored.google_sub, "sub-1");
    }

    #[tokio::test]
    async fn test_exchange_identity_failure_writes_nothing() {
        // verify_id_token fails (audience mismatch); no row may be created
        let (credentials, provider, service) = setup(MockProvider {
            exchange_result: Some(token_response("A1", Some("R1"), 3600)),
            identity: None,
            ..Default::default()
        })
        .await;

        let err = service.exchange_code("code-1").await.unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Provider(GoogleError::IdentityVerificationFailed(_))
        ));
        assert_eq!(provider.verify_calls.load(Ordering::SeqCst), 1);

        let missing = credentials.find_by_google_sub("sub-1").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_exchange_provider_failure_is_terminal() {
        let (_credentials, provider, service) = setup(MockProvider::default()).await;

        let err = service.exchange_code("code-1").await.unwrap_err();

        assert!(matches!(
            err,
            ExchangeError::Provider(GoogleError::ExchangeFailed(_))
        ));
        // Exactly one attempt, no retry
        assert_eq!(provider.exchange_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exchange_missing_id_token_fails_verification() {
        let mut tokens = token_response("A1", Some("R1"), 3600);
        tokens.id_token = None;
        let (_credentials, provider, service) = setup(MockProvider {
            exchange_result: Some(tokens),
            identity: Some(identity("sub-1")),
            ..Default::default()
        })
        .await;

        let err = service.exchange_code("code-1").await.unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Provider(GoogleError::IdentityVerificationFailed(_))
        ));
        assert_eq!(provider.verify_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_revoke_with_no_tokens_is_complete_and_makes_no_calls() {
        let (credentials, provider, service) = setup(MockProvider::default()).await;
        let user = seed_user(&credentials, "A1", Some("R1"), 3600).await;
        credentials.clear_tokens(&user.id).await.unwrap();

        let outcome = service.revoke(&user.id).await.unwrap();

        assert_eq!(outcome, RevokeOutcome::Complete);
        assert_eq!(provider.revoke_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_revoke_clears_locally_even_when_remote_partially_fails() {
        // Remote revoke of the access token fails; refresh token succeeds
        let (credentials, provider, service) = setup(MockProvider {
            revoke_failures: vec!["A1".to_string()],
            ..Default::default()
        })
        .await;
        let user = seed_user(&credentials, "A1", Some("R1"), 3600).await;

        let outcome = service.revoke(&user.id).await.unwrap();

        assert_eq!(outcome, RevokeOutcome::Partial);
        // One failed attempt must not block the other
        assert_eq!(provider.revoke_calls.load(Ordering::SeqCst), 2);

        let stored = credentials.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(stored.access_token.is_none());
        assert!(stored.refresh_token.is_none());
        assert!(stored.token_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_revoke_both_tokens_successfully() {
        let (credentials, provider, service) = setup(MockProvider::default()).await;
        let user = seed_user(&credentials, "A1", Some("R1"), 3600).await;

        let outcome = service.revoke(&user.id).await.unwrap();

        assert_eq!(outcome, RevokeOutcome::Complete);
        assert_eq!(provider.revoke_calls.load(Ordering::SeqCst), 2);

        let stored = credentials.find_by_id(&user.id).await.unwrap().unwrap();
        assert!(stored.access_token.is_none());
    }
}
