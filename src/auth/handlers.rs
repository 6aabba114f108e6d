//! Authentication handlers

use axum::extract::{Extension, Json, Query};
use axum::response::Redirect;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::extractors::AuthedUser;
use super::models::PreferencesPayload;
use super::session::issue_session;
use crate::common::{safe_email_log, ApiError, AppState};
use crate::services::google::GoogleError;
use crate::services::tokens::ExchangeError;
use crate::services::RevokeOutcome;

/// GET /auth/login
/// Redirects the browser to Google's consent screen
pub async fn login_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Result<Redirect, ApiError> {
    let state = state_lock.read().await;

    let auth_url = state.google.authorization_url();
    info!("Starting Google OAuth flow");

    Ok(Redirect::to(&auth_url))
}

/// GET /auth/callback?code=...
/// Exchanges the authorization code, then hands the frontend a session JWT
/// via the success redirect. Any failure sends the user back into the
/// interactive flow with an error indicator; exchange errors are terminal
/// and never retried here.
pub async fn callback_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Redirect, ApiError> {
    let state = state_lock.read().await.clone();

    if let Some(error) = params.get("error") {
        warn!(oauth_error = %error, "Google OAuth consent returned an error");
        return Ok(error_redirect(&state.frontend_url, "consent_denied"));
    }

    let code = match params.get("code") {
        Some(c) => c,
        None => {
            warn!("OAuth callback missing authorization code");
            return Ok(error_redirect(&state.frontend_url, "missing_code"));
        }
    };

    let user = match state.tokens.exchange_code(code).await {
        Ok(user) => user,
        Err(e) => {
            let reason = match &e {
                ExchangeError::Provider(GoogleError::IdentityVerificationFailed(_)) => {
                    "identity_verification_failed"
                }
                ExchangeError::Provider(_) => "exchange_failed",
                ExchangeError::Database(_) => "server_error",
            };
            error!(error = %e, reason = %reason, "Authorization code exchange failed");
            return Ok(error_redirect(&state.frontend_url, reason));
        }
    };

    let session = issue_session(&user.id, &state.jwt_secret)?;

    info!(
        user_id = %user.id,
        email = %safe_email_log(&user.email),
        "User authentication successful via Google OAuth"
    );

    Ok(Redirect::to(&format!(
        "{}/auth/success?token={}",
        state.frontend_url,
        urlencoding::encode(&session)
    )))
}

fn error_redirect(frontend_url: &str, reason: &str) -> Redirect {
    Redirect::to(&format!("{}/auth/error?reason={}", frontend_url, reason))
}

/// POST /auth/logout
/// Sessions are stateless JWTs held by the client; logout only confirms the
/// client-side discard and never touches the stored Google tokens.
pub async fn logout_handler(_authed: AuthedUser) -> Result<Json<serde_json::Value>, ApiError> {
    info!("User logout successful");
    let resp = serde_json::json!({
        "message": "Logout successful"
    });
    Ok(Json(resp))
}

/// POST /auth/disconnect
/// Revokes the Google connection. Local tokens are always cleared; a partial
/// remote failure is reported as a soft warning, not an error.
pub async fn disconnect_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let outcome = state.tokens.revoke(&authed.id).await?;

    let revoked = match outcome {
        RevokeOutcome::Complete => "complete",
        RevokeOutcome::Partial => "partial",
    };
    info!(user_id = %authed.id, revoked = %revoked, "Google connection disconnected");

    Ok(Json(serde_json::json!({
        "message": "Google connection removed",
        "revoked": revoked,
    })))
}

/// DELETE /auth/account
/// Revokes the Google connection, then deletes the user row and everything
/// keyed to it (notes, reminders).
pub async fn delete_account_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let outcome = state.tokens.revoke(&authed.id).await?;
    if outcome == RevokeOutcome::Partial {
        warn!(user_id = %authed.id, "Remote revocation partially failed during account deletion");
    }

    state
        .credentials
        .delete_account(&authed.id)
        .await
        .map_err(ApiError::DatabaseError)?;

    info!(user_id = %authed.id, "User account deleted");

    Ok(Json(serde_json::json!({
        "message": "Account deleted"
    })))
}

/// GET /api/me
/// Returns the current authenticated user's profile
pub async fn me_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let user = state
        .credentials
        .find_by_id(&authed.id)
        .await
        .map_err(ApiError::DatabaseError)?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    let google_connected = user.access_token.is_some() || user.refresh_token.is_some();

    Ok(Json(serde_json::json!({
        "user": user,
        "google_connected": google_connected,
    })))
}

/// PUT /api/me/preferences
/// Updates the two independent notification booleans
pub async fn update_preferences_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Json(payload): Json<PreferencesPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    state
        .credentials
        .update_preferences(&authed.id, payload.notify_email, payload.notify_push)
        .await
        .map_err(ApiError::DatabaseError)?;

    Ok(Json(serde_json::json!({
        "notify_email": payload.notify_email,
        "notify_push": payload.notify_push,
    })))
}
