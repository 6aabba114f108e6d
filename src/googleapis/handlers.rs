//! Google API proxy handlers
//!
//! Every handler here follows the same contract: obtain a live access token
//! from the token service first, make exactly one outbound call with it, and
//! translate the response into this API's JSON shape. Handlers never cache
//! tokens or reuse one obtained for an earlier request.

use axum::extract::Extension;
use axum::Json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, warn};

use crate::auth::AuthedUser;
use crate::common::{ApiError, AppState};

const CONTACTS_URL: &str = "https://people.googleapis.com/v1/people/me/connections";
const GMAIL_MESSAGES_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages";
const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const PHOTOS_ALBUMS_URL: &str = "https://photoslibrary.googleapis.com/v1/albums";

/// One authenticated GET against a Google resource API.
///
/// Downstream 401/403 means the token was rejected despite having just been
/// issued or validated, so the user has to re-authenticate.
async fn google_get(
    state: &AppState,
    user_id: &str,
    url: &str,
    query: &[(&str, &str)],
) -> Result<serde_json::Value, ApiError> {
    let access_token = state.tokens.get_live_access_token(user_id).await?;

    let response = state
        .http
        .get(url)
        .query(query)
        .bearer_auth(&access_token)
        .send()
        .await
        .map_err(|e| {
            error!(error = %e, url = %url, "Google API request failed to send");
            ApiError::ServiceUnavailable("google api unreachable".to_string())
        })?;

    let status = response.status();
    match status.as_u16() {
        401 | 403 => {
            warn!(status = %status, url = %url, user_id = %user_id, "Google API rejected the access token");
            Err(ApiError::ReauthRequired)
        }
        s if !(200..300).contains(&s) => {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, url = %url, error = %error_text, "Google API request failed");
            Err(ApiError::InternalServer(
                "google api request failed".to_string(),
            ))
        }
        _ => response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ApiError::InternalServer(format!("malformed google response: {}", e))),
    }
}

/// GET /api/google/contacts
pub async fn contacts_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let body = google_get(
        &state,
        &authed.id,
        CONTACTS_URL,
        &[
            ("personFields", "names,emailAddresses,photos"),
            ("pageSize", "100"),
        ],
    )
    .await?;

    let contacts: Vec<serde_json::Value> = body
        .get("connections")
        .and_then(|v| v.as_array())
        .map(|conns| {
            conns
                .iter()
                .map(|person| {
                    serde_json::json!({
                        "name": person.pointer("/names/0/displayName"),
                        "email": person.pointer("/emailAddresses/0/value"),
                        "photo": person.pointer("/photos/0/url"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Json(serde_json::json!({
        "contacts": contacts,
        "total": body.get("totalItems").cloned().unwrap_or(serde_json::json!(contacts.len())),
    })))
}

/// GET /api/google/gmail/messages
pub async fn gmail_messages_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let body = google_get(
        &state,
        &authed.id,
        GMAIL_MESSAGES_URL,
        &[("maxResults", "25")],
    )
    .await?;

    Ok(Json(serde_json::json!({
        "messages": body.get("messages").cloned().unwrap_or(serde_json::json!([])),
        "estimate": body.get("resultSizeEstimate").cloned().unwrap_or(serde_json::json!(0)),
    })))
}

/// GET /api/google/drive/files
pub async fn drive_files_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let body = google_get(
        &state,
        &authed.id,
        DRIVE_FILES_URL,
        &[
            ("pageSize", "25"),
            ("fields", "files(id,name,mimeType,modifiedTime,webViewLink)"),
        ],
    )
    .await?;

    Ok(Json(serde_json::json!({
        "files": body.get("files").cloned().unwrap_or(serde_json::json!([])),
    })))
}

/// GET /api/google/photos/albums
pub async fn photos_albums_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let body = google_get(&state, &authed.id, PHOTOS_ALBUMS_URL, &[("pageSize", "25")]).await?;

    let albums: Vec<serde_json::Value> = body
        .get("albums")
        .and_then(|v| v.as_array())
        .map(|albums| {
            albums
                .iter()
                .map(|album| {
                    serde_json::json!({
                        "id": album.get("id"),
                        "title": album.get("title"),
                        "cover": album.get("coverPhotoBaseUrl"),
                        "item_count": album.get("mediaItemsCount"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Json(serde_json::json!({ "albums": albums })))
}
