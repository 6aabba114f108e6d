//! Note CRUD handlers
//!
//! All queries are scoped to the authenticated user's id; a note id from
//! another user behaves exactly like a missing note.

use axum::extract::{Extension, Json, Path};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::models::{Note, NotePayload};
use crate::auth::AuthedUser;
use crate::common::{generate_note_id, ApiError, AppState};

/// GET /api/notes
pub async fn list_notes(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<Json<Vec<Note>>, ApiError> {
    let state = state_lock.read().await.clone();

    let notes = sqlx::query_as::<_, Note>(
        "SELECT * FROM notes WHERE user_id = ? ORDER BY updated_at DESC",
    )
    .bind(&authed.id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::DatabaseError)?;

    Ok(Json(notes))
}

/// POST /api/notes
pub async fn create_note(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Json(payload): Json<NotePayload>,
) -> Result<Json<Note>, ApiError> {
    let state = state_lock.read().await.clone();

    let id = generate_note_id();
    sqlx::query("INSERT INTO notes (id, user_id, title, body) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(&authed.id)
        .bind(payload.title.as_deref())
        .bind(payload.body.as_deref())
        .execute(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    let note = sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    info!(note_id = %note.id, user_id = %authed.id, "Note created");
    Ok(Json(note))
}

/// PUT /api/notes/:id
pub async fn update_note(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Path(id): Path<String>,
    Json(payload): Json<NotePayload>,
) -> Result<Json<Note>, ApiError> {
    let state = state_lock.read().await.clone();

    let result = sqlx::query(
        "UPDATE notes SET title = ?, body = ?, updated_at = datetime('now') WHERE id = ? AND user_id = ?",
    )
    .bind(payload.title.as_deref())
    .bind(payload.body.as_deref())
    .bind(&id)
    .bind(&authed.id)
    .execute(&state.db)
    .await
    .map_err(ApiError::DatabaseError)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("note not found".to_string()));
    }

    let note = sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    Ok(Json(note))
}

/// DELETE /api/notes/:id
pub async fn delete_note(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let result = sqlx::query("DELETE FROM notes WHERE id = ? AND user_id = ?")
        .bind(&id)
        .bind(&authed.id)
        .execute(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("note not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "deleted": id })))
}
