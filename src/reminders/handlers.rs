//! Reminder CRUD handlers
//!
//! Same ownership rule as notes: every statement is scoped to the
//! authenticated user's id.

use axum::extract::{Extension, Json, Path};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::models::{CreateReminderPayload, Reminder, UpdateReminderPayload};
use crate::auth::AuthedUser;
use crate::common::{generate_reminder_id, ApiError, AppState};

/// GET /api/reminders
pub async fn list_reminders(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<Json<Vec<Reminder>>, ApiError> {
    let state = state_lock.read().await.clone();

    let reminders = sqlx::query_as::<_, Reminder>(
        "SELECT * FROM reminders WHERE user_id = ? ORDER BY due_at IS NULL, due_at ASC",
    )
    .bind(&authed.id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::DatabaseError)?;

    Ok(Json(reminders))
}

/// POST /api/reminders
pub async fn create_reminder(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Json(payload): Json<CreateReminderPayload>,
) -> Result<Json<Reminder>, ApiError> {
    let state = state_lock.read().await.clone();

    if payload.title.trim().is_empty() {
        return Err(ApiError::ValidationError("title is required".to_string()));
    }

    let id = generate_reminder_id();
    sqlx::query("INSERT INTO reminders (id, user_id, title, due_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(&authed.id)
        .bind(&payload.title)
        .bind(payload.due_at.as_deref())
        .execute(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    let reminder = sqlx::query_as::<_, Reminder>("SELECT * FROM reminders WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    info!(reminder_id = %reminder.id, user_id = %authed.id, "Reminder created");
    Ok(Json(reminder))
}

/// PUT /api/reminders/:id
pub async fn update_reminder(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateReminderPayload>,
) -> Result<Json<Reminder>, ApiError> {
    let state = state_lock.read().await.clone();

    let result = sqlx::query(
        r#"
        UPDATE reminders SET
            title = COALESCE(?, title),
            due_at = COALESCE(?, due_at),
            completed = COALESCE(?, completed),
            updated_at = datetime('now')
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(payload.title.as_deref())
    .bind(payload.due_at.as_deref())
    .bind(payload.completed)
    .bind(&id)
    .bind(&authed.id)
    .execute(&state.db)
    .await
    .map_err(ApiError::DatabaseError)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("reminder not found".to_string()));
    }

    let reminder = sqlx::query_as::<_, Reminder>("SELECT * FROM reminders WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    Ok(Json(reminder))
}

/// DELETE /api/reminders/:id
pub async fn delete_reminder(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let result = sqlx::query("DELETE FROM reminders WHERE id = ? AND user_id = ?")
        .bind(&id)
        .bind(&authed.id)
        .execute(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("reminder not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "deleted": id })))
}
