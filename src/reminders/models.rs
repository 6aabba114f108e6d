//! Reminder data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Reminder database model
#[derive(FromRow, Serialize, Debug, Clone)]
pub struct Reminder {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub due_at: Option<String>,
    pub completed: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Payload for creating a reminder
#[derive(Deserialize, Debug)]
pub struct CreateReminderPayload {
    pub title: String,
    pub due_at: Option<String>,
}

/// Payload for updating a reminder; omitted fields are left unchanged
#[derive(Deserialize, Debug)]
pub struct UpdateReminderPayload {
    pub title: Option<String>,
    pub due_at: Option<String>,
    pub completed: Option<bool>,
}
