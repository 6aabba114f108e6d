//! Note data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Note database model
#[derive(FromRow, Serialize, Debug, Clone)]
pub struct Note {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub body: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Payload for creating or updating a note
#[derive(Deserialize, Debug)]
pub struct NotePayload {
    pub title: Option<String>,
    pub body: Option<String>,
}
