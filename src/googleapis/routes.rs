// src/googleapis/routes.rs

use axum::{routing::get, Router};

use super::handlers;

/// Creates and returns the Google API proxy router
pub fn googleapis_routes() -> Router {
    Router::new()
        .route("/api/google/contacts", get(handlers::contacts_handler))
        .route(
            "/api/google/gmail/messages",
            get(handlers::gmail_messages_handler),
        )
        .route("/api/google/drive/files", get(handlers::drive_files_handler))
        .route(
            "/api/google/photos/albums",
            get(handlers::photos_albums_handler),
        )
}
