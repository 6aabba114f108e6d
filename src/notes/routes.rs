// src/notes/routes.rs

use axum::{
    routing::{get, put},
    Router,
};

use super::handlers;

pub fn notes_routes() -> Router {
    Router::new()
        .route(
            "/api/notes",
            get(handlers::list_notes).post(handlers::create_note),
        )
        .route(
            "/api/notes/:id",
            put(handlers::update_note).delete(handlers::delete_note),
        )
}
