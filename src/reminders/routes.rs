// src/reminders/routes.rs

use axum::{
    routing::{get, put},
    Router,
};

use super::handlers;

pub fn reminders_routes() -> Router {
    Router::new()
        .route(
            "/api/reminders",
            get(handlers::list_reminders).post(handlers::create_reminder),
        )
        .route(
            "/api/reminders/:id",
            put(handlers::update_reminder).delete(handlers::delete_reminder),
        )
}
