//! Authentication routes

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET /auth/login` - Redirect to Google consent screen
/// - `GET /auth/callback` - OAuth callback, issues session JWT
/// - `POST /auth/logout` - Logout (client-side token removal)
/// - `POST /auth/disconnect` - Revoke the Google connection
/// - `DELETE /auth/account` - Revoke and delete the account
/// - `GET /api/me` - Get current user information
/// - `PUT /api/me/preferences` - Update notification preferences
pub fn auth_routes() -> Router {
    Router::new()
        .route("/auth/login", get(handlers::login_handler))
        .route("/auth/callback", get(handlers::callback_handler))
        .route("/auth/logout", post(handlers::logout_handler))
        .route("/auth/disconnect", post(handlers::disconnect_handler))
        .route("/auth/account", delete(handlers::delete_account_handler))
        .route("/api/me", get(handlers::me_handler))
        .route("/api/me/preferences", put(handlers::update_preferences_handler))
}
