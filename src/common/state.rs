// Application state shared across all modules

use reqwest::Client;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::{CredentialService, GoogleClient, TokenService};

/// Application state containing database pool, services, and configuration
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub http: Client,
    pub jwt_secret: String,
    pub frontend_url: String,
    pub google: Arc<GoogleClient>,
    pub credentials: Arc<CredentialService>,
    pub tokens: Arc<TokenService>,
}
