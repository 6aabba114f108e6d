//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - The Google OAuth login/callback flow
//! - Session JWT issuance and validation
//! - Disconnect and account deletion
//! - AuthedUser extractor for protected routes

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod session;


pub use extractors::AuthedUser;
pub use models::User;
pub use routes::auth_routes;
