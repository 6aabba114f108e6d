// src/services/mod.rs
//
// Shared services module containing business logic services
// that can be used across different domain modules

pub mod credentials;
pub mod google;
pub mod tokens;

// Re-export commonly used types for convenience
pub use credentials::CredentialService;
pub use google::{GoogleClient, GoogleConfig, OAuthProvider};
pub use tokens::{RevokeOutcome, TokenService};
