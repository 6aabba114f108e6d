//! # Google API proxy module
//!
//! Thin read-only proxies over the user's Google data (contacts, Gmail,
//! Drive, Photos). Every handler goes through the token service for a live
//! access token before making its one outbound call.

pub mod handlers;
pub mod routes;

pub use routes::googleapis_routes;
