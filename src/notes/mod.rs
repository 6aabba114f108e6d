//! # Notes Module
//!
//! Simple per-user note CRUD. Ownership is enforced on every statement.

pub mod handlers;
pub mod models;
pub mod routes;


pub use routes::notes_routes;
