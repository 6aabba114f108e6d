//! # Reminders Module
//!
//! Per-user reminder CRUD with optional due timestamps and a completed flag.

pub mod handlers;
pub mod models;
pub mod routes;


pub use routes::reminders_routes;
