//! HTTP request handlers.

pub mod details;
pub mod health;
