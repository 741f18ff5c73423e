//! HTTP request handlers, organized by resource.

pub mod auth;
pub mod tasks;
