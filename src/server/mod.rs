//! HTTP server exposing the transliteration model.
//!
//! - [`api`]: Request/response types, route handlers and router

pub mod api;
