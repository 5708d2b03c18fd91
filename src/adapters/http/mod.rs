//! HTTP adapters (Axum).

pub mod billing;
