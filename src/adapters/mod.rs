//! Adapters: HTTP surface and persistence implementations.

pub mod http;
pub mod postgres;
