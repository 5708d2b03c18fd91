//! Application layer: orchestration of domain logic over ports.

pub mod handlers;
