//! Domain layer.

pub mod billing;
pub mod foundation;
