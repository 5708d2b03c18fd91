//! Foundation types shared across the domain layer.

mod errors;

pub use errors::{DomainError, ErrorCode};
