//! Foundation module - Shared domain primitives.
//!
//! Contains the error vocabulary and time value objects used by every
//! other part of the gateway.

mod errors;
mod timestamp;

pub use errors::{DomainError, ErrorCode};
pub use timestamp::Timestamp;
