//! HTTP adapters - REST API implementations.

pub mod ussd;

// Re-export key types for convenience
pub use ussd::{ussd_routes, UssdHandlers};
