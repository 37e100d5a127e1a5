//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `http` - carrier-facing REST endpoint (axum)
//! - `postgres` - session, storage and catalogue persistence (sqlx)
//! - `memory` - in-memory stores for tests and database-less runs
//! - `file` - service definitions read from a directory
//! - `transport` - outbound HTTP for backend API calls (reqwest, mock)

pub mod file;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod transport;
