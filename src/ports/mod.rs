//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the gateway core and the outside world. Adapters implement these ports.
//!
//! ## Store Ports
//!
//! - `SessionRepository` - Session persistence, expiry and purge
//! - `StorageRepository` - Subscriber-scoped key/value records
//! - `DefinitionStore` - Registered services and their automaton JSON
//!
//! ## Transport Ports
//!
//! - `HttpTransport` - Outbound HTTP for backend API calls

mod definition_store;
mod http_transport;
mod session_repository;
mod storage_repository;

pub use definition_store::{DefinitionStore, ServiceRecord};
pub use http_transport::{HttpTransport, OutboundRequest, TransportError, TransportResponse};
pub use session_repository::SessionRepository;
pub use storage_repository::{StorageKey, StorageRepository};
