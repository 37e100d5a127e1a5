//! In-memory adapters.
//!
//! Backed by `Arc<RwLock<HashMap>>`; used by tests and by database-less
//! deployments.

mod definition_store;
mod session_repository;
mod storage_repository;

pub use definition_store::InMemoryDefinitionStore;
pub use session_repository::InMemorySessionRepository;
pub use storage_repository::InMemoryStorageRepository;
