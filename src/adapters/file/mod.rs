//! Filesystem adapters.

mod definition_store;

pub use definition_store::FileDefinitionStore;
