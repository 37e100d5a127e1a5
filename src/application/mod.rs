//! Application layer - services orchestrating domain logic over ports.
//!
//! - `gateway` - carrier entry point (session resolution, main menu)
//! - `engine` - automaton interpreter, one turn at a time
//! - `session_manager` / `storage` - session and per-subscriber persistence
//! - `registry` - service catalogue with a parsed-definition cache
//! - `api_invoker` - outbound backend calls
//! - `session_sweeper` - background session expiry

mod api_invoker;
pub mod engine;
mod gateway;
mod registry;
mod session_manager;
mod session_sweeper;
mod storage;

pub use api_invoker::ApiInvoker;
pub use engine::{AutomatonEngine, EngineError, TurnResult, ERROR_MESSAGE_KEY};
pub use gateway::{UssdGateway, UssdRequest, UssdResponse};
pub use registry::ServiceRegistry;
pub use session_manager::SessionManager;
pub use session_sweeper::{SessionSweeper, SessionSweeperConfig, SweepReport};
pub use storage::GenericStorageService;
