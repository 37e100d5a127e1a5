//! Automaton module - declarative definition of a service's conversational flow.
//!
//! A definition is authored as JSON (by hand or by a generator) and parsed
//! into closed enums so the engine can match every state and action kind
//! exhaustively.
//!
//! # Example
//!
//! ```
//! use ussd_gateway::domain::automaton::{AutomatonDefinition, StateType};
//!
//! let def = AutomatonDefinition::from_json(r#"{
//!     "serviceCode": "HELLO",
//!     "states": [{"id": "START", "type": "FINAL", "isInitial": true, "message": "Bonjour"}]
//! }"#).unwrap();
//!
//! assert_eq!(def.initial_state().unwrap().state_type, StateType::Final);
//! ```

mod action;
mod definition;
mod state;

pub use action::{Action, ActionResult, ApiCallAction, HttpMethod, StorageAction};
pub use definition::{
    ApiConfig, AuthType, AuthenticationConfig, AutomatonDefinition, DefinitionIssue,
    SessionSettings, DEFAULT_MAX_MESSAGE_LENGTH,
};
pub use state::{Condition, ReservedCondition, State, StateType, Transition, ValidationRule};
