//! Domain layer containing the gateway's core types and pure services.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (errors, timestamps)
//! - `automaton` - Declarative flow definitions (states, transitions, actions)
//! - `session` - Subscriber session aggregate
//! - `template` - Message and payload rendering
//! - `validation` - Subscriber input validation
//! - `condition` - Boolean conditions for conditional transitions
//! - `integration` - Outbound authentication and API response classification

pub mod automaton;
pub mod condition;
pub mod foundation;
pub mod integration;
pub mod session;
pub mod template;
pub mod validation;
