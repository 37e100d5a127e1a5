//! USSD Gateway - declarative conversational flows over USSD
//!
//! Services are described as automata (menus, free-text inputs, backend
//! calls, final screens) and executed turn by turn against carrier
//! callbacks. Session data collected along the way feeds templates,
//! conditions and outbound API requests.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
