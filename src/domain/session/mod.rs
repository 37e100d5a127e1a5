//! Session module - one subscriber's progress through one service.

mod aggregate;

pub use aggregate::{Session, PHONE_NUMBER_KEY};
