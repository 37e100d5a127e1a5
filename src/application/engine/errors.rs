//! Engine errors.
//!
//! Definition mistakes and session-store failures end the turn; anything
//! an action can recover from is reported through the flow instead.

use thiserror::Error;

use crate::domain::foundation::DomainError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("service '{0}' has no states")]
    EmptyDefinition(String),

    #[error("invalid state '{state_id}': {reason}")]
    InvalidState { state_id: String, reason: String },

    #[error("state '{state_id}' has no {condition} transition")]
    MissingTransition { state_id: String, condition: String },

    #[error("more than {limit} processing states chained at '{state_id}'")]
    ProcessingLoop { state_id: String, limit: usize },

    #[error(transparent)]
    Store(#[from] DomainError),
}

impl EngineError {
    pub fn unknown_state(state_id: impl Into<String>) -> Self {
        EngineError::InvalidState {
            state_id: state_id.into(),
            reason: "no such state in definition".to_string(),
        }
    }

    pub fn no_matching_condition(state_id: impl Into<String>) -> Self {
        EngineError::InvalidState {
            state_id: state_id.into(),
            reason: "no transition condition holds".to_string(),
        }
    }

    pub fn missing_transition(state_id: impl Into<String>, condition: impl Into<String>) -> Self {
        EngineError::MissingTransition {
            state_id: state_id.into(),
            condition: condition.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    #[test]
    fn messages_name_the_state() {
        assert_eq!(
            EngineError::unknown_state("GHOST").to_string(),
            "invalid state 'GHOST': no such state in definition"
        );
        assert_eq!(
            EngineError::missing_transition("AMOUNT", "VALID").to_string(),
            "state 'AMOUNT' has no VALID transition"
        );
    }

    #[test]
    fn store_errors_convert() {
        let err: EngineError = DomainError::database("connection lost").into();
        assert!(matches!(err, EngineError::Store(ref e) if e.code == ErrorCode::DatabaseError));
    }
}
