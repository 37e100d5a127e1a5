//! The automaton definition aggregate and its load-time checks.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::action::Action;
use super::state::{ReservedCondition, State, StateType};

/// USSD screens are limited to 182 characters.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 182;

/// Declarative configuration of one service's conversational flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomatonDefinition {
    pub service_code: String,

    #[serde(default)]
    pub service_name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub short_code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_config: Option<ApiConfig>,

    #[serde(default)]
    pub session_config: SessionSettings,

    #[serde(default)]
    pub states: Vec<State>,
}

/// Backend API shared by every `API_CALL` of a service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: String,

    /// Timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub retry_attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationConfig>,

    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Authentication scheme for outbound calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthType {
    #[default]
    None,
    Basic,
    Bearer,
    ApiKey,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationConfig {
    #[serde(rename = "type", default)]
    pub auth_type: AuthType,

    #[serde(default)]
    pub credentials: HashMap<String, String>,
}

/// Per-service session overrides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_inactivity_seconds: Option<u64>,
}

impl SessionSettings {
    /// Seconds a session stays live after its last activity; the tighter of
    /// the two limits when both are set.
    pub fn effective_timeout(&self) -> Option<u64> {
        match (self.timeout_seconds, self.max_inactivity_seconds) {
            (Some(timeout), Some(idle)) => Some(timeout.min(idle)),
            (timeout, idle) => timeout.or(idle),
        }
    }
}

/// Problems found when checking a definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionIssue {
    #[error("definition has no states")]
    NoStates,

    #[error("no initial state, the first state will be used")]
    NoInitialState,

    #[error("several initial states: {0:?}")]
    MultipleInitialStates(Vec<String>),

    #[error("duplicate state id '{0}'")]
    DuplicateStateId(String),

    #[error("state '{state_id}' targets unknown state '{target}'")]
    UnknownTarget { state_id: String, target: String },

    #[error("state '{state_id}' message is {length} characters (max {max})")]
    MessageTooLong {
        state_id: String,
        length: usize,
        max: usize,
    },

    #[error("input state '{0}' has no VALID transition")]
    MissingValidTransition(String),

    #[error("state '{0}' cannot be reached from the initial state")]
    UnreachableState(String),

    #[error("state '{0}' has no path to a FINAL state")]
    NoPathToFinal(String),
}

impl AutomatonDefinition {
    /// Parses a definition from its stored JSON form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Looks up a state by id.
    pub fn state(&self, id: &str) -> Option<&State> {
        self.states.iter().find(|s| s.id == id)
    }

    /// The state a new session starts in.
    ///
    /// Falls back to the first declared state when none is flagged initial.
    pub fn initial_state(&self) -> Option<&State> {
        if let Some(state) = self.states.iter().find(|s| s.is_initial) {
            return Some(state);
        }
        let first = self.states.first();
        if let Some(state) = first {
            tracing::warn!(
                service_code = %self.service_code,
                state_id = %state.id,
                "no initial state flagged, falling back to first state"
            );
        }
        first
    }

    /// Checks structural consistency. Issues are reported, never fatal.
    pub fn validate(&self, max_message_length: usize) -> Vec<DefinitionIssue> {
        let mut issues = Vec::new();
        if self.states.is_empty() {
            issues.push(DefinitionIssue::NoStates);
            return issues;
        }

        let initial: Vec<String> = self
            .states
            .iter()
            .filter(|s| s.is_initial)
            .map(|s| s.id.clone())
            .collect();
        match initial.len() {
            0 => issues.push(DefinitionIssue::NoInitialState),
            1 => {}
            _ => issues.push(DefinitionIssue::MultipleInitialStates(initial)),
        }

        let mut seen = HashSet::new();
        for state in &self.states {
            if !seen.insert(state.id.as_str()) {
                issues.push(DefinitionIssue::DuplicateStateId(state.id.clone()));
            }
        }

        for state in &self.states {
            for target in targets_of(state) {
                if !seen.contains(target) {
                    issues.push(DefinitionIssue::UnknownTarget {
                        state_id: state.id.clone(),
                        target: target.to_string(),
                    });
                }
            }

            let length = state.message.chars().count();
            if length > max_message_length {
                issues.push(DefinitionIssue::MessageTooLong {
                    state_id: state.id.clone(),
                    length,
                    max: max_message_length,
                });
            }

            if state.state_type == StateType::Input
                && state.transition_for(ReservedCondition::Valid).is_none()
            {
                issues.push(DefinitionIssue::MissingValidTransition(state.id.clone()));
            }
        }

        self.check_graph(&mut issues);
        issues
    }

    /// Reachability from the initial state, then termination of every
    /// reachable state.
    fn check_graph(&self, issues: &mut Vec<DefinitionIssue>) {
        let by_id: HashMap<&str, &State> =
            self.states.iter().map(|s| (s.id.as_str(), s)).collect();
        let Some(initial) = self
            .states
            .iter()
            .find(|s| s.is_initial)
            .or_else(|| self.states.first())
        else {
            return;
        };

        let mut reachable = HashSet::from([initial.id.as_str()]);
        let mut queue = vec![initial];
        while let Some(state) = queue.pop() {
            for target in targets_of(state) {
                if let Some(&next) = by_id.get(target) {
                    if reachable.insert(next.id.as_str()) {
                        queue.push(next);
                    }
                }
            }
        }

        let mut terminating: HashSet<&str> = self
            .states
            .iter()
            .filter(|s| s.state_type == StateType::Final)
            .map(|s| s.id.as_str())
            .collect();
        loop {
            let before = terminating.len();
            for state in &self.states {
                if !terminating.contains(state.id.as_str())
                    && targets_of(state).iter().any(|t| terminating.contains(t))
                {
                    terminating.insert(state.id.as_str());
                }
            }
            if terminating.len() == before {
                break;
            }
        }

        for state in &self.states {
            if !reachable.contains(state.id.as_str()) {
                issues.push(DefinitionIssue::UnreachableState(state.id.clone()));
            }
        }
        for state in &self.states {
            let id = state.id.as_str();
            if reachable.contains(id) && !terminating.contains(id) {
                issues.push(DefinitionIssue::NoPathToFinal(state.id.clone()));
            }
        }
    }
}

fn targets_of(state: &State) -> Vec<&str> {
    let mut targets: Vec<&str> = state
        .transitions
        .iter()
        .map(|t| t.next_state.as_str())
        .collect();
    if let Some(Action::ApiCall(call)) = &state.action {
        for outcome in [&call.on_success, &call.on_error].into_iter().flatten() {
            if let Some(next) = &outcome.next_state {
                targets.push(next);
            }
        }
    }
    targets
}
