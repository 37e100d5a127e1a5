//! States, transitions and the rules attached to them.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::action::Action;
use crate::domain::validation::ValidationType;

/// Kind of screen a state produces.
///
/// Parsing is lenient: definitions produced by generators often use
/// synonyms such as `CHOICE` or `END`, so unknown names are mapped by
/// keyword and fall back to `DISPLAY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum StateType {
    Menu,
    Input,
    Display,
    Processing,
    Final,
}

impl From<String> for StateType {
    fn from(raw: String) -> Self {
        let upper = raw.trim().to_uppercase();
        match upper.as_str() {
            "MENU" => return StateType::Menu,
            "INPUT" => return StateType::Input,
            "DISPLAY" => return StateType::Display,
            "PROCESSING" => return StateType::Processing,
            "FINAL" => return StateType::Final,
            _ => {}
        }

        let contains_any = |words: &[&str]| words.iter().any(|w| upper.contains(w));
        if contains_any(&["MENU", "CHOICE", "OPTION"]) {
            StateType::Menu
        } else if contains_any(&["INPUT", "ENTRY", "FORM"]) {
            StateType::Input
        } else if contains_any(&["PROCESS", "ACTION", "EXECUTE"]) {
            StateType::Processing
        } else if contains_any(&["FINAL", "END", "EXIT"]) {
            StateType::Final
        } else {
            if !contains_any(&["DISPLAY", "SHOW", "VIEW"]) {
                tracing::warn!(state_type = %raw, "unknown state type, defaulting to DISPLAY");
            }
            StateType::Display
        }
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StateType::Menu => "MENU",
            StateType::Input => "INPUT",
            StateType::Display => "DISPLAY",
            StateType::Processing => "PROCESSING",
            StateType::Final => "FINAL",
        };
        write!(f, "{}", s)
    }
}

/// Conditions with a fixed meaning to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedCondition {
    Success,
    Error,
    Valid,
    Invalid,
}

impl ReservedCondition {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "SUCCESS" => Some(ReservedCondition::Success),
            "ERROR" => Some(ReservedCondition::Error),
            "VALID" => Some(ReservedCondition::Valid),
            "INVALID" => Some(ReservedCondition::Invalid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservedCondition::Success => "SUCCESS",
            ReservedCondition::Error => "ERROR",
            ReservedCondition::Valid => "VALID",
            ReservedCondition::Invalid => "INVALID",
        }
    }
}

/// Transition condition: a reserved token matched structurally, or a
/// boolean expression handed to the conditional evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Condition {
    Reserved(ReservedCondition),
    Expression(String),
}

impl Condition {
    pub fn is(&self, reserved: ReservedCondition) -> bool {
        matches!(self, Condition::Reserved(r) if *r == reserved)
    }

    pub fn expression(&self) -> Option<&str> {
        match self {
            Condition::Expression(expr) => Some(expr),
            Condition::Reserved(_) => None,
        }
    }
}

impl From<String> for Condition {
    fn from(raw: String) -> Self {
        match ReservedCondition::parse(&raw) {
            Some(reserved) => Condition::Reserved(reserved),
            None => Condition::Expression(raw),
        }
    }
}

impl From<Condition> for String {
    fn from(condition: Condition) -> Self {
        match condition {
            Condition::Reserved(r) => r.as_str().to_string(),
            Condition::Expression(expr) => expr,
        }
    }
}

/// Edge between two states.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// Menu key matched against the subscriber's input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,

    pub next_state: String,

    /// Value stored under the state's `storeAs` when this transition fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Transition {
    pub fn has_condition(&self, reserved: ReservedCondition) -> bool {
        self.condition.as_ref().is_some_and(|c| c.is(reserved))
    }
}

/// Constraints applied to INPUT states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(rename = "type", default)]
    pub validation_type: ValidationType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Lower numeric bound, checked when the input parses as a number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(default)]
    pub optional: bool,
}

/// One node of the conversational state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(rename = "type")]
    pub state_type: StateType,

    #[serde(default)]
    pub is_initial: bool,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_as: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,

    #[serde(default)]
    pub transitions: Vec<Transition>,

    #[serde(default)]
    pub pre_actions: Vec<Action>,

    #[serde(default)]
    pub post_actions: Vec<Action>,
}

impl State {
    /// First transition carrying the given reserved condition.
    pub fn transition_for(&self, reserved: ReservedCondition) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.has_condition(reserved))
    }

    /// Primary action, ignoring an explicit `NONE`.
    pub fn effective_action(&self) -> Option<&Action> {
        self.action.as_ref().filter(|a| !a.is_noop())
    }
}
