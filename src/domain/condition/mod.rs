//! Boolean conditions over session data, used by conditional transitions.
//!
//! Conditions are written `{{expr}}` where `expr` is one of:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `var` | present and not null |
//! | `var == null` / `var != null` | null checks |
//! | `var == 'lit'` / `var != 'lit'` | equality on string form |
//!
//! A condition without braces is vacuously true. Any evaluation fault is false.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::template::path::{lookup, to_display};

static EXPRESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*(.+?)\s*\}\}").expect("condition pattern"));
static VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][\w$]*(\.[\w$]+)*$").expect("variable pattern"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
    #[error("operand missing in '{0}'")]
    MissingOperand(String),

    #[error("'{0}' is not a variable path")]
    InvalidVariable(String),
}

enum Literal {
    Null,
    Value(Value),
}

/// Evaluates transition conditions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionalEvaluator;

impl ConditionalEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, condition: &str, data: &Value) -> bool {
        if condition.trim().is_empty() {
            return true;
        }
        let Some(caps) = EXPRESSION.captures(condition) else {
            tracing::debug!(condition = %condition, "condition without braces, treated as true");
            return true;
        };

        match evaluate_expression(caps[1].trim(), data) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(condition = %condition, error = %e, "condition evaluation failed");
                false
            }
        }
    }
}

fn evaluate_expression(expr: &str, data: &Value) -> Result<bool, ConditionError> {
    if let Some((left, right)) = expr.split_once("!=") {
        return compare(left, right, data).map(|equal| !equal);
    }
    if let Some((left, right)) = expr.split_once("==") {
        return compare(left, right, data);
    }
    let var = variable(expr)?;
    Ok(lookup(data, var).is_some_and(|v| !v.is_null()))
}

fn compare(left: &str, right: &str, data: &Value) -> Result<bool, ConditionError> {
    let var = variable(left)?;
    let right = right.trim();
    if right.is_empty() {
        return Err(ConditionError::MissingOperand(format!("{} ==", var)));
    }

    let actual = lookup(data, var).filter(|v| !v.is_null());
    Ok(match parse_literal(right) {
        Literal::Null => actual.is_none(),
        Literal::Value(expected) => actual.is_some_and(|v| to_display(v) == to_display(&expected)),
    })
}

fn variable(raw: &str) -> Result<&str, ConditionError> {
    let var = raw.trim();
    if var.is_empty() {
        return Err(ConditionError::MissingOperand(raw.to_string()));
    }
    if !VARIABLE.is_match(var) {
        return Err(ConditionError::InvalidVariable(var.to_string()));
    }
    Ok(var)
}

/// Quoted string, then number, then boolean, then raw text.
fn parse_literal(raw: &str) -> Literal {
    if raw == "null" {
        return Literal::Null;
    }
    let quoted = raw.len() >= 2
        && ((raw.starts_with('\'') && raw.ends_with('\''))
            || (raw.starts_with('"') && raw.ends_with('"')));
    if quoted {
        return Literal::Value(Value::String(raw[1..raw.len() - 1].to_string()));
    }
    if raw.contains('.') {
        if let Ok(n) = raw.parse::<f64>() {
            return Literal::Value(json!(n));
        }
    } else if let Ok(n) = raw.parse::<i64>() {
        return Literal::Value(json!(n));
    }
    if raw.eq_ignore_ascii_case("true") {
        Literal::Value(Value::Bool(true))
    } else if raw.eq_ignore_ascii_case("false") {
        Literal::Value(Value::Bool(false))
    } else {
        Literal::Value(Value::String(raw.to_string()))
    }
}
