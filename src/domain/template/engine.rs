//! Filter-pipeline renderer used for API payloads, URLs and storage values.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use super::filters;
use super::path::{lookup, to_display};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern"));

/// Renders `{{path}}` and `{{path | filter:arg | ...}}` placeholders.
///
/// Rendering never fails: missing variables become empty strings and text
/// that is not a well-formed placeholder is left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEngine;

impl TemplateEngine {
    pub fn new() -> Self {
        Self
    }

    /// Renders a template string against `vars`.
    pub fn render(&self, template: &str, vars: &Value) -> String {
        if !template.contains("{{") {
            return template.to_string();
        }
        PLACEHOLDER
            .replace_all(template, |caps: &Captures| {
                to_display(&evaluate(&caps[1], vars))
            })
            .into_owned()
    }

    /// Renders every string leaf of a JSON value, walking objects and arrays.
    ///
    /// A string made of a single bare placeholder (`"{{items}}"`) resolves to
    /// the referenced value itself, keeping its JSON type.
    pub fn render_value(&self, value: &Value, vars: &Value) -> Value {
        match value {
            Value::String(s) => {
                if let Some(found) = bare_placeholder(s).and_then(|path| lookup(vars, path)) {
                    return found.clone();
                }
                Value::String(self.render(s, vars))
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.render_value(v, vars)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.render_value(v, vars)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// Evaluates the inside of one placeholder.
fn evaluate(expression: &str, vars: &Value) -> Value {
    let segments = split_pipeline(expression);
    let Some((path, filters)) = segments.split_first() else {
        return Value::Null;
    };
    let value = lookup(vars, path.trim()).cloned().unwrap_or(Value::Null);
    apply_filters(value, filters)
}

pub(crate) fn apply_filters(mut value: Value, segments: &[&str]) -> Value {
    for segment in segments {
        let (name, arg) = parse_filter(segment);
        value = filters::apply(name, arg.as_deref(), value);
    }
    value
}

/// Splits on `|` outside quotes.
pub(crate) fn split_pipeline(expression: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in expression.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '|') => {
                parts.push(&expression[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&expression[start..]);
    parts
}

/// `default:"N/A"` becomes `("default", Some("N/A"))`.
pub(crate) fn parse_filter(segment: &str) -> (&str, Option<String>) {
    match segment.split_once(':') {
        Some((name, arg)) => (name.trim(), Some(unquote(arg.trim()).to_string())),
        None => (segment.trim(), None),
    }
}

pub(crate) fn unquote(raw: &str) -> &str {
    let quoted = raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')));
    if quoted {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

fn bare_placeholder(s: &str) -> Option<&str> {
    let inner = s.trim().strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") || inner.contains('|') {
        return None;
    }
    Some(inner.trim())
}
