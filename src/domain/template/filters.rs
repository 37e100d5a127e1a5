//! Display filters shared by both renderers.
//!
//! Formatting follows the conventions of francophone Central Africa:
//! spaces group thousands, a comma separates decimals, amounts are FCFA.

use chrono::NaiveDate;
use serde_json::Value;

use super::path::to_display;

const CURRENCY_SUFFIX: &str = " FCFA";

/// Filter names, also callable as helpers (`{{currency amount}}`).
pub const NAMES: [&str; 9] = [
    "currency",
    "boolean",
    "default",
    "uppercase",
    "lowercase",
    "capitalize",
    "number",
    "date",
    "truncate",
];
const DEFAULT_TRUNCATE_LENGTH: usize = 50;

/// Applies a named filter. Unknown filters log and pass the value through.
pub fn apply(name: &str, arg: Option<&str>, value: Value) -> Value {
    let text = match name.trim() {
        "currency" => currency(&value),
        "boolean" => boolean(&value),
        "default" => return default(value, arg.unwrap_or_default()),
        "uppercase" => to_display(&value).to_uppercase(),
        "lowercase" => to_display(&value).to_lowercase(),
        "capitalize" => capitalize(&to_display(&value)),
        "number" => number(&value, arg.and_then(|a| a.trim().parse().ok())),
        "date" => date(&to_display(&value)),
        "truncate" => truncate(
            &to_display(&value),
            arg.and_then(|a| a.trim().parse().ok())
                .unwrap_or(DEFAULT_TRUNCATE_LENGTH),
        ),
        other => {
            tracing::warn!(filter = %other, "unknown template filter");
            return value;
        }
    };
    Value::String(text)
}

pub fn is_known(name: &str) -> bool {
    NAMES.contains(&name)
}

/// Reads a number out of a JSON number or a numeric string.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

fn currency(value: &Value) -> String {
    if value.is_null() {
        return format!("{}{}", format_grouped(0.0, 2, 2), CURRENCY_SUFFIX);
    }
    match as_number(value) {
        Some(n) => format!("{}{}", format_grouped(n, 2, 2), CURRENCY_SUFFIX),
        None => format!("{}{}", to_display(value), CURRENCY_SUFFIX),
    }
}

fn boolean(value: &Value) -> String {
    let yes = || "Oui".to_string();
    let no = || "Non".to_string();
    match value {
        Value::Null => no(),
        Value::Bool(true) => yes(),
        Value::Bool(false) => no(),
        other => match to_display(other).trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "oui" => yes(),
            "0" | "false" | "no" | "non" => no(),
            s => s.to_string(),
        },
    }
}

fn default(value: Value, fallback: &str) -> Value {
    if value.is_null() || to_display(&value).is_empty() {
        Value::String(fallback.to_string())
    } else {
        value
    }
}

fn capitalize(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn number(value: &Value, precision: Option<usize>) -> String {
    if value.is_null() {
        return "0".to_string();
    }
    match (as_number(value), precision) {
        (Some(n), Some(p)) => format_grouped(n, p, p),
        (Some(n), None) => format_grouped(n, 0, 2),
        (None, _) => to_display(value),
    }
}

fn date(text: &str) -> String {
    let prefix: String = text.chars().take(10).collect();
    match NaiveDate::parse_from_str(&prefix, "%Y-%m-%d") {
        Ok(date) => date.format("%d/%m/%Y").to_string(),
        Err(_) => text.to_string(),
    }
}

fn truncate(text: &str, length: usize) -> String {
    if text.chars().count() <= length {
        return text.to_string();
    }
    let keep = length.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Formats `n` with space-grouped thousands and a comma decimal separator,
/// keeping between `min_frac` and `max_frac` fraction digits.
pub fn format_grouped(n: f64, min_frac: usize, max_frac: usize) -> String {
    let fixed = format!("{:.*}", max_frac, n.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i.to_string(), f.to_string()),
        None => (fixed.clone(), String::new()),
    };

    let mut frac = frac_part;
    while frac.len() > min_frac && frac.ends_with('0') {
        frac.pop();
    }

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::new();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(*c);
    }

    let is_zero = digits.iter().all(|c| *c == '0') && frac.chars().all(|c| c == '0');
    let mut out = String::new();
    if n < 0.0 && !is_zero {
        out.push('-');
    }
    out.push_str(&grouped);
    if !frac.is_empty() {
        out.push(',');
        out.push_str(&frac);
    }
    out
}
