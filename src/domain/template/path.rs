//! Path lookups into JSON documents.

use serde_json::Value;

/// Resolves `a.b.c` by walking nested objects only.
pub fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    path.split('.')
        .try_fold(data, |current, key| current.as_object()?.get(key))
}

/// Resolves dotted paths with array indexes, e.g. `items[0].name` or
/// `items.0.name`. `"."` and `"$"` denote the whole document.
pub fn extract<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    if path == "." || path == "$" {
        return Some(data);
    }
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() {
        return None;
    }

    let mut current = data;
    for segment in path.split('.') {
        let (key, indexes) = split_indexes(segment)?;
        if !key.is_empty() {
            current = match current {
                Value::Object(map) => map.get(key)?,
                Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        for index in indexes {
            current = current.as_array()?.get(index)?;
        }
    }
    Some(current)
}

/// Splits `items[0][1]` into `("items", [0, 1])`.
fn split_indexes(segment: &str) -> Option<(&str, Vec<usize>)> {
    let Some(open) = segment.find('[') else {
        return Some((segment, Vec::new()));
    };
    let key = &segment[..open];
    let mut indexes = Vec::new();
    let mut rest = &segment[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let close = stripped.find(']')?;
        indexes.push(stripped[..close].trim().parse().ok()?);
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        return None;
    }
    Some((key, indexes))
}

/// Text shown for a value inside a rendered message.
pub fn to_display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_walks_nested_objects() {
        let data = json!({"user": {"name": "Awa", "tags": ["a"]}});
        assert_eq!(lookup(&data, "user.name"), Some(&json!("Awa")));
        assert_eq!(lookup(&data, "user.missing"), None);
        assert_eq!(lookup(&data, "user.tags.0"), None);
    }

    #[test]
    fn extract_supports_indexes_and_root() {
        let data = json!({"items": [{"name": "first"}, {"name": "second"}], "id": 42});
        assert_eq!(extract(&data, "items[0].name"), Some(&json!("first")));
        assert_eq!(extract(&data, "items.1.name"), Some(&json!("second")));
        assert_eq!(extract(&data, "$.id"), Some(&json!(42)));
        assert_eq!(extract(&data, "."), Some(&data));
        assert_eq!(extract(&data, "items[5].name"), None);
        assert_eq!(extract(&data, "items[x]"), None);
    }

    #[test]
    fn display_renders_scalars_plainly() {
        assert_eq!(to_display(&json!(null)), "");
        assert_eq!(to_display(&json!("text")), "text");
        assert_eq!(to_display(&json!(42)), "42");
        assert_eq!(to_display(&json!(true)), "true");
        assert_eq!(to_display(&json!([1, 2])), "[1,2]");
    }
}
