//! Helpers over raw option trees (`serde_json::Value`).

use serde_json::Value;

/// Deep-merges `source` into `target`.
///
/// Objects merge key by key; arrays and scalars in `source` replace what is in
/// `target`. A `null` in `source` overwrites too, so callers can clear keys.
pub fn merge_option(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(key) {
                    Some(existing) => merge_option(existing, value),
                    None => {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

/// `x` -> `[x]`, `[..]` -> `[..]`, missing/`null` -> `[]`.
#[must_use]
pub fn normalize_to_array(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}

#[must_use]
pub fn option_at<'a>(option: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(option, |node, key| node.get(key))
        .filter(|value| !value.is_null())
}

#[must_use]
pub fn option_str<'a>(option: &'a Value, key: &str) -> Option<&'a str> {
    option.get(key).and_then(Value::as_str)
}

#[must_use]
pub fn option_f64(option: &Value, key: &str) -> Option<f64> {
    option
        .get(key)
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite())
}

#[must_use]
pub fn option_bool(option: &Value, key: &str) -> Option<bool> {
    option.get(key).and_then(Value::as_bool)
}

/// Reads a scalar that may be given as a number or a numeric string.
#[must_use]
pub fn option_usize(option: &Value, key: &str) -> Option<usize> {
    match option.get(key)? {
        Value::Number(number) => number.as_u64().and_then(|value| usize::try_from(value).ok()),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

/// Stringifies ids given as strings or numbers.
#[must_use]
pub fn value_to_key(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
