//! Tolerant JSON recovery for model output.
//!
//! Models wrap JSON in code fences, prepend chatter, or get cut off mid-object.
//! `parse_json_safe` never fails: it returns the first well-formed top-level
//! object it can find, or an empty object.

use serde_json::{Map, Value};

/// Removes a leading ```json / ``` fence and a trailing ``` fence, then trims.
/// Fences inside the payload are left alone.
pub fn strip_json_fences(text: &str) -> String {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim().to_string()
}

/// Recovers a JSON object from raw model output.
///
/// 1. Try a direct parse of the trimmed text, then of the text without its
///    outer fences.
/// 2. Otherwise walk from the first `{`, tracking string state (with escapes)
///    and brace depth. Each time depth returns to zero the candidate is parsed;
///    the first candidate that parses wins.
/// 3. If nothing parses, returns `{}`.
pub fn parse_json_safe(text: &str) -> Map<String, Value> {
    let trimmed = text.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return map;
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&strip_json_fences(trimmed)) {
        return map;
    }

    let cleaned = trimmed;
    let Some(first_open) = cleaned.find('{') else {
        return Map::new();
    };

    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = first_open;

    for (offset, ch) in cleaned[first_open..].char_indices() {
        let idx = first_open + offset;

        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = idx;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &cleaned[start..=idx];
                    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate) {
                        return map;
                    }
                }
            }
            _ => {}
        }
    }

    Map::new()
}

/// Non-empty, trimmed string field. Numbers and booleans are not coerced.
pub fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// String array field; non-string items are dropped, a non-array yields `[]`.
pub fn string_list(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Object array field; non-object items are dropped, a non-array yields `[]`.
pub fn object_list<'a>(obj: &'a Map<String, Value>, key: &str) -> Vec<&'a Map<String, Value>> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}
