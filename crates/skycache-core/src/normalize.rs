//! Result shape normalization.
//!
//! Structured-path reads may come back as `[[...]]` (one result set per
//! matched root) while in-memory filtering yields a flat array. Both are
//! brought to a flat array of records here. Unknown shapes pass through
//! unchanged.

use serde_json::Value;

/// Canonicalize a store result to a flat array where possible.
pub fn normalize(raw: Value) -> Value {
    match raw {
        Value::Array(mut items) => {
            if items.len() == 1 && items[0].is_array() {
                items.pop().unwrap_or(Value::Null)
            } else {
                Value::Array(items)
            }
        }
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => Value::Array(items),
            Some(other) => {
                map.insert("data".to_string(), other);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        other => other,
    }
}

/// Normalize serialized JSON. Text that does not parse is returned as is.
pub fn normalize_text(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => normalize(value).to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shapes() -> Vec<Value> {
        vec![
            json!([{"a": 1}, {"a": 2}]),
            json!([[{"a": 1}, {"a": 2}]]),
            json!({"data": [{"a": 1}], "pagination": {}}),
            json!({"unexpected": true}),
            json!({"data": "not-an-array"}),
            json!([]),
            json!([[]]),
            json!("scalar"),
            Value::Null,
        ]
    }

    #[test]
    fn test_flat_array_passes_through() {
        assert_eq!(normalize(json!([1, 2])), json!([1, 2]));
    }

    #[test]
    fn test_single_wrapped_array_is_unwrapped() {
        assert_eq!(normalize(json!([[{"a": 1}]])), json!([{"a": 1}]));
    }

    #[test]
    fn test_only_one_level_is_unwrapped() {
        assert_eq!(normalize(json!([[[1]]])), json!([[1]]));
    }

    #[test]
    fn test_array_with_one_object_is_not_unwrapped() {
        assert_eq!(normalize(json!([{"a": 1}])), json!([{"a": 1}]));
    }

    #[test]
    fn test_envelope_yields_data() {
        assert_eq!(normalize(json!({"data": [1], "x": 2})), json!([1]));
    }

    #[test]
    fn test_unrecognized_shapes_unchanged() {
        assert_eq!(normalize(json!({"data": 5})), json!({"data": 5}));
        assert_eq!(normalize(json!({"k": "v"})), json!({"k": "v"}));
        assert_eq!(normalize(json!(7)), json!(7));
    }

    #[test]
    fn test_idempotent() {
        for shape in shapes() {
            let once = normalize(shape.clone());
            let twice = normalize(once.clone());
            assert_eq!(once, twice, "not idempotent for {}", shape);
        }
    }

    #[test]
    fn test_text_parse_failure_returns_input() {
        assert_eq!(normalize_text("not json {"), "not json {");
        assert_eq!(normalize_text("[[1,2]]"), "[1,2]");
    }
}
