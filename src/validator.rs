//! Validation call sites.
//!
//! These are the only places a [`ValidationError`] exists: a rejected input becomes a
//! 400 and a rejected output becomes a 422 before anything else sees it.
//!
//! Path params, query params and headers arrive as strings. Before they reach a
//! schema they are coerced using the property types of the schema's JSON Schema
//! description, so `/users/42` validates against `{"id": {"type": "integer"}}`.

use crate::errors::{HttpError, ValidationError, INPUT_VALIDATION_FAILED, OUTPUT_VALIDATION_FAILED};
use crate::schema::{Schema, SchemaAdapter};
use http::StatusCode;
use serde_json::{Map, Value};

/// Validate request input. Rejection is a 400 "Input validation failed".
pub fn validate_input(schema: &dyn Schema, input: Value) -> Result<Value, HttpError> {
    schema.validate(&input).map_err(|issues| {
        let rejection =
            HttpError::rejection(StatusCode::BAD_REQUEST).with_message(INPUT_VALIDATION_FAILED);
        ValidationError::new(input, issues).into_http_error(rejection)
    })
}

/// Validate a response value. Rejection is a 422 "Output validation failed".
pub fn validate_output(schema: &dyn Schema, output: Value) -> Result<Value, HttpError> {
    schema.validate(&output).map_err(|issues| {
        let rejection = HttpError::rejection(StatusCode::UNPROCESSABLE_ENTITY)
            .with_message(OUTPUT_VALIDATION_FAILED);
        ValidationError::new(output, issues).into_http_error(rejection)
    })
}

/// Coerce a string-valued record by `schema`'s property types, then validate it.
pub fn validate_record(
    adapter: &dyn SchemaAdapter,
    schema: &dyn Schema,
    raw: &Map<String, Value>,
) -> Result<Value, HttpError> {
    let json_schema = adapter.to_json_schema(schema);
    validate_input(schema, coerce_record(raw, &json_schema))
}

/// Apply [`decode_param_value`] to each entry whose property schema is known.
#[must_use]
pub fn coerce_record(raw: &Map<String, Value>, json_schema: &Value) -> Value {
    let properties = json_schema.get("properties");
    let coerced = raw
        .iter()
        .map(|(name, value)| {
            let prop = properties.and_then(|p| p.get(name));
            let value = match value {
                Value::String(s) => decode_param_value(s, prop),
                Value::Array(items) => {
                    let item_schema = prop.and_then(|p| p.get("items"));
                    Value::Array(
                        items
                            .iter()
                            .map(|item| match item {
                                Value::String(s) => decode_param_value(s, item_schema),
                                other => other.clone(),
                            })
                            .collect(),
                    )
                }
                other => other.clone(),
            };
            (name.clone(), value)
        })
        .collect();
    Value::Object(coerced)
}

/// Convert one raw parameter string according to its property schema.
///
/// Arrays are comma separated; objects are parsed as JSON. Values that do not parse
/// are left as strings so the schema reports them.
#[must_use]
pub fn decode_param_value(value: &str, schema: Option<&Value>) -> Value {
    fn convert_primitive(val: &str, schema: Option<&Value>) -> Value {
        match schema.and_then(|s| s.get("type")).and_then(Value::as_str) {
            Some("integer") => val
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(val.to_string())),
            Some("number") => val
                .parse::<f64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(val.to_string())),
            Some("boolean") => val
                .parse::<bool>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(val.to_string())),
            _ => Value::String(val.to_string()),
        }
    }

    match schema.and_then(|s| s.get("type")).and_then(Value::as_str) {
        Some("array") => {
            let items_schema = schema.and_then(|s| s.get("items"));
            Value::Array(
                value
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(|p| convert_primitive(p.trim(), items_schema))
                    .collect(),
            )
        }
        Some("object") => serde_json::from_str(value).unwrap_or(Value::String(value.to_string())),
        _ => convert_primitive(value, schema),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{JsonSchema, JsonSchemaAdapter};
    use serde_json::json;

    #[test]
    fn decodes_primitives_by_type() {
        assert_eq!(decode_param_value("42", Some(&json!({"type": "integer"}))), json!(42));
        assert_eq!(decode_param_value("1.5", Some(&json!({"type": "number"}))), json!(1.5));
        assert_eq!(decode_param_value("true", Some(&json!({"type": "boolean"}))), json!(true));
        assert_eq!(decode_param_value("abc", Some(&json!({"type": "integer"}))), json!("abc"));
        assert_eq!(decode_param_value("abc", None), json!("abc"));
    }

    #[test]
    fn decodes_arrays_and_objects() {
        let arr = json!({"type": "array", "items": {"type": "integer"}});
        assert_eq!(decode_param_value("1,2,3", Some(&arr)), json!([1, 2, 3]));
        let obj = json!({"type": "object"});
        assert_eq!(decode_param_value(r#"{"a":1}"#, Some(&obj)), json!({"a": 1}));
    }

    #[test]
    fn record_is_coerced_before_validation() {
        let schema = JsonSchema::new(json!({
            "type": "object",
            "properties": { "id": { "type": "integer" } },
            "required": ["id"]
        }))
        .unwrap();
        let mut raw = Map::new();
        raw.insert("id".into(), json!("42"));
        let validated = validate_record(&JsonSchemaAdapter, &schema, &raw).unwrap();
        assert_eq!(validated, json!({"id": 42}));

        raw.insert("id".into(), json!("forty-two"));
        let err = validate_record(&JsonSchemaAdapter, &schema, &raw).unwrap_err();
        assert_eq!(err.status().as_u16(), 400);
        assert_eq!(err.message(), INPUT_VALIDATION_FAILED);
    }

    #[test]
    fn output_rejection_is_422() {
        let schema = JsonSchema::new(json!({"type": "string"})).unwrap();
        let err = validate_output(&schema, json!(5)).unwrap_err();
        assert_eq!(err.status().as_u16(), 422);
        assert_eq!(err.additional_info()["input"], json!(5));
    }
}
