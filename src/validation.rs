//! Validation of records against a [`Schema`], plus checks for the
//! free-form JSON payload attributes (`config_json`, `secret_json`,
//! `builder_json`, `policy_json`) that must be rejected before any backend
//! call is made.
//!
//! # Example
//!
//! ```
//! use neos_provider::schema::{Attribute, Schema};
//! use neos_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("label", Attribute::optional_string());
//!
//! assert!(validate(&schema, &json!({"name": "sales", "label": "SAL"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"label": 3}));
//! assert_eq!(diagnostics.len(), 2);
//! ```

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema,
};

/// Validate a JSON record against a schema.
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped
/// - Attribute types must match
/// - Nested blocks are checked recursively, including item counts
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Like [`validate`], returning `Err` with the diagnostics when invalid.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether a record is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        other => {
            let diag = Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", value_type_name(other)));
            diagnostics.push(if path.is_empty() {
                diag
            } else {
                diag.with_attribute(path)
            });
            return;
        }
    };

    for (name, attr) in &block.attributes {
        validate_attribute(attr, obj.get(name), &join_path(path, name), diagnostics);
    }

    for (name, nested) in &block.blocks {
        validate_nested_block(nested, obj.get(name), &join_path(path, name), diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        }
        Some(v) => validate_attribute_type(&attr.attr_type, v, path, diagnostics),
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String if !value.is_string() => {
            diagnostics.push(type_error(path, "string", value))
        }
        AttributeType::Int64 if !is_int64(value) => {
            diagnostics.push(type_error(path, "int64", value))
        }
        AttributeType::Float64 if !value.is_number() => {
            diagnostics.push(type_error(path, "float64", value))
        }
        AttributeType::Bool if !value.is_boolean() => {
            diagnostics.push(type_error(path, "bool", value))
        }
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            match value.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        let item_path = format!("{}.{}", path, i);
                        validate_attribute_type(element_type, item, &item_path, diagnostics);
                    }
                }
                None => {
                    let expected = if attr_type.is_set() { "set" } else { "list" };
                    diagnostics.push(type_error(path, expected, value));
                }
            }
        }
        AttributeType::Map(value_type) => match value.as_object() {
            Some(obj) => {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, diagnostics);
                }
            }
            None => diagnostics.push(type_error(path, "map", value)),
        },
        AttributeType::Object(attrs) => match value.as_object() {
            Some(obj) => validate_object_type(attrs, obj, path, diagnostics),
            None => diagnostics.push(type_error(path, "object", value)),
        },
        _ => {}
    }
}

fn validate_object_type(
    attrs: &HashMap<String, AttributeType>,
    obj: &serde_json::Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // object members carry no presence flags, so only types are checked
    for (name, attr_type) in attrs {
        if let Some(value) = obj.get(name) {
            validate_attribute_type(attr_type, value, &join_path(path, name), diagnostics);
        }
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let value = match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
            return;
        }
        Some(v) => v,
    };

    let items: Vec<(String, &Value)> = match (nested.nesting_mode, value) {
        (BlockNestingMode::Single, v) => {
            validate_block(&nested.block, v, path, diagnostics);
            return;
        }
        (BlockNestingMode::List | BlockNestingMode::Set, Value::Array(arr)) => arr
            .iter()
            .enumerate()
            .map(|(i, item)| (format!("{}.{}", path, i), item))
            .collect(),
        (BlockNestingMode::Map, Value::Object(obj)) => obj
            .iter()
            .map(|(key, item)| (format!("{}.{}", path, key), item))
            .collect(),
        (mode, other) => {
            let expected = if mode == BlockNestingMode::Map { "map" } else { "list" };
            diagnostics.push(
                Diagnostic::error(format!("Expected {} for block '{}'", expected, path))
                    .with_detail(format!("Got {}", value_type_name(other)))
                    .with_attribute(path),
            );
            return;
        }
    };

    let len = items.len() as u32;
    if len < nested.min_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' requires at least {} item(s), got {}",
                path, nested.min_items, len
            ))
            .with_attribute(path),
        );
    }
    if nested.max_items > 0 && len > nested.max_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' allows at most {} item(s), got {}",
                path, nested.max_items, len
            ))
            .with_attribute(path),
        );
    }

    for (item_path, item) in items {
        validate_block(&nested.block, item, &item_path, diagnostics);
    }
}

/// Parse a user-supplied JSON payload, failing with
/// [`ProviderError::InvalidPayload`] if it is not well-formed.
pub fn parse_json_payload(attribute: &str, raw: &str) -> Result<Value, ProviderError> {
    serde_json::from_str(raw).map_err(|e| ProviderError::invalid_payload(attribute, e.to_string()))
}

/// Parse a payload that must be a JSON object of string values.
pub fn parse_string_map_payload(
    attribute: &str,
    raw: &str,
) -> Result<BTreeMap<String, String>, ProviderError> {
    serde_json::from_str(raw).map_err(|e| {
        ProviderError::invalid_payload(
            attribute,
            format!("expected a JSON object of string values: {}", e),
        )
    })
}

/// Re-serialize a JSON payload with sorted keys and no insignificant
/// whitespace.
pub fn normalize_json(attribute: &str, raw: &str) -> Result<String, ProviderError> {
    let value = parse_json_payload(attribute, raw)?;
    Ok(serde_json::to_string(&value)?)
}

/// Whether two JSON documents are semantically equal. Unparseable input
/// is never equal to anything.
pub fn json_equivalent(a: &str, b: &str) -> bool {
    match (
        serde_json::from_str::<Value>(a),
        serde_json::from_str::<Value>(b),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Diagnostics for a JSON payload attribute, if present and malformed.
pub fn check_json_attribute(record: &Value, attribute: &str) -> Option<Diagnostic> {
    let raw = record.get(attribute)?.as_str()?;
    parse_json_payload(attribute, raw)
        .err()
        .map(|e| e.to_diagnostic())
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() => true,
        Value::Number(n) => n
            .as_f64()
            .map(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
            .unwrap_or(false),
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeFlags, Block, NestedBlock, Schema};
    use serde_json::json;

    fn entity_schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("owner", Attribute::optional_string())
            .with_attribute("contact_ids", Attribute::string_list(AttributeFlags::required()))
    }

    #[test]
    fn test_validate_required_and_optional() {
        let schema = entity_schema();

        assert!(validate(&schema, &json!({"name": "hr", "contact_ids": []})).is_empty());

        let diagnostics = validate(&schema, &json!({"contact_ids": []}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("name"));

        let diagnostics = validate(&schema, &json!({"name": null, "contact_ids": []}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 4, "contact_ids": []}));
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_computed_attribute_skipped() {
        let schema = entity_schema();
        let diagnostics = validate(&schema, &json!({"id": 12, "name": "hr", "contact_ids": []}));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_validate_list_elements() {
        let schema = entity_schema();
        let diagnostics = validate(&schema, &json!({"name": "hr", "contact_ids": ["a", 1]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("contact_ids.1"));

        let diagnostics = validate(&schema, &json!({"name": "hr", "contact_ids": "a"}));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_validate_set_and_map() {
        let schema = Schema::v0()
            .with_attribute("principals", Attribute::string_set(AttributeFlags::optional()))
            .with_attribute("data", Attribute::string_map(AttributeFlags::optional()));

        assert!(validate(&schema, &json!({"principals": ["u1"], "data": {"k": "v"}})).is_empty());

        let diagnostics = validate(&schema, &json!({"principals": {}, "data": {"k": 1}}));
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics
            .iter()
            .any(|d| d.attribute.as_deref() == Some("data.k")));
    }

    #[test]
    fn test_validate_nested_schema_block() {
        let field = Block::new()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("primary", Attribute::optional_bool());
        let schema = Schema::v0().with_block(
            "schema",
            NestedBlock::single(
                Block::new()
                    .with_attribute("product_type", Attribute::required_string())
                    .with_block("fields", NestedBlock::list(field).with_max_items(2)),
            ),
        );

        let ok = json!({"schema": {"product_type": "stored", "fields": [{"name": "a"}]}});
        assert!(validate(&schema, &ok).is_empty());

        let bad = json!({"schema": {"product_type": "stored", "fields": [{"name": 1}]}});
        let diagnostics = validate(&schema, &bad);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("schema.fields.0.name")
        );

        let too_many = json!({"schema": {"product_type": "s", "fields": [
            {"name": "a"}, {"name": "b"}, {"name": "c"}
        ]}});
        let diagnostics = validate(&schema, &too_many);
        assert!(diagnostics[0].summary.contains("at most 2"));

        let not_list = json!({"schema": {"product_type": "s", "fields": {"name": "a"}}});
        let diagnostics = validate(&schema, &not_list);
        assert!(diagnostics[0].summary.contains("Expected list"));
    }

    #[test]
    fn test_validate_root_not_object() {
        let diagnostics = validate(&entity_schema(), &json!("nope"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
        assert!(diagnostics[0].attribute.is_none());
    }

    #[test]
    fn test_result_helpers() {
        let schema = entity_schema();
        assert!(is_valid(&schema, &json!({"name": "x", "contact_ids": []})));
        assert!(!is_valid(&schema, &json!({})));
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 2);
    }

    #[test]
    fn test_parse_json_payload() {
        assert_eq!(
            parse_json_payload("config_json", r#"{"a": 1}"#).unwrap(),
            json!({"a": 1})
        );

        let err = parse_json_payload("config_json", "{not json").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidPayload { ref attribute, .. } if attribute == "config_json"));
    }

    #[test]
    fn test_parse_string_map_payload() {
        let map = parse_string_map_payload("secret_json", r#"{"user": "u", "pass": "p"}"#).unwrap();
        assert_eq!(map.get("user").map(String::as_str), Some("u"));

        assert!(parse_string_map_payload("secret_json", r#"{"port": 5432}"#).is_err());
        assert!(parse_string_map_payload("secret_json", "[]").is_err());
    }

    #[test]
    fn test_normalize_and_compare() {
        let normalized = normalize_json("policy_json", "{ \"b\": 1,\n \"a\": [1, 2] }").unwrap();
        assert_eq!(normalized, r#"{"a":[1,2],"b":1}"#);

        assert!(json_equivalent(r#"{"a":1,"b":2}"#, r#"{ "b": 2, "a": 1 }"#));
        assert!(!json_equivalent(r#"{"a":1}"#, r#"{"a":2}"#));
        assert!(!json_equivalent("{", "{"));
    }

    #[test]
    fn test_check_json_attribute() {
        assert!(check_json_attribute(&json!({"config_json": "{}"}), "config_json").is_none());
        assert!(check_json_attribute(&json!({}), "config_json").is_none());

        let diag = check_json_attribute(&json!({"config_json": "{"}), "config_json").unwrap();
        assert_eq!(diag.attribute.as_deref(), Some("config_json"));
    }
}
