//! Local validation of attribute values against a [`Schema`].
//!
//! Runs before any remote call so that bad input never reaches
//! EndPointMonitor. Every problem is collected; validation never stops at the
//! first failure.
//!
//! # Example
//!
//! ```
//! use endpointmonitor_provider::schema::{Schema, Attribute};
//! use endpointmonitor_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("search", Attribute::required_string())
//!     .with_attribute("id", Attribute::computed_int64());
//!
//! assert!(validate(&schema, &json!({"search": "prod-east"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"search": 5}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics.as_slice()[0].attribute, Some("search".to_string()));
//! ```

use serde_json::Value;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::schema::{Attribute, AttributeType, Schema};
use crate::types::value_type_name;

/// Validate a JSON object against a schema.
///
/// # Validation Rules
///
/// - The value must be an object
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed-only attributes are skipped (the service sets these)
/// - Attribute types must match the schema, including list and map elements
/// - Attributes the schema does not declare are rejected
pub fn validate(schema: &Schema, value: &Value) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();

    let obj = match value {
        Value::Object(map) => map,
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value))),
            );
            return diagnostics;
        },
    };

    for (name, attr) in &schema.attributes {
        validate_attribute(attr, obj.get(name), name, &mut diagnostics);
    }

    for name in obj.keys() {
        if !schema.attributes.contains_key(name) {
            diagnostics.push(
                Diagnostic::error(format!("Unsupported attribute '{}'", name))
                    .with_detail("This attribute is not declared for this type")
                    .with_attribute(name.as_str()),
            );
        }
    }

    diagnostics
}

/// Returns `true` if `value` passes [`validate`].
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Diagnostics,
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
        },
        Some(v) => validate_type(&attr.attr_type, v, path, diagnostics),
    }
}

fn validate_type(attr_type: &AttributeType, value: &Value, path: &str, diagnostics: &mut Diagnostics) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int32 => {
            let fits = value.as_i64().is_some_and(|n| i32::try_from(n).is_ok());
            if !fits {
                diagnostics.push(type_error(path, "int32", value));
            }
        },
        AttributeType::Int64 => {
            if !value.is_i64() && !value.is_u64() {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Float64 => {
            if !value.is_number() {
                diagnostics.push(type_error(path, "float64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) => match value.as_array() {
            Some(arr) => {
                for (i, elem) in arr.iter().enumerate() {
                    validate_type(element_type, elem, &format!("{}.{}", path, i), diagnostics);
                }
            },
            None => diagnostics.push(type_error(path, "list", value)),
        },
        AttributeType::Map(value_type) => match value.as_object() {
            Some(obj) => {
                for (key, val) in obj {
                    validate_type(value_type, val, &format!("{}.{}", path, key), diagnostics);
                }
            },
            None => diagnostics.push(type_error(path, "map", value)),
        },
        AttributeType::Dynamic => {},
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}
