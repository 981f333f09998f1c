//! Shape descriptors and structural validation for dynamic values.
//!
//! A [`Shape`] plays two separate roles: it serializes into capability
//! announcements so the agent side can render/construct parameters, and it
//! validates inbound JSON values before a handler ever sees them. Validation
//! returns a structured [`ValidationError`] whose issues carry the path into
//! the value, suitable for `INVALID_PARAMETERS` error details.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Declared shape of a parameter, property, or action argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    /// Any JSON string.
    String,
    /// Any JSON number.
    Number,
    /// A JSON number with no fractional part.
    Integer,
    Boolean,
    Null,
    /// Accepts any value, including `null`.
    Any,
    /// Closed-world object: unknown keys are rejected.
    Object {
        #[serde(default)]
        properties: IndexMap<String, Property>,
    },
    Array {
        items: Box<Shape>,
    },
    /// One of a fixed set of JSON values.
    Enum {
        values: Vec<Value>,
    },
}

/// A named property inside an object shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(flatten)]
    pub shape: Shape,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Property {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            required: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A single validation failure, anchored to a path inside the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    /// Dotted path into the value; `$` is the root.
    pub path: String,
    pub expected: String,
    pub message: String,
}

/// Structured validation failure: one or more issues.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation failed with {} issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "; {}: {}", issue.path, issue.message)?;
        }
        Ok(())
    }
}

impl ValidationError {
    /// JSON projection of the issues, for error `details` on the wire.
    pub fn to_details(&self) -> Value {
        serde_json::to_value(&self.issues).unwrap_or(Value::Null)
    }
}

impl Shape {
    /// Empty object shape, the usual declaration for "no parameters".
    pub fn empty_object() -> Self {
        Shape::Object {
            properties: IndexMap::new(),
        }
    }

    /// Object shape from `(name, property)` pairs, preserving order.
    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, Property)>,
        K: Into<String>,
    {
        Shape::Object {
            properties: properties
                .into_iter()
                .map(|(k, p)| (k.into(), p))
                .collect(),
        }
    }

    /// Validate `value` against this shape.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        self.check(value, "$", &mut issues);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    fn check(&self, value: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
        match self {
            Shape::Any => {}
            Shape::String => {
                if !value.is_string() {
                    issues.push(mismatch(path, "string", value));
                }
            }
            Shape::Number => {
                if !value.is_number() {
                    issues.push(mismatch(path, "number", value));
                }
            }
            Shape::Integer => {
                let ok = value.is_i64() || value.is_u64();
                if !ok {
                    issues.push(mismatch(path, "integer", value));
                }
            }
            Shape::Boolean => {
                if !value.is_boolean() {
                    issues.push(mismatch(path, "boolean", value));
                }
            }
            Shape::Null => {
                if !value.is_null() {
                    issues.push(mismatch(path, "null", value));
                }
            }
            Shape::Enum { values } => {
                if !values.contains(value) {
                    issues.push(ValidationIssue {
                        path: path.to_string(),
                        expected: "enum".to_string(),
                        message: format!(
                            "value is not one of the {} allowed values",
                            values.len()
                        ),
                    });
                }
            }
            Shape::Array { items } => match value {
                Value::Array(elements) => {
                    for (i, element) in elements.iter().enumerate() {
                        items.check(element, &format!("{}[{}]", path, i), issues);
                    }
                }
                _ => issues.push(mismatch(path, "array", value)),
            },
            Shape::Object { properties } => match value {
                Value::Object(map) => {
                    for (name, property) in properties {
                        let child_path = format!("{}.{}", path, name);
                        match map.get(name) {
                            Some(child) => property.shape.check(child, &child_path, issues),
                            None if property.required => issues.push(ValidationIssue {
                                path: child_path,
                                expected: "present".to_string(),
                                message: format!("required property `{}` is missing", name),
                            }),
                            None => {}
                        }
                    }
                    for key in map.keys() {
                        if !properties.contains_key(key) {
                            issues.push(ValidationIssue {
                                path: format!("{}.{}", path, key),
                                expected: "absent".to_string(),
                                message: format!("unknown property `{}`", key),
                            });
                        }
                    }
                }
                _ => issues.push(mismatch(path, "object", value)),
            },
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(path: &str, expected: &str, value: &Value) -> ValidationIssue {
    ValidationIssue {
        path: path.to_string(),
        expected: expected.to_string(),
        message: format!("expected {}, got {}", expected, type_name(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point_shape() -> Shape {
        Shape::object([
            ("x", Property::new(Shape::Number).required()),
            ("y", Property::new(Shape::Number).required()),
            ("label", Property::new(Shape::String)),
        ])
    }

    #[test]
    fn accepts_matching_object() {
        let shape = point_shape();
        assert!(shape.validate(&json!({"x": 1.5, "y": 2})).is_ok());
        assert!(shape
            .validate(&json!({"x": 0, "y": 0, "label": "origin"}))
            .is_ok());
    }

    #[test]
    fn missing_required_property_is_reported_with_path() {
        let shape = point_shape();
        let err = shape.validate(&json!({"x": 1})).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].path, "$.y");
    }

    #[test]
    fn unknown_property_is_rejected() {
        let shape = point_shape();
        let err = shape.validate(&json!({"x": 1, "y": 2, "z": 3})).unwrap_err();
        assert_eq!(err.issues[0].path, "$.z");
        assert_eq!(err.issues[0].expected, "absent");
    }

    #[test]
    fn nested_paths_are_tracked() {
        let shape = Shape::object([(
            "points",
            Property::new(Shape::Array {
                items: Box::new(point_shape()),
            })
            .required(),
        )]);
        let err = shape
            .validate(&json!({"points": [{"x": 1, "y": 2}, {"x": "no"}]}))
            .unwrap_err();
        let paths: Vec<_> = err.issues.iter().map(|i| i.path.as_str()).collect();
        assert!(paths.contains(&"$.points[1].x"));
        assert!(paths.contains(&"$.points[1].y"));
    }

    #[test]
    fn integer_rejects_fractional_numbers() {
        assert!(Shape::Integer.validate(&json!(3)).is_ok());
        assert!(Shape::Integer.validate(&json!(3.5)).is_err());
        assert!(Shape::Number.validate(&json!(3.5)).is_ok());
    }

    #[test]
    fn enum_matches_exact_values() {
        let shape = Shape::Enum {
            values: vec![json!("on"), json!("off")],
        };
        assert!(shape.validate(&json!("on")).is_ok());
        assert!(shape.validate(&json!("dimmed")).is_err());
    }

    #[test]
    fn shape_serializes_with_type_tag() {
        let json = serde_json::to_value(point_shape()).unwrap();
        assert_eq!(json["type"], "object");
        assert_eq!(json["properties"]["x"]["type"], "number");
        assert_eq!(json["properties"]["x"]["required"], true);
    }
}
