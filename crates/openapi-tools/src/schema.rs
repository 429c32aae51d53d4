//! Reduction of `OpenAPI` schemas to the flat primitive types exposed in tool input schemas.
//!
//! Nested structure is not modelled: an object or array argument is advertised as a bare
//! `object`/`array` and passed through to the upstream API as-is.

use openapiv3::{Schema, SchemaKind, Type};
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    /// Both `integer` and `number`; advertised to clients as JSON `number`.
    Integer,
    Boolean,
    Array,
    Object,
}

impl PrimitiveType {
    /// JSON Schema `type` keyword for this primitive.
    #[must_use]
    pub fn json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Map an `OpenAPI` `type` keyword. Absent or unknown types are strings.
    #[must_use]
    pub fn from_type_name(name: Option<&str>) -> Self {
        match name {
            Some("integer" | "number") => Self::Integer,
            Some("boolean") => Self::Boolean,
            Some("array") => Self::Array,
            Some("object") => Self::Object,
            _ => Self::String,
        }
    }
}

/// What a single argument looks like once flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedSchema {
    pub kind: PrimitiveType,
    /// Schema description with any enum values appended; may be empty.
    pub description: String,
    /// Only carried for string arguments.
    pub pattern: Option<String>,
}

#[must_use]
pub fn map_schema(schema: &Schema) -> MappedSchema {
    let (kind, pattern, enum_values): (PrimitiveType, Option<String>, Vec<String>) =
        match &schema.schema_kind {
            SchemaKind::Type(Type::String(s)) => (
                PrimitiveType::String,
                s.pattern.clone(),
                s.enumeration
                    .iter()
                    .map(|v| v.clone().unwrap_or_else(|| "null".to_string()))
                    .collect(),
            ),
            SchemaKind::Type(Type::Number(n)) => {
                (PrimitiveType::Integer, None, render_enum(&n.enumeration))
            }
            SchemaKind::Type(Type::Integer(i)) => {
                (PrimitiveType::Integer, None, render_enum(&i.enumeration))
            }
            SchemaKind::Type(Type::Boolean(b)) => {
                (PrimitiveType::Boolean, None, render_enum(&b.enumeration))
            }
            SchemaKind::Type(Type::Object(_)) => (PrimitiveType::Object, None, Vec::new()),
            SchemaKind::Type(Type::Array(_)) => (PrimitiveType::Array, None, Vec::new()),
            SchemaKind::Any(any) => (
                PrimitiveType::from_type_name(any.typ.as_deref()),
                any.pattern.clone(),
                any.enumeration.iter().map(render_json_scalar).collect(),
            ),
            // Composite schemas have no single primitive type.
            SchemaKind::OneOf { .. }
            | SchemaKind::AllOf { .. }
            | SchemaKind::AnyOf { .. }
            | SchemaKind::Not { .. } => (PrimitiveType::String, None, Vec::new()),
        };

    MappedSchema {
        kind,
        description: describe_schema(schema.schema_data.description.as_deref(), &enum_values),
        pattern: pattern
            .filter(|p| !p.is_empty())
            .filter(|_| kind == PrimitiveType::String),
    }
}

/// `"{description}\n\nEnum values:\n- a\n- b"`, trimmed; either half may be absent.
#[must_use]
pub fn describe_schema(description: Option<&str>, enum_values: &[String]) -> String {
    let mut out = String::new();
    if let Some(desc) = description.filter(|d| !d.is_empty()) {
        out.push_str(desc);
        out.push_str("\n\n");
    }
    if !enum_values.is_empty() {
        out.push_str("Enum values:\n");
        for v in enum_values {
            out.push_str("- ");
            out.push_str(v);
            out.push('\n');
        }
    }
    out.trim().to_string()
}

/// Combine a parameter's own description with its schema description.
///
/// The schema text is appended after a blank line unless it repeats the parameter text.
#[must_use]
pub fn parameter_description(own: Option<&str>, schema_description: &str) -> String {
    let own = own.unwrap_or_default();
    if own == schema_description {
        return own.trim().to_string();
    }
    format!("{own}\n\n{schema_description}").trim().to_string()
}

/// JSON Schema fragment for one flattened argument.
#[must_use]
pub fn property_schema(kind: PrimitiveType, description: &str, pattern: Option<&str>) -> Value {
    let mut obj = Map::new();
    obj.insert("type".to_string(), json!(kind.json_type()));
    if !description.is_empty() {
        obj.insert("description".to_string(), json!(description));
    }
    if let Some(p) = pattern {
        obj.insert("pattern".to_string(), json!(p));
    }
    Value::Object(obj)
}

fn render_enum<T: ToString>(values: &[Option<T>]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.as_ref().map_or_else(|| "null".to_string(), ToString::to_string))
        .collect()
}

fn render_json_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
