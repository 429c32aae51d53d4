//! Tool definitions synthesized from `OpenAPI` operations, and their MCP projection.

use crate::schema::{PrimitiveType, property_schema};
use reqwest::Method;
use rmcp::model::{JsonObject, Tool, ToolAnnotations};
use serde_json::{Value, json};
use std::sync::Arc;

/// Where an argument goes in the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    /// A top-level property of the JSON request body.
    Body,
}

/// One flattened tool argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    /// Argument name; also the path placeholder, query key, header name, or body property.
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
    pub kind: PrimitiveType,
    pub description: String,
    pub pattern: Option<String>,
}

impl ParameterSpec {
    #[must_use]
    pub fn json_schema(&self) -> Value {
        property_schema(self.kind, &self.description, self.pattern.as_deref())
    }
}

/// A callable tool bound to one HTTP operation.
///
/// Parameters declared on the path item and on the operation are kept apart: both lists are
/// applied at dispatch time, path-item first, so a name declared at both levels is sent twice.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// The operation's `operationId`.
    pub name: String,
    pub description: String,
    pub method: Method,
    /// Path template, e.g. `/users/{id}`.
    pub path: String,
    pub path_item_params: Vec<ParameterSpec>,
    pub operation_params: Vec<ParameterSpec>,
    pub body_fields: Vec<ParameterSpec>,
}

impl ToolDefinition {
    /// Every advertised argument, in declaration order.
    pub fn parameters(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.path_item_params
            .iter()
            .chain(&self.operation_params)
            .chain(&self.body_fields)
    }

    /// `{"type":"object","properties":{...},"required":[...]}`.
    ///
    /// Later declarations of the same argument name replace earlier ones in `properties`.
    #[must_use]
    pub fn input_schema(&self) -> JsonObject {
        let mut properties = JsonObject::new();
        let mut required: Vec<String> = Vec::new();

        for param in self.parameters() {
            properties.insert(param.name.clone(), param.json_schema());
            if param.required && !required.contains(&param.name) {
                required.push(param.name.clone());
            }
        }

        let mut schema = JsonObject::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), json!(required));
        }
        schema
    }

    #[must_use]
    pub fn to_mcp_tool(&self) -> Tool {
        let mut tool = Tool::new(
            self.name.clone(),
            self.description.clone(),
            Arc::new(self.input_schema()),
        );
        tool.annotations = Some(annotations_for_method(&self.method));
        tool
    }
}

/// MCP tool hints derived from HTTP method semantics.
///
/// Every tool talks to an external server, so `openWorldHint` is always set. PATCH leaves
/// `idempotentHint` unset.
#[must_use]
pub fn annotations_for_method(method: &Method) -> ToolAnnotations {
    let (read_only, destructive, idempotent) = match *method {
        Method::GET | Method::HEAD | Method::OPTIONS => (Some(true), Some(false), Some(true)),
        Method::POST => (Some(false), Some(false), Some(false)),
        Method::PUT | Method::DELETE => (Some(false), Some(true), Some(true)),
        Method::PATCH => (Some(false), Some(true), None),
        _ => (None, None, None),
    };

    ToolAnnotations {
        title: None,
        read_only_hint: read_only,
        destructive_hint: destructive,
        idempotent_hint: idempotent,
        open_world_hint: Some(true),
    }
}
