//! Turns an `OpenAPI` document into [`ToolDefinition`]s.
//!
//! One tool per operation (GET, POST, PUT, DELETE, PATCH) that carries an `operationId`. Nothing
//! in a malformed document aborts synthesis: unusable elements are skipped and recorded as
//! [`Diagnostic`]s for the caller to log.

use crate::error::Result;
use crate::http::parse_base_url;
use crate::resolver::RefResolver;
use crate::schema::{map_schema, parameter_description};
use crate::tool::{ParamLocation, ParameterSpec, ToolDefinition};
use openapiv3::{
    OpenAPI, Operation, Parameter, ParameterSchemaOrContent, PathItem, ReferenceOr, RequestBody,
    Schema, SchemaKind, Type,
};
use reqwest::Method;
use std::fmt;
use url::Url;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Something in the document that was skipped or could not be used as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// `METHOD /path`, or just `/path` for path-level problems.
    pub scope: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.scope, self.message)
    }
}

#[derive(Debug)]
pub struct Synthesis {
    /// The validated server URL every tool is dispatched against.
    pub base_url: Url,
    pub tools: Vec<ToolDefinition>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Build tool definitions for every exposable operation in `spec`.
///
/// # Errors
///
/// Fails only if `server_url` is not an absolute `http(s)` URL, or if the document cannot be
/// snapshotted for `$ref` resolution.
pub fn synthesize(spec: &OpenAPI, server_url: &str) -> Result<Synthesis> {
    let base_url = parse_base_url(server_url)?;
    let mut synth = Synthesizer {
        resolver: RefResolver::new(spec)?,
        diagnostics: Vec::new(),
    };

    let mut tools = Vec::new();
    for (path, item_ref) in &spec.paths.paths {
        let item: PathItem = match synth.resolver.resolve(item_ref) {
            Ok(item) => item,
            Err(e) => {
                synth.note(path, format!("path item skipped: {e}"));
                continue;
            }
        };

        for (method, unexposed) in [("HEAD", &item.head), ("OPTIONS", &item.options), ("TRACE", &item.trace)] {
            if unexposed.is_some() {
                synth.note(&format!("{method} {path}"), "method is not exposed as a tool".to_string());
            }
        }

        let path_item_params = synth.parameters(path, &item.parameters);

        for (method, operation) in exposed_operations(&item) {
            let scope = format!("{method} {path}");
            if let Some(tool) = synth.tool(&scope, method, path, operation, &path_item_params) {
                tracing::debug!(tool = %tool.name, "Synthesized tool for {scope}");
                tools.push(tool);
            }
        }
    }

    Ok(Synthesis {
        base_url,
        tools,
        diagnostics: synth.diagnostics,
    })
}

fn exposed_operations(item: &PathItem) -> impl Iterator<Item = (Method, &Operation)> {
    [
        (Method::GET, item.get.as_ref()),
        (Method::POST, item.post.as_ref()),
        (Method::PUT, item.put.as_ref()),
        (Method::DELETE, item.delete.as_ref()),
        (Method::PATCH, item.patch.as_ref()),
    ]
    .into_iter()
    .filter_map(|(method, op)| op.map(|op| (method, op)))
}

struct Synthesizer {
    resolver: RefResolver,
    diagnostics: Vec<Diagnostic>,
}

impl Synthesizer {
    fn note(&mut self, scope: &str, message: String) {
        self.diagnostics.push(Diagnostic {
            scope: scope.to_string(),
            message,
        });
    }

    fn tool(
        &mut self,
        scope: &str,
        method: Method,
        path: &str,
        operation: &Operation,
        path_item_params: &[ParameterSpec],
    ) -> Option<ToolDefinition> {
        let Some(name) = operation
            .operation_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
        else {
            self.note(scope, "missing operationId; operation skipped".to_string());
            return None;
        };

        let description = operation
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .or(operation.summary.as_deref())
            .unwrap_or_default()
            .to_string();

        let operation_params = self.parameters(scope, &operation.parameters);
        let body_fields = operation
            .request_body
            .as_ref()
            .map(|body| self.body_fields(scope, body))
            .unwrap_or_default();

        Some(ToolDefinition {
            name: name.to_string(),
            description,
            method,
            path: path.to_string(),
            path_item_params: path_item_params.to_vec(),
            operation_params,
            body_fields,
        })
    }

    fn parameters(&mut self, scope: &str, params: &[ReferenceOr<Parameter>]) -> Vec<ParameterSpec> {
        params
            .iter()
            .filter_map(|p| self.parameter(scope, p))
            .collect()
    }

    fn parameter(&mut self, scope: &str, param_ref: &ReferenceOr<Parameter>) -> Option<ParameterSpec> {
        let param: Parameter = match self.resolver.resolve(param_ref) {
            Ok(p) => p,
            Err(e) => {
                self.note(scope, format!("parameter skipped: {e}"));
                return None;
            }
        };

        let (data, location) = match &param {
            Parameter::Path { parameter_data, .. } => (parameter_data, ParamLocation::Path),
            Parameter::Query { parameter_data, .. } => (parameter_data, ParamLocation::Query),
            Parameter::Header { parameter_data, .. } => (parameter_data, ParamLocation::Header),
            Parameter::Cookie { parameter_data, .. } => {
                self.note(
                    scope,
                    format!("cookie parameter '{}' is not supported; skipped", parameter_data.name),
                );
                return None;
            }
        };

        let ParameterSchemaOrContent::Schema(schema_ref) = &data.format else {
            self.note(
                scope,
                format!("parameter '{}' has no schema; skipped", data.name),
            );
            return None;
        };
        let schema: Schema = match self.resolver.resolve(schema_ref) {
            Ok(s) => s,
            Err(e) => {
                self.note(scope, format!("parameter '{}' skipped: {e}", data.name));
                return None;
            }
        };

        let mapped = map_schema(&schema);
        Some(ParameterSpec {
            name: data.name.clone(),
            location,
            // Path templates cannot be filled without a value.
            required: location == ParamLocation::Path || data.required,
            kind: mapped.kind,
            description: parameter_description(data.description.as_deref(), &mapped.description),
            pattern: mapped.pattern,
        })
    }

    /// Flatten the top-level properties of a JSON object request body.
    fn body_fields(&mut self, scope: &str, body_ref: &ReferenceOr<RequestBody>) -> Vec<ParameterSpec> {
        let body: RequestBody = match self.resolver.resolve(body_ref) {
            Ok(b) => b,
            Err(e) => {
                self.note(scope, format!("request body skipped: {e}"));
                return Vec::new();
            }
        };

        let Some(media) = body.content.get(JSON_CONTENT_TYPE) else {
            if !body.content.is_empty() {
                self.note(
                    scope,
                    format!("request body has no {JSON_CONTENT_TYPE} content; body not exposed"),
                );
            }
            return Vec::new();
        };
        let Some(schema_ref) = media.schema.as_ref() else {
            return Vec::new();
        };
        let schema: Schema = match self.resolver.resolve(schema_ref) {
            Ok(s) => s,
            Err(e) => {
                self.note(scope, format!("request body skipped: {e}"));
                return Vec::new();
            }
        };

        let (properties, required) = match &schema.schema_kind {
            SchemaKind::Type(Type::Object(obj)) => (&obj.properties, &obj.required),
            SchemaKind::Any(any) if !any.properties.is_empty() => (&any.properties, &any.required),
            _ => {
                self.note(
                    scope,
                    "request body is not a JSON object; body not exposed".to_string(),
                );
                return Vec::new();
            }
        };

        let mut fields = Vec::with_capacity(properties.len());
        for (name, prop_ref) in properties {
            let prop: Box<Schema> = match self.resolver.resolve(prop_ref) {
                Ok(s) => s,
                Err(e) => {
                    self.note(scope, format!("body property '{name}' skipped: {e}"));
                    continue;
                }
            };
            let mapped = map_schema(&prop);
            fields.push(ParameterSpec {
                name: name.clone(),
                location: ParamLocation::Body,
                // An optional body makes every field optional.
                required: body.required && required.contains(name),
                kind: mapped.kind,
                description: mapped.description,
                pattern: mapped.pattern,
            });
        }
        fields
    }
}
