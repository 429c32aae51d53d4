//! Executes tool calls against the target server.
//!
//! Argument placement is driven entirely by the tool's [`ParameterSpec`]s: path placeholders are
//! substituted with percent-escaped values, query parameters are appended (arrays joined with
//! `,`), headers are copied as strings and body fields are collected into one JSON object. The
//! API key is always sent as `Authorization: Bearer ...`, replacing any caller-supplied value.

use crate::error::{OpenApiToolsError, Result};
use crate::http::{join_path, sanitize_reqwest_error};
use crate::tool::{ParamLocation, ParameterSpec, ToolDefinition};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use rmcp::model::{CallToolResult, Content, JsonObject};
use serde_json::Value;
use url::Url;

/// Outcome of an HTTP exchange that completed.
///
/// Statuses are not errors at this level: the body is returned verbatim, with `is_error` set for
/// status 400 and above, so the calling agent can read what the server said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub status: u16,
    pub content: String,
    pub is_error: bool,
}

impl DispatchOutcome {
    #[must_use]
    pub fn into_call_tool_result(self) -> CallToolResult {
        let content = vec![Content::text(self.content)];
        if self.is_error {
            CallToolResult::error(content)
        } else {
            CallToolResult::success(content)
        }
    }
}

/// Where each argument ended up, before URL assembly.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestParts {
    /// Path with placeholders substituted.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// `None` when no body field was supplied.
    pub body: Option<JsonObject>,
}

/// Place `arguments` according to `tool`'s parameters.
///
/// Path-item parameters are applied before operation parameters; a name present at both levels
/// produces two query entries. Absent and `null` arguments are skipped.
#[must_use]
pub fn build_request_parts(tool: &ToolDefinition, arguments: &JsonObject) -> RequestParts {
    let mut parts = RequestParts::default();
    let mut body = JsonObject::new();
    let mut path_values: Vec<(&str, String)> = Vec::new();

    let params = tool
        .path_item_params
        .iter()
        .chain(&tool.operation_params)
        .chain(&tool.body_fields);

    for param in params {
        let Some(value) = arguments.get(&param.name).filter(|v| !v.is_null()) else {
            continue;
        };
        if param.location == ParamLocation::Path {
            path_values.push((param.name.as_str(), escape_path_segment(&value_to_string(value))));
        } else {
            place(param, value, &mut parts, &mut body);
        }
    }
    parts.path = substitute_path(&tool.path, &path_values);

    if !parts.path.starts_with('/') {
        parts.path = format!("/{}", parts.path);
    }
    if !body.is_empty() {
        parts.body = Some(body);
    }
    parts
}

/// Replace `{name}` placeholders in one scan of the template, so substituted values are never
/// re-examined. A later value for the same name wins; unknown placeholders stay as written.
fn substitute_path(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|i| open + i) else {
            break;
        };
        out.push_str(&rest[..open]);
        let name = &rest[open + 1..close];
        match values.iter().rev().find(|(n, _)| *n == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[open..=close]),
        }
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out
}

fn place(param: &ParameterSpec, value: &Value, parts: &mut RequestParts, body: &mut JsonObject) {
    match param.location {
        // Substituted by `substitute_path`.
        ParamLocation::Path => {}
        ParamLocation::Query => {
            let joined = match value {
                Value::Array(items) => items
                    .iter()
                    .map(value_to_string)
                    .collect::<Vec<_>>()
                    .join(","),
                other => value_to_string(other),
            };
            parts.query.push((param.name.clone(), joined));
        }
        ParamLocation::Header => {
            parts
                .headers
                .push((param.name.clone(), value_to_string(value)));
        }
        ParamLocation::Body => {
            body.insert(param.name.clone(), value.clone());
        }
    }
}

/// Sends tool calls to one QueryPie server with one API key.
#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(client: Client, base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url,
            api_key: api_key.into(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Perform the HTTP request for one tool call.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::Request`] if the request cannot be built (bad header name or
    /// value, unparsable URL), the connection fails or times out, or the response body cannot
    /// be read. A completed exchange with any status is an `Ok`.
    pub async fn invoke(&self, tool: &ToolDefinition, arguments: &JsonObject) -> Result<DispatchOutcome> {
        let parts = build_request_parts(tool, arguments);
        let url = build_url(&self.base_url, &parts.path, &parts.query)?;
        let headers = self.headers(&parts)?;

        let mut request = self
            .client
            .request(tool.method.clone(), url)
            .headers(headers);
        if let Some(body) = &parts.body {
            let bytes = serde_json::to_vec(body).map_err(|e| {
                OpenApiToolsError::Request(format!("failed to marshal request body: {e}"))
            })?;
            request = request.body(bytes);
        }

        let response = request.send().await.map_err(|e| {
            OpenApiToolsError::Request(format!(
                "failed to send request: {}",
                sanitize_reqwest_error(&e)
            ))
        })?;

        let status = response.status();
        let content = response.text().await.map_err(|e| {
            OpenApiToolsError::Request(format!(
                "failed to read response body: {}",
                sanitize_reqwest_error(&e)
            ))
        })?;

        tracing::debug!(
            tool = %tool.name,
            method = %tool.method,
            status = status.as_u16(),
            "Tool call completed"
        );

        Ok(DispatchOutcome {
            status: status.as_u16(),
            content,
            is_error: status.as_u16() >= 400,
        })
    }

    fn headers(&self, parts: &RequestParts) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &parts.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                OpenApiToolsError::Request(format!("invalid header name '{name}': {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                OpenApiToolsError::Request(format!("invalid value for header '{name}': {e}"))
            })?;
            headers.append(name, value);
        }

        if parts.body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|e| {
            OpenApiToolsError::Request(format!("API key is not a valid header value: {e}"))
        })?;
        auth.set_sensitive(true);
        // `insert` drops any Authorization the caller supplied.
        headers.insert(AUTHORIZATION, auth);

        Ok(headers)
    }
}

fn build_url(base_url: &Url, path: &str, query: &[(String, String)]) -> Result<Url> {
    let mut url = join_path(base_url, path)
        .map_err(|e| OpenApiToolsError::Request(format!("Invalid URL: {e}")))?;

    if !query.is_empty() {
        let mut encoded = String::new();
        for (i, (key, value)) in query.iter().enumerate() {
            if i > 0 {
                encoded.push('&');
            }
            encoded.push_str(&percent_encode(key));
            encoded.push('=');
            encoded.push_str(&percent_encode(value));
        }
        url.set_query(Some(&encoded));
    }

    Ok(url)
}

/// Path segments use the same encoding as query components; `/` inside a value must not
/// introduce a new segment.
fn escape_path_segment(s: &str) -> String {
    percent_encode(s)
}

/// Percent-encode everything outside RFC 3986 `unreserved`.
fn percent_encode(s: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

fn is_unreserved(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~')
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PrimitiveType;
    use axum::extract::{Path, Request};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::{any, get};
    use axum::{Json, Router};
    use querypie_test_support::MockServer;
    use reqwest::Method;
    use serde_json::json;

    fn spec(name: &str, location: ParamLocation) -> ParameterSpec {
        ParameterSpec {
            name: name.to_string(),
            location,
            required: false,
            kind: PrimitiveType::String,
            description: String::new(),
            pattern: None,
        }
    }

    fn tool(method: Method, path: &str, params: Vec<ParameterSpec>) -> ToolDefinition {
        ToolDefinition {
            name: "t".to_string(),
            description: String::new(),
            method,
            path: path.to_string(),
            path_item_params: vec![],
            operation_params: params,
            body_fields: vec![],
        }
    }

    fn args(v: Value) -> JsonObject {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn path_placeholders_are_substituted_and_escaped() {
        let t = tool(
            Method::GET,
            "/users/{id}/roles/{roleId}",
            vec![spec("id", ParamLocation::Path), spec("roleId", ParamLocation::Path)],
        );
        let parts = build_request_parts(&t, &args(json!({"id": 42, "roleId": "admin"})));
        assert_eq!(parts.path, "/users/42/roles/admin");

        let parts = build_request_parts(&t, &args(json!({"id": "a b/c", "roleId": "ü"})));
        assert_eq!(parts.path, "/users/a%20b%2Fc/roles/%C3%BC");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let t = tool(
            Method::GET,
            "/users/{id}/roles/{roleId}",
            vec![spec("id", ParamLocation::Path), spec("roleId", ParamLocation::Path)],
        );
        let parts = build_request_parts(&t, &args(json!({"id": "{roleId}", "roleId": "admin"})));
        assert_eq!(parts.path, "/users/%7BroleId%7D/roles/admin");

        let t = tool(Method::GET, "/users/{id}/{other}", vec![spec("id", ParamLocation::Path)]);
        let parts = build_request_parts(&t, &args(json!({"id": "a}b"})));
        assert_eq!(parts.path, "/users/a%7Db/{other}");
    }

    #[test]
    fn query_arrays_are_comma_joined() {
        let t = tool(
            Method::GET,
            "/search",
            vec![spec("tags", ParamLocation::Query), spec("limit", ParamLocation::Query)],
        );
        let parts = build_request_parts(&t, &args(json!({"tags": ["a", "b", "c"], "limit": 10})));
        assert_eq!(
            parts.query,
            vec![
                ("tags".to_string(), "a,b,c".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
        assert!(parts.body.is_none());
    }

    #[test]
    fn both_parameter_levels_are_applied() {
        let mut t = tool(Method::GET, "/items", vec![spec("scope", ParamLocation::Query)]);
        t.path_item_params = vec![spec("scope", ParamLocation::Query)];
        let parts = build_request_parts(&t, &args(json!({"scope": ["x", "y"]})));
        assert_eq!(
            parts.query,
            vec![
                ("scope".to_string(), "x,y".to_string()),
                ("scope".to_string(), "x,y".to_string()),
            ]
        );
    }

    #[test]
    fn headers_and_body_fields_are_collected() {
        let mut t = tool(
            Method::POST,
            "users",
            vec![spec("X-Request-Id", ParamLocation::Header), spec("dryRun", ParamLocation::Query)],
        );
        t.body_fields = vec![spec("name", ParamLocation::Body), spec("roles", ParamLocation::Body)];

        let parts = build_request_parts(
            &t,
            &args(json!({
                "X-Request-Id": 7,
                "dryRun": null,
                "name": "kim",
                "roles": ["admin"],
                "unknown": "ignored",
            })),
        );
        assert_eq!(parts.path, "/users");
        assert_eq!(parts.headers, vec![("X-Request-Id".to_string(), "7".to_string())]);
        assert!(parts.query.is_empty());
        assert_eq!(
            parts.body,
            Some(args(json!({"name": "kim", "roles": ["admin"]})))
        );
    }

    #[test]
    fn url_keeps_base_path_and_encodes_query() {
        let base = Url::parse("https://qp.example.com/api/").unwrap();
        let url = build_url(
            &base,
            "/users/42",
            &[("tags".to_string(), "a,b c".to_string())],
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://qp.example.com/api/users/42?tags=a%2Cb%20c");
    }

    #[test]
    fn url_drops_query_and_fragment_of_base() {
        let base = Url::parse("https://qp.example.com/api?x=1#frag").unwrap();
        let url = build_url(&base, "/users", &[]).unwrap();
        assert_eq!(url.as_str(), "https://qp.example.com/api/users");
    }

    async fn echo(req: Request) -> impl IntoResponse {
        let (parts, body) = req.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let header = |name: &str| {
            parts
                .headers
                .get_all(name)
                .iter()
                .map(|v| v.to_str().unwrap().to_string())
                .collect::<Vec<_>>()
        };
        Json(json!({
            "method": parts.method.as_str(),
            "path": parts.uri.path(),
            "query": parts.uri.query(),
            "authorization": header("authorization"),
            "contentType": header("content-type"),
            "trace": header("x-trace"),
            "body": String::from_utf8_lossy(&bytes),
        }))
    }

    async fn echo_server() -> MockServer {
        let app = Router::new()
            .route(
                "/api/missing/{id}",
                get(|| async { (StatusCode::NOT_FOUND, r#"{"error":"not found"}"#) }),
            )
            .route(
                "/api/status/{code}",
                get(|Path(code): Path<u16>| async move {
                    (StatusCode::from_u16(code).unwrap(), format!("status {code}"))
                }),
            )
            .route("/api/{*path}", any(echo));
        MockServer::start(app).await.unwrap()
    }

    fn dispatcher(server: &MockServer) -> Dispatcher {
        Dispatcher::new(
            Client::new(),
            Url::parse(&server.url("/api")).unwrap(),
            "qp-secret",
        )
    }

    #[tokio::test]
    async fn invoke_sends_bearer_query_and_no_body_for_get() {
        let server = echo_server().await;
        let t = tool(
            Method::GET,
            "/users/{id}",
            vec![
                spec("id", ParamLocation::Path),
                spec("tags", ParamLocation::Query),
                spec("X-Trace", ParamLocation::Header),
                spec("Authorization", ParamLocation::Header),
            ],
        );

        let outcome = dispatcher(&server)
            .invoke(
                &t,
                &args(json!({
                    "id": 42,
                    "tags": ["a", "b"],
                    "X-Trace": "t-1",
                    "Authorization": "Bearer caller-token",
                })),
            )
            .await
            .unwrap();

        assert!(!outcome.is_error);
        assert_eq!(outcome.status, 200);
        let echoed: Value = serde_json::from_str(&outcome.content).unwrap();
        assert_eq!(echoed["method"], "GET");
        assert_eq!(echoed["path"], "/api/users/42");
        assert_eq!(echoed["query"], "tags=a%2Cb");
        assert_eq!(echoed["authorization"], json!(["Bearer qp-secret"]));
        assert_eq!(echoed["trace"], json!(["t-1"]));
        assert_eq!(echoed["contentType"], json!([]));
        assert_eq!(echoed["body"], "");
    }

    #[tokio::test]
    async fn invoke_sends_json_body_fields() {
        let server = echo_server().await;
        let mut t = tool(Method::PUT, "/users/{id}", vec![spec("id", ParamLocation::Path)]);
        t.body_fields = vec![spec("name", ParamLocation::Body), spec("age", ParamLocation::Body)];

        let outcome = dispatcher(&server)
            .invoke(&t, &args(json!({"id": 1, "name": "kim", "age": 30})))
            .await
            .unwrap();

        let echoed: Value = serde_json::from_str(&outcome.content).unwrap();
        assert_eq!(echoed["method"], "PUT");
        assert_eq!(echoed["contentType"], json!(["application/json"]));
        let body: Value = serde_json::from_str(echoed["body"].as_str().unwrap()).unwrap();
        assert_eq!(body, json!({"name": "kim", "age": 30}));
    }

    #[tokio::test]
    async fn non_success_status_is_reported_not_raised() {
        let server = echo_server().await;
        let t = tool(Method::GET, "/missing/{id}", vec![spec("id", ParamLocation::Path)]);

        let outcome = dispatcher(&server)
            .invoke(&t, &args(json!({"id": 9})))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome {
                status: 404,
                content: r#"{"error":"not found"}"#.to_string(),
                is_error: true,
            }
        );

        let result = outcome.into_call_tool_result();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn connection_failure_is_an_error() {
        let port = querypie_test_support::pick_unused_port().unwrap();
        let d = Dispatcher::new(
            Client::new(),
            Url::parse(&format!("http://127.0.0.1:{port}")).unwrap(),
            "qp-secret",
        );
        let err = d
            .invoke(&tool(Method::GET, "/x", vec![]), &JsonObject::new())
            .await
            .unwrap_err();
        assert!(
            matches!(err, OpenApiToolsError::Request(ref m) if m.starts_with("failed to send request")),
            "{err}"
        );
    }

    #[tokio::test]
    async fn invalid_header_value_is_an_error() {
        let server = echo_server().await;
        let t = tool(Method::GET, "/x", vec![spec("X-Trace", ParamLocation::Header)]);
        let err = dispatcher(&server)
            .invoke(&t, &args(json!({"X-Trace": "line\nbreak"})))
            .await
            .unwrap_err();
        assert!(matches!(err, OpenApiToolsError::Request(_)), "{err}");
    }

    #[tokio::test]
    async fn only_status_400_and_above_is_an_error() {
        let server = echo_server().await;
        let t = tool(Method::GET, "/status/{code}", vec![spec("code", ParamLocation::Path)]);
        let d = dispatcher(&server);

        for (code, is_error) in [(200, false), (304, false), (399, false), (400, true), (503, true)] {
            let outcome = d.invoke(&t, &args(json!({"code": code}))).await.unwrap();
            assert_eq!(outcome.status, code);
            assert_eq!(outcome.is_error, is_error, "status {code}");
        }
    }
}
