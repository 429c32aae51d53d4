#![allow(dead_code)]

use anyhow::Context as _;
use axum::extract::{Path, RawQuery};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::process::{Child, Command, Stdio};

pub use querypie_test_support::{KillOnDrop, MockServer, pick_unused_port, wait_for_exit, wait_port_open};

#[cfg(unix)]
pub use querypie_test_support::send_sigterm;

pub const API_KEY: &str = "integration-test-key";

pub const SPEC: &str = r"
openapi: 3.0.3
info: { title: QueryPie, version: '10.3.1' }
paths:
  /users/{id}:
    parameters:
      - { name: id, in: path, required: true, description: User id, schema: { type: integer } }
    get:
      operationId: getUser
      summary: Get a user
      parameters:
        - name: fields
          in: query
          schema: { type: array, items: { type: string } }
    delete:
      operationId: deleteUser
      summary: Delete a user
  /users:
    post:
      operationId: createUser
      description: Create a user
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              required: [name]
              properties:
                name: { type: string }
                age: { type: integer }
";

fn header(headers: &HeaderMap, name: &str) -> Value {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map_or(Value::Null, |v| json!(v))
}

async fn get_user(Path(id): Path<String>, RawQuery(query): RawQuery, headers: HeaderMap) -> impl IntoResponse {
    Json(json!({
        "id": id,
        "query": query,
        "authorization": header(&headers, "authorization"),
    }))
}

async fn delete_user() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, r#"{"error":"not found"}"#)
}

async fn create_user(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(json!({
            "created": body,
            "contentType": header(&headers, "content-type"),
        })),
    )
}

async fn artifact(Path((_tag, file)): Path<(String, String)>) -> impl IntoResponse {
    if file == "v10-3-1-openapi.yaml" {
        (StatusCode::OK, SPEC.to_string())
    } else {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    }
}

/// A fake QueryPie server that also hosts the release artifacts.
pub async fn start_upstream() -> anyhow::Result<MockServer> {
    let app = Router::new()
        .route("/version", get(|| async { Json(json!({"version": "10.3.1-ga"})) }))
        .route("/releases/download/{tag}/{file}", get(artifact))
        .route("/users", axum::routing::post(create_user))
        .route("/users/{id}", get(get_user).delete(delete_user));
    MockServer::start(app).await.context("start upstream")
}

fn base_command(program: &str, upstream: &MockServer, cache_dir: &std::path::Path) -> Vec<String> {
    vec![
        program.to_string(),
        upstream.base_url().to_string(),
        "--cache-dir".to_string(),
        cache_dir.display().to_string(),
        "--release-url".to_string(),
        upstream.base_url().to_string(),
        "--log-level".to_string(),
        "debug".to_string(),
    ]
}

/// Spawn the server on stdio with piped stdin/stdout.
pub fn spawn_stdio(upstream: &MockServer, cache_dir: &std::path::Path) -> anyhow::Result<tokio::process::Child> {
    let args = base_command(env!("CARGO_BIN_EXE_mcp-querypie"), upstream, cache_dir);
    tokio::process::Command::new(&args[0])
        .args(&args[1..])
        .env("QUERYPIE_API_KEY", API_KEY)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .context("spawn mcp-querypie (stdio)")
}

/// Spawn the server on the streamable HTTP transport.
pub fn spawn_http(upstream: &MockServer, cache_dir: &std::path::Path, port: u16) -> anyhow::Result<Child> {
    let args = base_command(env!("CARGO_BIN_EXE_mcp-querypie"), upstream, cache_dir);
    Command::new(&args[0])
        .args(&args[1..])
        .arg("--transport")
        .arg("http")
        .arg("--port")
        .arg(port.to_string())
        .env("QUERYPIE_API_KEY", API_KEY)
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("spawn mcp-querypie (http)")
}
