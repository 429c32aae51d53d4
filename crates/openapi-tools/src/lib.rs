//! QueryPie `OpenAPI` → MCP tooling.
//!
//! Discovers the target server's version, obtains the matching `OpenAPI` document (local cache
//! first, release artifacts second), turns every operation into a [`tool::ToolDefinition`] and
//! dispatches tool calls back to the server as authenticated HTTP requests.
//!
//! Transport and process concerns live in the `querypie-mcp-server` binary.

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod resolver;
pub mod schema;
pub mod synth;
pub mod tool;
pub mod version;
