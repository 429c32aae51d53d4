use crate::error::{Result, ServerError};
use clap::{Parser, ValueEnum};
use querypie_openapi_tools::config::{
    CacheConfig, DEFAULT_RELEASE_BASE_URL, ReleaseConfig, ToolsConfig, default_cache_root,
};
use std::path::PathBuf;
use std::time::Duration;

/// QueryPie API keys are 38 characters and start with `ap`.
const API_KEY_LEN: usize = 38;
const API_KEY_PREFIX: &str = "ap";

#[derive(Parser, Debug)]
#[command(
    name = "mcp-querypie",
    about = "Run the MCP Server for QueryPie",
    long_about = "MCP server that exposes the QueryPie REST API as tools.\n\n\
                  The matching OpenAPI document for the server's version is downloaded (and cached\n\
                  for 12 hours) and every operation becomes an MCP tool.\n\n\
                  Environment variables:\n\
                  - QUERYPIE_API_KEY: API key used as the bearer token (required)",
    after_help = "Examples:\n  \
                  QUERYPIE_API_KEY=... mcp-querypie https://api.querypie.com\n  \
                  QUERYPIE_API_KEY=... mcp-querypie https://api.querypie.com --transport http --port 8000",
    version
)]
pub struct Cli {
    /// QueryPie server URL (e.g. https://api.querypie.com)
    #[arg(value_name = "QUERYPIE_URL")]
    pub querypie_url: String,

    /// QueryPie API key
    #[arg(long, env = "QUERYPIE_API_KEY", hide_env_values = true, default_value = "")]
    pub api_key: String,

    /// MCP transport
    #[arg(short, long, value_enum, default_value_t = TransportKind::Stdio)]
    pub transport: TransportKind,

    /// Port for the http transport
    #[arg(short, long, default_value_t = 8000)]
    pub port: u16,

    /// Always download the OpenAPI spec instead of using the local cache
    #[arg(short, long)]
    pub no_cache: bool,

    /// Spec cache directory [default: {tmp}/.mcp-querypie]
    #[arg(long, env = "QUERYPIE_MCP_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Per-request timeout in seconds for outbound HTTP calls (0 disables)
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub request_timeout: u64,

    /// Repository URL that publishes the per-version OpenAPI artifacts
    #[arg(long, env = "QUERYPIE_MCP_RELEASE_URL", default_value = DEFAULT_RELEASE_BASE_URL, hide = true)]
    pub release_url: String,

    /// Log level / filter directive (overridden by RUST_LOG)
    #[arg(long, env = "QUERYPIE_MCP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    Stdio,
    /// Streamable HTTP on `/mcp`
    #[value(alias = "sse")]
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// Check settings clap cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the API key is missing or malformed.
    pub fn validate(&self) -> Result<()> {
        validate_api_key(&self.api_key)
    }

    #[must_use]
    pub fn tools_config(&self) -> ToolsConfig {
        let mut config = ToolsConfig::new(self.querypie_url.clone(), self.api_key.clone());
        config.no_cache = self.no_cache;
        config.cache = CacheConfig {
            root: self.cache_dir.clone().unwrap_or_else(default_cache_root),
            ..CacheConfig::default()
        };
        config.release = ReleaseConfig {
            base_url: self.release_url.clone(),
            ..ReleaseConfig::default()
        };
        config.request_timeout =
            (self.request_timeout > 0).then(|| Duration::from_secs(self.request_timeout));
        config
    }
}

fn validate_api_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(ServerError::Config("QUERYPIE_API_KEY is not set".to_string()));
    }
    // Keys that claim the QueryPie prefix must have the QueryPie length; others pass through.
    if key.starts_with(API_KEY_PREFIX) && key.len() != API_KEY_LEN {
        return Err(ServerError::Config("malformed QUERYPIE_API_KEY".to_string()));
    }
    Ok(())
}
