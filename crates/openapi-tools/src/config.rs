use std::path::PathBuf;
use std::time::Duration;

/// Name used for the cache directory (`{tmp}/.mcp-querypie`) and the outbound user agent.
pub const TOOL_NAME: &str = "mcp-querypie";

/// Release of this tool whose artifacts hold the per-version `OpenAPI` documents.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Where the versioned `OpenAPI` artifacts are published.
pub const DEFAULT_RELEASE_BASE_URL: &str = "https://github.com/querypie/querypie-mcp-server";

/// A cached spec is trusted for this long after it was written.
pub const CACHE_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Applied to every outbound request unless overridden.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything the startup pipeline needs, already validated by the caller.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    /// Target QueryPie server, e.g. `https://api.querypie.com`.
    pub server_url: String,

    /// Opaque bearer token sent with every dispatched call.
    pub api_key: String,

    /// Skip reading (and writing) the local spec cache.
    pub no_cache: bool,

    pub cache: CacheConfig,

    pub release: ReleaseConfig,

    /// `None` disables the per-request timeout.
    pub request_timeout: Option<Duration>,
}

impl ToolsConfig {
    #[must_use]
    pub fn new(server_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            api_key: api_key.into(),
            no_cache: false,
            cache: CacheConfig::default(),
            release: ReleaseConfig::default(),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

/// Location and freshness window of the on-disk spec cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub root: PathBuf,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_cache_root(),
            ttl: CACHE_TTL,
        }
    }
}

/// `{tmp}/.mcp-querypie`
#[must_use]
pub fn default_cache_root() -> PathBuf {
    std::env::temp_dir().join(format!(".{TOOL_NAME}"))
}

/// Artifact store coordinates.
#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    /// Repository URL; artifacts live under `{base_url}/releases/download/...`.
    pub base_url: String,
    /// Release tag (without the leading `v`) the artifacts are taken from.
    pub tool_version: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_RELEASE_BASE_URL.to_string(),
            tool_version: TOOL_VERSION.to_string(),
        }
    }
}
