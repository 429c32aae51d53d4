//! Error types for `querypie-openapi-tools`.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for `OpenAPI` tooling.
#[derive(Error, Debug)]
pub enum OpenApiToolsError {
    /// Configuration errors (invalid settings handed in by the caller).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The server URL (or a URL derived from it) could not be parsed.
    #[error("malformed server URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The target server could not be asked for its version.
    #[error("failed to get version from '{url}': {message}")]
    VersionUnreachable { url: String, message: String },

    /// The target server answered, but with a version string we cannot key on.
    #[error("failed to parse version (version={raw})")]
    VersionUnparsable { raw: String },

    /// The versioned `OpenAPI` artifact could not be downloaded (fallback included).
    #[error("OpenAPI error: failed to fetch spec from '{url}': {message}")]
    SpecUnavailable { url: String, message: String },

    #[error("OpenAPI error: failed to parse OpenAPI spec: {source}")]
    SpecParse {
        #[source]
        source: serde_yaml::Error,
    },

    /// `OpenAPI` errors (reference resolution, unsupported constructs).
    #[error("OpenAPI error: {0}")]
    OpenApi(String),

    /// Tool-call dispatch failures (connect, read, request construction).
    #[error("Request error: {0}")]
    Request(String),
}

/// Result type alias for `OpenAPI` tooling operations.
pub type Result<T> = std::result::Result<T, OpenApiToolsError>;

/// Why a cached spec could not be used.
///
/// None of these abort startup; callers fall through to a fresh download.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("openapi.yaml does not exist in cache: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cached openapi.yaml is outdated ({}s old): {}", age.as_secs(), path.display())]
    Outdated { path: PathBuf, age: Duration },

    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),
}
