//! Error types for the MCP server binary.

use querypie_openapi_tools::error::OpenApiToolsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid command-line or environment settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Spec acquisition or tool synthesis failed before serving.
    #[error("Startup error: {0}")]
    Startup(#[from] OpenApiToolsError),

    /// The MCP transport failed to start or terminated abnormally.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Shutdown was requested before the server started serving.
    #[error("Interrupted during startup")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
