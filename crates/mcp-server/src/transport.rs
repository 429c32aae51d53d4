//! stdio and streamable-HTTP serving with bounded graceful shutdown.

use crate::error::{Result, ServerError};
use crate::server::QueryPieServer;
use rmcp::ServiceExt as _;
use rmcp::transport::stdio;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// In-flight work gets this long to finish after shutdown is requested.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Path the streamable HTTP endpoint is mounted on.
pub const MCP_PATH: &str = "/mcp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http { port: u16 },
}

/// Serve `server` until the client goes away or `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the transport cannot be started or terminates abnormally.
pub async fn serve(server: QueryPieServer, transport: Transport, shutdown: CancellationToken) -> Result<()> {
    match transport {
        Transport::Stdio => serve_stdio(server, shutdown).await,
        Transport::Http { port } => {
            serve_http(server, SocketAddr::from(([0, 0, 0, 0], port)), shutdown).await
        }
    }
}

async fn serve_stdio(server: QueryPieServer, shutdown: CancellationToken) -> Result<()> {
    tracing::info!("Starting MCP server on stdio");
    let running = server
        .serve(stdio())
        .await
        .map_err(|e| ServerError::Transport(format!("failed to start stdio transport: {e}")))?;
    let cancel = running.cancellation_token();

    tokio::select! {
        quit = running.waiting() => {
            let reason = quit.map_err(|e| ServerError::Transport(format!("stdio service task failed: {e}")))?;
            tracing::info!("MCP session ended: {reason:?}");
        }
        () = shutdown.cancelled() => {
            tracing::info!("Shutting down MCP server");
            cancel.cancel();
        }
    }
    Ok(())
}

async fn serve_http(server: QueryPieServer, addr: SocketAddr, shutdown: CancellationToken) -> Result<()> {
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );
    let router = axum::Router::new().nest_service(MCP_PATH, service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Starting MCP server on http://{}{MCP_PATH}", listener.local_addr()?);

    let graceful = shutdown.clone();
    let mut task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { graceful.cancelled().await })
            .await
    });

    tokio::select! {
        joined = &mut task => return flatten(joined),
        () = shutdown.cancelled() => {}
    }

    tracing::info!("Shutting down MCP server");
    // Streamable HTTP keeps SSE responses open; do not wait on them indefinitely.
    if let Ok(joined) = tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
        flatten(joined)
    } else {
        tracing::warn!(
            "Graceful shutdown did not finish within {}s; closing remaining connections",
            SHUTDOWN_GRACE.as_secs()
        );
        task.abort();
        Ok(())
    }
}

fn flatten(joined: std::result::Result<std::io::Result<()>, tokio::task::JoinError>) -> Result<()> {
    match joined {
        Ok(served) => Ok(served?),
        Err(e) => Err(ServerError::Transport(format!("HTTP server task failed: {e}"))),
    }
}
