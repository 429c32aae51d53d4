mod cli;
mod error;
mod server;
mod transport;

use clap::Parser;
use cli::{Cli, LogFormat, TransportKind};
use error::{Result, ServerError};
use querypie_openapi_tools::bootstrap::bootstrap;
use querypie_openapi_tools::dispatch::Dispatcher;
use querypie_openapi_tools::http::build_client;
use server::QueryPieServer;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use transport::{SHUTDOWN_GRACE, Transport};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let shutdown = CancellationToken::new();
    let outcome = runtime.block_on(async {
        tokio::spawn(shutdown_signal(shutdown.clone()));
        run(cli, shutdown).await
    });

    // The stdio reader holds a blocking-pool thread in a read on stdin that nothing can
    // interrupt; dropping the runtime normally would wait for it forever.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    if let Err(e) = outcome {
        tracing::error!("{e}");
        return Err(e.into());
    }
    tracing::info!("MCP server stopped");
    Ok(())
}

async fn run(cli: Cli, shutdown: CancellationToken) -> Result<()> {
    cli.validate()?;
    tracing::info!("Starting MCP Server for QueryPie");

    let config = cli.tools_config();
    let client = build_client(config.request_timeout)?;

    let boot = tokio::select! {
        boot = bootstrap(&config, &client) => boot?,
        () = shutdown.cancelled() => {
            return Err(ServerError::Interrupted);
        }
    };
    tracing::info!(
        "Serving {} tools for QueryPie {} ({:?} spec {})",
        boot.tools.len(),
        boot.target_version,
        boot.source,
        boot.spec_version
    );

    let dispatcher = Dispatcher::new(client, boot.base_url, config.api_key);
    let server = QueryPieServer::new(boot.tools, dispatcher, boot.target_version);

    let transport = match cli.transport {
        TransportKind::Stdio => Transport::Stdio,
        TransportKind::Http => Transport::Http { port: cli.port },
    };
    transport::serve(server, transport, shutdown).await
}

/// Logs go to stderr; stdout belongs to the stdio transport.
fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, initiating graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
    }
    shutdown.cancel();
}
