use clap::Parser;

use hangar_server::ServerConfig;
use hangar_store::Store;

/// Testbed session recording and live-annotation hub.
#[derive(Parser)]
#[command(name = "hangar", version)]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    tracing::info!("Starting hangar server");

    // All records live and die with this process.
    let store = Store::new();

    let config = ServerConfig {
        port: args.port,
        ..Default::default()
    };
    let handle = hangar_server::start(config, store)
        .await
        .expect("Failed to start server");

    tracing::info!(port = handle.port, "hangar ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}
