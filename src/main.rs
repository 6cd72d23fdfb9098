use std::net::SocketAddr;
use std::path::PathBuf;

use redap::config::Configuration;
use redap::{app, initialize_state, telemetry};
use tokio::net::TcpListener;

/// Environment variable overriding the configuration path.
const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::setup_logging();

    let config = Configuration::read(std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
        .inspect_err(|err| tracing::error!(error = %err, "cannot read configuration"))?;
    let address: SocketAddr = config.address.parse()?;

    let state = initialize_state(config)
        .await
        .inspect_err(|err| tracing::error!(error = %err, "cannot initialize application"))?;

    let listener = TcpListener::bind(address).await?;
    tracing::info!(%address, "server started");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(err) => tracing::error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
