//! `qagate` server: the admin router over an in-process data store.

use qagate_security::{MemoryDataClient, MockSessionProvider};

const SERVICE_ID: &str = "qagate-server";
const SERVICE_EMAIL: &str = "server@qagate.local";

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("qagate: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = qagate::config::load("dev")?;
    qagate::init_tracing(config.server.log_format);

    let rows = MemoryDataClient::with_session(MockSessionProvider::signed_in(SERVICE_ID, SERVICE_EMAIL));
    let client = qagate::connect(&config, rows).await;
    let app = qagate::admin_router(&config, client)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "qagate listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("qagate stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
