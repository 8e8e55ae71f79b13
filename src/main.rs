use std::sync::Arc;

use clap::Parser;
use gestures::{api, config::Config, logging, server::Server, store::GestureStore};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), gestures::ServerError> {
    let config = Config::parse();
    logging::init(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "starting gestures");

    let store = Arc::new(GestureStore::new());
    let server = Server::bind(&config.addr).await?;
    info!(address = %server.local_addr(), "server bound");

    server.serve(api::router(store), shutdown_signal()).await?;

    info!("gestures stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
