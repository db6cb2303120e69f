//! copilot-proxy server library.
//!
//! Provides a reusable server function to serve the proxy either for the binary, or for
//! integration tests.

#![deny(missing_docs)]

mod context;
pub mod error;
mod history;
pub mod logger;
mod pipeline;
mod routes;

use std::net::SocketAddr;

use anyhow::anyhow;
use config::Config;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

pub use context::{AppContext, bootstrap};

/// Configuration for serving the proxy.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to.
    pub listen_address: SocketAddr,
    /// The loaded proxy configuration.
    pub config: Config,
    /// Cancellation token for graceful shutdown.
    pub shutdown_signal: CancellationToken,
    /// The version string to log on startup.
    pub version: String,
    /// Optional oneshot sender to send back the bound address (useful if port 0 was specified).
    pub bound_addr_sender: Option<tokio::sync::oneshot::Sender<SocketAddr>>,
}

/// Bootstraps credentials and the model catalog, then starts and runs the HTTP server until
/// `shutdown_signal` fires.
pub async fn serve(
    ServeConfig { listen_address, config, shutdown_signal, version, bound_addr_sender }: ServeConfig,
) -> anyhow::Result<()> {
    log::info!("copilot-proxy {version}");

    let cors = match &config.server.cors_allow_origins {
        Some(origins) => {
            let origins = origins.iter().filter_map(|o| o.parse().ok()).collect::<Vec<_>>();
            CorsLayer::new().allow_origin(origins).allow_methods(tower_http::cors::Any).allow_headers(tower_http::cors::Any)
        }
        None => CorsLayer::permissive(),
    };

    let ctx = context::bootstrap(config).await?;

    let app = routes::router().with_state(ctx).layer(cors);

    let listener = TcpListener::bind(listen_address).await.map_err(|e| anyhow!("failed to bind to {listen_address}: {e}"))?;

    if let Some(sender) = bound_addr_sender {
        let _ = sender.send(listener.local_addr()?);
    }

    log::info!("listening on http://{listen_address}");

    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result.map_err(|e| anyhow!("server error: {e}"))?;
        }
        _ = shutdown_signal.cancelled() => {
            log::info!("received shutdown signal, shutting down gracefully");
        }
    }

    Ok(())
}
