pub mod error;
pub mod route;
pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::core::config::Config;
use crate::server::route::server_router;
use crate::types::params::ServerParams;
use crate::{DispatcherError, DispatcherResult};
pub use error::JobRouteError;

/// Handle for managing the HTTP server lifecycle.
pub struct ServerHandle {
    shutdown_token: CancellationToken,
    task_handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Stops accepting connections, waits for in-flight requests, and returns once the server is down.
    pub async fn shutdown(self) -> Result<(), tokio::task::JoinError> {
        info!("Initiating server graceful shutdown");
        self.shutdown_token.cancel();
        self.task_handle.await
    }
}

/// Binds the configured address and serves the job routes on a background task.
///
/// `on_failure` is notified if the server stops on its own.
pub async fn setup_server(
    config: Arc<Config>,
    on_failure: Arc<tokio::sync::Notify>,
) -> DispatcherResult<(SocketAddr, ServerHandle)> {
    let (api_server_url, listener) = get_server_url(config.server_config()).await?;

    let shutdown_token = CancellationToken::new();
    let server_token = shutdown_token.clone();

    let app = server_router(config.clone());
    let task_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(server_token.clone().cancelled_owned()).await
        {
            error!(error = %e, "API server stopped with an error");
        }
        if !server_token.is_cancelled() {
            on_failure.notify_one();
        }
    });

    info!(address = %api_server_url, "API server listening");
    Ok((api_server_url, ServerHandle { shutdown_token, task_handle }))
}

pub(crate) async fn get_server_url(
    server_params: &ServerParams,
) -> DispatcherResult<(SocketAddr, tokio::net::TcpListener)> {
    let address = format!("{}:{}", server_params.host, server_params.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| DispatcherError::ServerError(format!("Failed to bind {address}: {e}")))?;
    let api_server_url = listener.local_addr()?;

    Ok((api_server_url, listener))
}
