use std::sync::Arc;

use tokio::signal;
use tokio::sync::Notify;
use tracing::{info, warn};

#[cfg(unix)]
use signal::unix::{signal, SignalKind};

/// Signal types that can trigger shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ShutdownSignal {
    /// SIGTERM - container graceful shutdown
    #[strum(serialize = "SIGTERM")]
    Terminate,
    /// SIGINT - Ctrl+C
    #[strum(serialize = "SIGINT")]
    Interrupt,
    /// A component asked the process to stop, e.g. the server task died
    #[strum(serialize = "INTERNAL")]
    Internal,
}

/// Signal handler for graceful shutdown
#[derive(Default)]
pub struct SignalHandler {
    internal_shutdown_notify: Arc<Notify>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that lets a task request shutdown
    pub fn get_shutdown_trigger(&self) -> Arc<Notify> {
        self.internal_shutdown_notify.clone()
    }

    /// Wait for any shutdown signal and return which one was received
    pub async fn wait_for_shutdown(&self) -> std::io::Result<ShutdownSignal> {
        let signal = self.wait_for_signal().await?;
        info!("Received shutdown signal: {}", signal);
        Ok(signal)
    }

    #[cfg(unix)]
    async fn wait_for_signal(&self) -> std::io::Result<ShutdownSignal> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        Ok(tokio::select! {
            _ = sigterm.recv() => ShutdownSignal::Terminate,
            _ = sigint.recv() => ShutdownSignal::Interrupt,
            _ = self.internal_shutdown_notify.notified() => {
                warn!("Internal shutdown requested");
                ShutdownSignal::Internal
            }
        })
    }

    #[cfg(not(unix))]
    async fn wait_for_signal(&self) -> std::io::Result<ShutdownSignal> {
        Ok(tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                ShutdownSignal::Interrupt
            }
            _ = self.internal_shutdown_notify.notified() => {
                warn!("Internal shutdown requested");
                ShutdownSignal::Internal
            }
        })
    }
}
