use tokio::sync::watch;
use tracing::{info, warn};

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    signal_result = tokio::signal::ctrl_c() => log_ctrl_c(signal_result),
                    _ = terminate.recv() => info!("received SIGTERM"),
                }
            }
            Err(err) => {
                warn!("failed to install SIGTERM handler: {}", err);
                log_ctrl_c(tokio::signal::ctrl_c().await);
            }
        }
    }

    #[cfg(not(unix))]
    {
        log_ctrl_c(tokio::signal::ctrl_c().await);
    }
}

fn log_ctrl_c(result: std::io::Result<()>) {
    match result {
        Ok(()) => info!("received Ctrl+C"),
        Err(err) => warn!("failed to listen for Ctrl+C: {}", err),
    }
}

/// Fans one shutdown signal out to every listener.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Spawns the signal watcher.
    pub fn install() -> Self {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown_signal().await;
            let _ = tx.send(true);
        });
        Self { rx }
    }

    pub async fn wait(mut self) {
        // An error means the watcher is gone, which only happens after it sent.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}
