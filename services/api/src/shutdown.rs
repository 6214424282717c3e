//! services/api/src/shutdown.rs
//!
//! Graceful shutdown on Ctrl+C or SIGTERM.

use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancels `token` on the first Ctrl+C or SIGTERM. The SIGTERM handler is
/// installed when this is called, not when the future is first polled.
pub fn shutdown_signal(token: CancellationToken) -> impl Future<Output = ()> {
    #[cfg(unix)]
    let mut terminate =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("Failed to install the SIGTERM handler: {}", e);
                None
            }
        };

    async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match terminate.as_mut() {
                Some(stream) => {
                    stream.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down gracefully..."),
            _ = terminate => info!("Received SIGTERM, shutting down gracefully..."),
        }
        token.cancel();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn sigterm_cancels_the_token() {
        let token = CancellationToken::new();
        let listener = tokio::spawn(shutdown_signal(token.clone()));

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), token.cancelled())
            .await
            .unwrap();
        listener.await.unwrap();
    }
}
