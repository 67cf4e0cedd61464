use std::time::Duration;

use tokio::signal;

pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
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

/// Resolves on the first shutdown signal and arms a watchdog that terminates
/// the process if draining and pool teardown overrun `grace_period`.
pub(crate) async fn shutdown_with_deadline(grace_period: Duration) {
    shutdown_signal().await;

    tokio::spawn(async move {
        tokio::time::sleep(grace_period).await;
        tracing::error!(
            grace_seconds = grace_period.as_secs(),
            "Graceful shutdown timed out; forcing exit"
        );
        std::process::exit(1);
    });
}
