use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancels `cancellation` on Ctrl-C or SIGTERM. Returns early when something else cancels it.
///
/// Detached processes on Windows don't receive console signals, there `focusboard stop`
/// terminates the process instead.
pub async fn detect_shutdown(cancellation: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C {e:?}");
                return;
            }
            info!("Received Ctrl-C, shutting down");
            cancellation.cancel();
        },
        _ = terminate() => {
            info!("Received termination signal, shutting down");
            cancellation.cancel();
        },
        _ = cancellation.cancelled() => (),
    };
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!("Failed to listen for SIGTERM {e:?}");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}
