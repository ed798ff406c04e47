//! Termination-signal plumbing for the launcher.

use tracing::{info, warn};

/// Resolves when the launcher receives SIGINT or SIGTERM.
///
/// Selected against the child's exit: when this wins, the child is torn
/// down and its signal-derived exit code is mirrored. A handler that cannot
/// be installed leaves its branch pending forever; the other still fires.
pub async fn shutdown_signal() {
    let signal_name = tokio::select! {
        _ = sigint() => "SIGINT",
        _ = sigterm() => "SIGTERM",
    };
    info!(signal = %signal_name, "Received termination signal");
}

async fn sigint() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn sigterm() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut signal) => {
            signal.recv().await;
        }
        Err(error) => {
            warn!(error = %error, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}
