use tokio::signal::unix::{signal, SignalKind};

use crate::scheduler::TerminationSignal;

/// Install a shutdown handler that listens for SIGTERM and SIGINT.
///
/// Either signal raises `termination`, so markers finish the question they
/// are working on and stop at the top of their next iteration.
pub fn install_shutdown_handler(termination: TerminationSignal) {
    tokio::spawn(async move {
        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "Failed to install signal handlers");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, stopping markers");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, stopping markers");
            }
            _ = termination.raised() => return,
        }

        termination.raise();
    });
}
