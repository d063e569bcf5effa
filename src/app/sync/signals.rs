//! Shutdown signalling
//!
//! The first Ctrl-C / SIGTERM cancels a [`CancellationToken`] the session and
//! orchestrator check between manifest entries, so a running download is
//! always finished before the run stops. The token stays cancelled, so code
//! that only starts looking after the signal still sees it. A second signal
//! exits the process immediately.

use std::process;

use futures::stream::{self, Stream, StreamExt};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Exit status after a forced interrupt (128 + SIGINT)
pub const EXIT_INTERRUPTED: i32 = 130;

/// Signal handler for graceful shutdown coordination
pub struct SignalHandler {
    shutdown: CancellationToken,
}

impl SignalHandler {
    /// Create a new signal handler cancelling `shutdown`
    pub fn new(shutdown: CancellationToken) -> Self {
        Self { shutdown }
    }

    /// Spawn the task that turns Ctrl-C or SIGTERM into cancellation
    pub fn setup(&self) -> JoinHandle<()> {
        let signals = stream::unfold((), |()| async {
            wait_for_signal().await;
            Some(((), ()))
        });

        tokio::spawn(relay_signals(
            self.shutdown.clone(),
            Box::pin(signals),
            || process::exit(EXIT_INTERRUPTED),
        ))
    }
}

/// Cancel `shutdown` on the first signal and call `force_exit` on the second
async fn relay_signals<S, F>(shutdown: CancellationToken, mut signals: S, force_exit: F)
where
    S: Stream<Item = ()> + Unpin,
    F: FnOnce(),
{
    if signals.next().await.is_none() {
        return;
    }
    info!("Interrupt received, stopping after the current file (press Ctrl+C again to quit)");
    shutdown.cancel();

    if signals.next().await.is_some() {
        warn!("Second interrupt received, exiting");
        force_exit();
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Could not listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Could not listen for SIGTERM: {}", e);
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
}

/// Create the process-wide shutdown token
pub fn create_shutdown_token() -> CancellationToken {
    CancellationToken::new()
}
