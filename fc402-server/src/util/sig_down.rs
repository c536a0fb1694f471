//! Shutdown on SIGTERM or SIGINT (Ctrl+C on Windows).
//!
//! ```ignore
//! let sig_down = SigDown::try_new()?;
//! axum::serve(listener, app)
//!     .with_graceful_shutdown(sig_down.cancellation_token().cancelled_owned())
//!     .await?;
//! ```

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Turns the first shutdown signal into a cancelled [`CancellationToken`].
#[allow(missing_debug_implementations)] // TaskTracker doesn't impl Debug
pub struct SigDown {
    listener: TaskTracker,
    token: CancellationToken,
}

impl SigDown {
    /// Installs the signal handlers.
    ///
    /// # Errors
    ///
    /// Returns [`std::io::Error`] if a Unix signal handler cannot be registered.
    #[allow(clippy::unnecessary_wraps)] // Result needed on Unix for signal registration
    pub fn try_new() -> Result<Self, std::io::Error> {
        let token = CancellationToken::new();
        let listener = TaskTracker::new();

        #[cfg(unix)]
        {
            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;
            let token = token.clone();
            listener.spawn(async move {
                let name = tokio::select! {
                    _ = sigterm.recv() => "SIGTERM",
                    _ = sigint.recv() => "SIGINT",
                };
                tracing::info!(signal = name, "Shutdown signal received");
                token.cancel();
            });
        }

        #[cfg(windows)]
        {
            let token = token.clone();
            listener.spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!(signal = "Ctrl+C", "Shutdown signal received");
                }
                token.cancel();
            });
        }

        listener.close();
        Ok(Self { listener, token })
    }

    /// Token cancelled once a signal arrives.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Waits for a signal and for the listener task to finish.
    pub async fn recv(&self) {
        self.token.cancelled().await;
        self.listener.wait().await;
    }
}
