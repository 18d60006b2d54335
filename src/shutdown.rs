//! Termination signals that trigger the graceful shutdown path.

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Registered signal listeners. Registration happens in [`ShutdownSignal::install`],
/// so a signal that arrives before the first `recv` is not lost.
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: Signal,
    #[cfg(unix)]
    terminate: Signal,
    #[cfg(windows)]
    ctrl_c: tokio::signal::windows::CtrlC,
}

impl ShutdownSignal {
    /// Must be called from within the Tokio runtime.
    ///
    /// # Errors
    /// Returns an error if the OS refuses to register a signal handler.
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            interrupt: signal(SignalKind::interrupt())?,
            #[cfg(unix)]
            terminate: signal(SignalKind::terminate())?,
            #[cfg(windows)]
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    /// Resolves on SIGINT (Ctrl+C) or SIGTERM.
    #[cfg(unix)]
    pub async fn recv(&mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => tracing::info!("SIGINT (Ctrl+C) received, shutting down"),
            _ = self.terminate.recv() => tracing::info!("SIGTERM received, shutting down"),
        }
    }

    /// Resolves on Ctrl+C.
    #[cfg(windows)]
    pub async fn recv(&mut self) {
        self.ctrl_c.recv().await;
        tracing::info!("Ctrl+C received, shutting down");
    }

    #[cfg(not(any(unix, windows)))]
    pub async fn recv(&mut self) {
        std::future::pending::<()>().await;
    }
}
