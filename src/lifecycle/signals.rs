//! OS signal handling.
//!
//! SIGTERM and SIGINT both trigger graceful shutdown; on other platforms only
//! Ctrl+C is observed.

use std::io;

use crate::lifecycle::shutdown::Shutdown;

/// Resolve once a termination signal arrives.
#[cfg(unix)]
pub async fn terminate() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = term.recv() => tracing::info!("SIGTERM received"),
        _ = interrupt.recv() => tracing::info!("SIGINT received"),
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn terminate() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Trigger `shutdown` on the first termination signal.
pub async fn forward_to(shutdown: &Shutdown) -> io::Result<()> {
    terminate().await?;
    tracing::info!("Shutting down gracefully");
    shutdown.trigger();
    Ok(())
}
