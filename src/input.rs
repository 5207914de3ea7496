//! Operator input: interrupt signals.
//!
//! Nothing here touches progress state directly; an interrupt is forwarded to
//! the coordinator as an event through a [`ProgressHandle`].

use std::fmt;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressHandle;

/// Operator signal that asked the run to stop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptSignal {
    /// SIGINT, usually Ctrl+C in the terminal
    Interrupt,
    /// SIGTERM
    Terminate,
    /// Platform Ctrl+C handler, used where Unix signals are unavailable
    CtrlC,
}

impl fmt::Display for InterruptSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => write!(f, "SIGINT"),
            Self::Terminate => write!(f, "SIGTERM"),
            Self::CtrlC => write!(f, "Ctrl+C"),
        }
    }
}

/// Wait for SIGINT or SIGTERM and report which one arrived
///
/// A signal whose handler cannot be registered is skipped. With neither
/// registered, falls back to [`tokio::signal::ctrl_c`].
#[cfg(unix)]
pub async fn wait_for_interrupt() -> InterruptSignal {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    fn register(kind: SignalKind, name: InterruptSignal) -> Option<Signal> {
        signal(kind)
            .inspect_err(|e| tracing::warn!(signal = %name, error = %e, "could not register handler"))
            .ok()
    }

    let interrupt = register(SignalKind::interrupt(), InterruptSignal::Interrupt);
    let terminate = register(SignalKind::terminate(), InterruptSignal::Terminate);

    let received = match (interrupt, terminate) {
        (Some(mut interrupt), Some(mut terminate)) => tokio::select! {
            _ = interrupt.recv() => InterruptSignal::Interrupt,
            _ = terminate.recv() => InterruptSignal::Terminate,
        },
        (Some(mut interrupt), None) => {
            interrupt.recv().await;
            InterruptSignal::Interrupt
        }
        (None, Some(mut terminate)) => {
            terminate.recv().await;
            InterruptSignal::Terminate
        }
        (None, None) => ctrl_c().await,
    };

    tracing::info!(signal = %received, "operator interrupt received");
    received
}

/// Wait for Ctrl+C
#[cfg(not(unix))]
pub async fn wait_for_interrupt() -> InterruptSignal {
    let received = ctrl_c().await;
    tracing::info!(signal = %received, "operator interrupt received");
    received
}

/// Ctrl+C through the platform handler; never resolves if it cannot be installed
async fn ctrl_c() -> InterruptSignal {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for Ctrl+C, interrupts are ignored");
        std::future::pending::<()>().await;
    }
    InterruptSignal::CtrlC
}

/// Forward the first completion of `interrupt` to the coordinator
///
/// The task yields `true` once it has forwarded an interrupt, or `false` when
/// `stop` was cancelled first.
pub fn spawn_interrupt_forwarder<F>(
    interrupt: F,
    progress: ProgressHandle,
    stop: CancellationToken,
) -> JoinHandle<bool>
where
    F: std::future::Future + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = stop.cancelled() => false,
            _ = interrupt => {
                tracing::debug!("forwarding operator interrupt");
                progress.interrupt();
                true
            }
        }
    })
}
