//! Output side of the coalescer.

use tokio::sync::mpsc;

/// Capacity of the output channel.
///
/// Kept at one so the worker parks in `send` as soon as the consumer falls
/// behind. Anything larger would queue timer ticks instead of dropping them.
pub(crate) const OUTPUT_CAPACITY: usize = 1;

/// A refresh trigger. Carries no data: "re-fetch current state now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Signal;

/// Pull-side handle for coalesced signals.
///
/// Yields `None` once the worker has terminated and every delivered signal
/// has been read.
#[derive(Debug)]
pub struct Signals {
    rx: mpsc::Receiver<Signal>,
}

impl Signals {
    pub(crate) fn channel() -> (mpsc::Sender<Signal>, Self) {
        let (tx, rx) = mpsc::channel(OUTPUT_CAPACITY);
        (tx, Self { rx })
    }

    /// Wait for the next signal.
    pub async fn recv(&mut self) -> Option<Signal> {
        self.rx.recv().await
    }

    /// Take a signal if one is ready, without waiting.
    pub fn try_recv(&mut self) -> Option<Signal> {
        self.rx.try_recv().ok()
    }

    /// Whether the worker has dropped its end of the channel.
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }
}
