//! Shutdown coordination for the gateway.

use tokio::sync::broadcast;

/// One-shot stop signal shared by the listener, the signal handler and tests.
///
/// Clones share the channel, so any holder can stop every subscriber.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Stop every subscriber. Firing twice, or with nobody listening, is a no-op.
    pub fn trigger(&self) {
        if self.tx.send(()).is_ok() {
            tracing::debug!(subscribers = self.tx.receiver_count(), "Shutdown triggered");
        }
    }

    /// Subscribers that have not yet dropped their receiver.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
