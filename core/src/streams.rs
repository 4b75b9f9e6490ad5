//! Event streams (C6): single-producer multi-consumer broadcast channels
//! the orchestrator publishes to and callers subscribe to.
//!
//! Backpressure policy: both streams are bounded `tokio::sync::broadcast`
//! channels. A subscriber that falls behind the channel capacity loses the
//! oldest unread events rather than blocking the producer — publication
//! must never stall the sync engine's single-threaded event loop. Callers
//! that need every event (e.g. a database-backed subscriber that must not
//! miss a write) should drain their receiver promptly; a slow logging
//! subscriber dropping a few old header heights is an acceptable tradeoff.

use tokio::sync::broadcast;

use crate::tx::Tx;

/// `(address, tx, height, is_verified)` — published once a transaction's
/// database write has committed (spec §3/§5).
#[derive(Debug, Clone)]
pub struct TransactionEvent {
    pub address: String,
    pub tx: Tx,
    pub height: u64,
    pub is_verified: bool,
}

const DEFAULT_CAPACITY: usize = 1024;

/// Owns the two broadcast channels a [`crate::orchestrator::Ledger`] exposes.
pub struct EventStreams {
    tx_sender: broadcast::Sender<TransactionEvent>,
    header_sender: broadcast::Sender<u64>,
}

impl EventStreams {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx_sender, _) = broadcast::channel(capacity);
        let (header_sender, _) = broadcast::channel(capacity);
        Self { tx_sender, header_sender }
    }

    /// Subscribes to `on_transaction`.
    pub fn subscribe_transactions(&self) -> broadcast::Receiver<TransactionEvent> {
        self.tx_sender.subscribe()
    }

    /// Subscribes to `on_header`.
    pub fn subscribe_headers(&self) -> broadcast::Receiver<u64> {
        self.header_sender.subscribe()
    }

    /// Publishes a transaction event. No-op (besides logging) if there are
    /// no subscribers.
    pub(crate) fn publish_transaction(&self, event: TransactionEvent) {
        tracing::info!(
            address = %event.address,
            txid = %event.tx.id,
            height = event.height,
            is_verified = event.is_verified,
            "on_transaction"
        );
        let _ = self.tx_sender.send(event);
    }

    /// Publishes the new chain height after a header append.
    pub(crate) fn publish_header(&self, height: u64) {
        tracing::info!(height, "on_header");
        let _ = self.header_sender.send(height);
    }
}

impl Default for EventStreams {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn header_event_is_observed_by_subscriber() {
        let streams = EventStreams::new();
        let mut rx = streams.subscribe_headers();
        streams.publish_header(42);
        assert_eq!(rx.recv().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn transaction_event_is_observed_by_subscriber() {
        let streams = EventStreams::new();
        let mut rx = streams.subscribe_transactions();
        let event = TransactionEvent {
            address: "addr1".into(),
            tx: crate::tx::Tx::from_raw(vec![1, 2, 3]),
            height: 5,
            is_verified: true,
        };
        streams.publish_transaction(event.clone());
        let got = rx.recv().await.unwrap();
        assert_eq!(got.address, event.address);
        assert_eq!(got.height, 5);
        assert!(got.is_verified);
    }
}
