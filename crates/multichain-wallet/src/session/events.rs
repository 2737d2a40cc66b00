/*
[INPUT]:  Wallet events in authority order
[OUTPUT]: Per-listener ordered event queues
[POS]:    Session layer - subscription/fan-out
[UPDATE]: When delivery guarantees change
*/

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

use crate::types::WalletEvent;

/// Fan-out of wallet events.
///
/// Every listener owns a bounded queue. Publishing never waits: a listener whose
/// queue is full misses that event, a listener whose receiver is gone is removed.
/// Each listener sees events in publish order, at most once.
#[derive(Debug)]
pub struct EventBus {
    listeners: Mutex<Vec<Listener>>,
    buffer: usize,
    next_id: AtomicU64,
}

#[derive(Debug)]
struct Listener {
    id: u64,
    tx: mpsc::Sender<WalletEvent>,
}

/// Receiving end of one subscription; dropping it unsubscribes
#[derive(Debug)]
pub struct EventSubscription {
    id: u64,
    rx: mpsc::Receiver<WalletEvent>,
}

impl EventSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event; `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<WalletEvent> {
        self.rx.recv().await
    }

    /// Next queued event without waiting
    pub fn try_recv(&mut self) -> Option<WalletEvent> {
        self.rx.try_recv().ok()
    }
}

impl EventBus {
    pub fn new(buffer: usize) -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            buffer: buffer.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self) -> EventSubscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push(Listener { id, tx });
        EventSubscription { id, rx }
    }

    /// Deliver to every listener; returns how many received it
    pub fn publish(&self, event: &WalletEvent) -> usize {
        let mut delivered = 0;
        self.lock().retain(|listener| match listener.tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    listener = listener.id,
                    event = event.name(),
                    "event listener queue full, event dropped"
                );
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Listener>> {
        // A panic while holding the lock can't leave the list half-updated
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
