//! Subscriber registry for consensus events.
//!
//! Every subscriber owns a bounded queue. Publishing never waits: when a
//! subscriber's queue is full the event is dropped for that subscriber only
//! and counted, so a slow consumer cannot stall the publisher or anyone else.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::ConsensusError;
use crate::event::{ConsensusEvent, EventFilter};

pub const DEFAULT_EVENT_BUFFER: usize = 1024;

struct Subscriber {
    filter: EventFilter,
    tx: mpsc::Sender<ConsensusEvent>,
}

struct Registry {
    subscribers: BTreeMap<u64, Subscriber>,
    closed: bool,
}

struct Shared {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    dropped: AtomicU64,
    buffer: usize,
}

impl Shared {
    fn remove(&self, id: u64) {
        self.registry.lock().subscribers.remove(&id);
    }
}

/// The registry owned by one consensus engine.
pub struct EventBus {
    shared: Arc<Shared>,
}

impl EventBus {
    pub fn new(buffer: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry {
                    subscribers: BTreeMap::new(),
                    closed: false,
                }),
                next_id: AtomicU64::new(1),
                dropped: AtomicU64::new(0),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Register a listener. Fails once the bus is closed.
    pub fn subscribe(&self, filter: EventFilter) -> Result<Subscription, ConsensusError> {
        let mut registry = self.shared.registry.lock();
        if registry.closed {
            return Err(ConsensusError::Stopped);
        }
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.shared.buffer);
        registry.subscribers.insert(
            id,
            Subscriber {
                filter: filter.clone(),
                tx,
            },
        );
        tracing::debug!(id, "consensus subscriber registered");
        Ok(Subscription {
            id,
            filter,
            rx,
            bus: Arc::downgrade(&self.shared),
        })
    }

    /// Deliver `event` to every live subscriber whose filter matches.
    /// Returns how many queues accepted it.
    pub fn publish(&self, event: ConsensusEvent) -> usize {
        let mut registry = self.shared.registry.lock();
        if registry.closed {
            return 0;
        }
        let mut delivered = 0;
        let mut gone = Vec::new();
        for (id, subscriber) in &registry.subscribers {
            if !subscriber.filter.matches(&event) {
                continue;
            }
            match subscriber.tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(id, kind = event.name(), "subscriber queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => gone.push(*id),
            }
        }
        for id in gone {
            registry.subscribers.remove(&id);
        }
        delivered
    }

    /// Drop every subscriber. Waiting receivers drain what is queued and then
    /// see the end of the feed. Idempotent.
    pub fn close(&self) {
        let mut registry = self.shared.registry.lock();
        registry.closed = true;
        registry.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.registry.lock().closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.registry.lock().subscribers.len()
    }

    /// Events discarded because a subscriber's queue was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

/// A listener's handle on the feed. Dropping it cancels the subscription.
pub struct Subscription {
    id: u64,
    filter: EventFilter,
    rx: mpsc::Receiver<ConsensusEvent>,
    bus: Weak<Shared>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Next event in publish order, or `None` once the subscription is
    /// cancelled or the engine has stopped and the queue is drained.
    pub async fn recv(&mut self) -> Option<ConsensusEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ConsensusEvent> {
        self.rx.try_recv().ok()
    }

    /// Remove this listener from the bus. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(shared) = self.bus.upgrade() {
            shared.remove(self.id);
        }
        self.bus = Weak::new();
        self.rx.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
