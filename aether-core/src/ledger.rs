//! An append-only, bounded, in-memory log of recorded events.
//!
//! `total_count` is the global index counter and includes evicted events.
//! `byte_stride` only sums the weights of events still retained in the buffer.

use crate::common::{lock, SubscriberId};
use crate::config::LedgerConfig;
use crate::error::Result;
use crate::events::{EventKind, LedgerEvent};
use crate::subscription::{Registry, Subscription};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{trace, warn};
use uuid::Uuid;

/// Weight given to an event when the caller has no cost to report.
pub const DEFAULT_WEIGHT: f64 = 1.0;

struct LedgerBuffer {
    events: VecDeque<Arc<LedgerEvent>>,
    next_index: u64,
}

/// The event ledger. Clones share the same buffer and counter.
#[derive(Clone)]
pub struct EventLedger {
    capacity: usize,
    buffer: Arc<Mutex<LedgerBuffer>>,
    subscribers: Arc<Registry<LedgerEvent>>,
    event_sender: broadcast::Sender<Arc<LedgerEvent>>,
}

impl EventLedger {
    pub fn new(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let (event_sender, _) = broadcast::channel(256);
        Ok(Self {
            capacity: config.capacity,
            buffer: Arc::new(Mutex::new(LedgerBuffer {
                events: VecDeque::with_capacity(config.capacity),
                next_index: 0,
            })),
            subscribers: Arc::new(Registry::new("EventLedger", None)),
            event_sender,
        })
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::new(LedgerConfig { capacity })
    }

    /// Records a new event, evicting the oldest retained one if the buffer
    /// is full, and notifies subscribers with the new event.
    ///
    /// Negative or non-finite weights are recorded as `0.0`.
    pub fn record(
        &self,
        kind: EventKind,
        label: impl Into<String>,
        weight: f64,
    ) -> Arc<LedgerEvent> {
        let weight = if weight.is_finite() && weight >= 0.0 {
            weight
        } else {
            warn!(
                "Ledger weight {} is not a non-negative number; recording 0.",
                weight
            );
            0.0
        };

        let event = {
            let mut buffer = lock(&self.buffer);
            buffer.next_index += 1;
            let event = Arc::new(LedgerEvent {
                id: Uuid::new_v4(),
                index: buffer.next_index,
                kind,
                label: label.into(),
                timestamp: Utc::now(),
                weight,
            });
            buffer.events.push_back(Arc::clone(&event));
            while buffer.events.len() > self.capacity {
                if let Some(evicted) = buffer.events.pop_front() {
                    trace!("Evicted ledger event #{}.", evicted.index);
                }
            }
            event
        };

        trace!(
            "Recorded ledger event #{} [{}] '{}' (weight {}).",
            event.index,
            event.kind,
            event.label,
            event.weight
        );
        self.subscribers.notify(&event);
        self.event_sender.send(Arc::clone(&event)).ok();
        event
    }

    /// Records a `Key` event with the default weight.
    pub fn record_key(&self, label: impl Into<String>) -> Arc<LedgerEvent> {
        self.record(EventKind::Key, label, DEFAULT_WEIGHT)
    }

    /// Returns the retained events, most recent first.
    pub fn history(&self) -> Vec<Arc<LedgerEvent>> {
        lock(&self.buffer).events.iter().rev().cloned().collect()
    }

    /// Total number of events ever recorded, evicted ones included.
    pub fn total_count(&self) -> u64 {
        lock(&self.buffer).next_index
    }

    pub fn retained_count(&self) -> usize {
        lock(&self.buffer).events.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sum of the weights of the currently retained events. `0.0` when empty.
    pub fn retained_weight(&self) -> f64 {
        lock(&self.buffer)
            .events
            .iter()
            .fold(0.0, |total, event| total + event.weight)
    }

    /// Retained weight divided by 1024, formatted to three decimals.
    pub fn byte_stride(&self) -> String {
        format!("{:.3}", self.retained_weight() / 1024.0)
    }

    /// Registers a callback invoked with every newly recorded event.
    pub fn subscribe(
        &self,
        callback: impl Fn(&LedgerEvent) + Send + Sync + 'static,
    ) -> Subscription<LedgerEvent> {
        self.subscribers.insert(Arc::new(callback))
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.subscribers.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Subscribes to the stream of newly recorded events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Arc<LedgerEvent>> {
        self.event_sender.subscribe()
    }
}
