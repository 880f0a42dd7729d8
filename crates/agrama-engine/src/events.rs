use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// One record per primitive invocation, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    pub primitive: &'static str,
    pub agent_id: String,
    pub session_id: Option<String>,
    /// SHA-256 of the canonical-JSON-encoded parameter object, hex-encoded.
    pub parameter_fingerprint: String,
    pub start_us: i64,
    pub end_us: i64,
    pub status: EventStatus,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EventStatus {
    Success { summary: serde_json::Value },
    Cancelled,
    Failed { kind: ErrorKind, message: String },
}

/// What a subscriber registers to receive.
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    Primitive(&'static str),
    Agent(String),
}

impl EventFilter {
    fn matches(&self, event: &EventRecord) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Primitive(name) => event.primitive == *name,
            EventFilter::Agent(agent) => event.agent_id == *agent,
        }
    }
}

struct Subscription {
    filter: EventFilter,
    sender: Sender<EventRecord>,
}

/// In-process publish of event records to registered subscribers.
/// Publishing is always non-blocking: each subscriber has a small bounded
/// channel, and a full channel drops the event for that subscriber rather
/// than stalling the publisher — a slow subscriber must never back-pressure
/// a primitive invocation. A bounded channel per subscriber (rather than an
/// unbounded one) means a subscriber that stops draining can't grow memory
/// without limit.
pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_sequence: AtomicU64,
    backlog_capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(backlog_capacity: usize) -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            next_sequence: AtomicU64::new(1),
            backlog_capacity,
        }
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a new subscriber and returns its receiving end. Dropping
    /// the `Receiver` is how a subscriber unsubscribes — `publish` prunes
    /// dead channels lazily on the next send.
    pub fn subscribe(&self, filter: EventFilter) -> Receiver<EventRecord> {
        let (tx, rx) = crossbeam::channel::bounded(self.backlog_capacity);
        self.subscriptions.write().push(Subscription { filter, sender: tx });
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Publishes `event` to every subscriber whose filter matches. Never
    /// blocks: a full or disconnected channel is simply skipped.
    pub fn publish(&self, event: EventRecord) {
        let event = Arc::new(event);
        let mut dead = Vec::new();
        {
            let subs = self.subscriptions.read();
            for (i, sub) in subs.iter().enumerate() {
                if !sub.filter.matches(&event) {
                    continue;
                }
                match sub.sender.try_send((*event).clone()) {
                    Ok(()) | Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Disconnected(_)) => dead.push(i),
                }
            }
        }
        if !dead.is_empty() {
            let mut subs = self.subscriptions.write();
            for &i in dead.iter().rev() {
                if i < subs.len() {
                    subs.remove(i);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(seq: u64, primitive: &'static str, agent: &str) -> EventRecord {
        EventRecord {
            sequence: seq,
            primitive,
            agent_id: agent.to_string(),
            session_id: None,
            parameter_fingerprint: "deadbeef".to_string(),
            start_us: 0,
            end_us: 1,
            status: EventStatus::Success { summary: serde_json::json!({}) },
            warnings: Vec::new(),
        }
    }

    #[test]
    fn subscriber_receives_matching_events_only() {
        let bus = EventBus::default();
        let rx_store = bus.subscribe(EventFilter::Primitive("store"));
        let rx_all = bus.subscribe(EventFilter::All);

        bus.publish(sample_event(1, "store", "agent-a"));
        bus.publish(sample_event(2, "retrieve", "agent-a"));

        assert_eq!(rx_store.try_recv().unwrap().primitive, "store");
        assert!(rx_store.try_recv().is_err());

        assert_eq!(rx_all.try_recv().unwrap().primitive, "store");
        assert_eq!(rx_all.try_recv().unwrap().primitive, "retrieve");
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let bus = EventBus::new(1);
        let rx = bus.subscribe(EventFilter::All);
        bus.publish(sample_event(1, "store", "a"));
        bus.publish(sample_event(2, "store", "a")); // dropped, channel capacity 1
        assert_eq!(rx.try_recv().unwrap().sequence, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_subscriber_is_pruned_on_next_publish() {
        let bus = EventBus::default();
        {
            let _rx = bus.subscribe(EventFilter::All); // dropped at end of this block
        }
        assert_eq!(bus.subscriber_count(), 1);
        bus.publish(sample_event(1, "store", "a"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn agent_filter_matches_by_identity() {
        let bus = EventBus::default();
        let rx = bus.subscribe(EventFilter::Agent("agent-a".to_string()));
        bus.publish(sample_event(1, "store", "agent-b"));
        bus.publish(sample_event(2, "store", "agent-a"));
        let received = rx.try_recv().unwrap();
        assert_eq!(received.agent_id, "agent-a");
        assert!(rx.try_recv().is_err());
    }
}
