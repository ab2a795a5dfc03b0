//! Per-topic subscriber registry and fan-out.
//!
//! Each topic owns one [TopicSlot] behind its own mutex. The lock is only
//! held to read or edit membership and the cached message, never across a
//! send, so a slow subscriber cannot stall subscribe/unsubscribe calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::json;
use tracing::{debug, info, warn};
use traffic_core::Topic;

use crate::connection::{Connection, ConnectionId, Payload};
use crate::error::SendError;

#[derive(Default)]
struct TopicSlot {
    /// Subscribe order.
    subscribers: Vec<Arc<dyn Connection>>,
    /// Most recent broadcast, replayed to late subscribers.
    last: Option<Payload>,
}

/// What one fan-out pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub pruned: Vec<ConnectionId>,
}

pub struct TopicBroadcaster {
    slots: [Mutex<TopicSlot>; Topic::COUNT],
    accepted: AtomicU64,
}

impl Default for TopicBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TopicBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<(Topic, usize)> = Topic::ALL
            .into_iter()
            .map(|topic| (topic, self.subscriber_count(topic)))
            .collect();
        f.debug_struct("TopicBroadcaster")
            .field("subscribers", &counts)
            .field("accepted", &self.total_accepted())
            .finish()
    }
}

impl TopicBroadcaster {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Mutex::new(TopicSlot::default())),
            accepted: AtomicU64::new(0),
        }
    }

    // Slot edits never panic half-way, so a poisoned slot is still consistent.
    fn slot(&self, topic: Topic) -> MutexGuard<'_, TopicSlot> {
        self.slots[topic.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept `connection` and add it to `topic`, then replay the cached
    /// message for that topic if there is one.
    ///
    /// Returns an error only if the handshake fails; a failed replay prunes
    /// the connection and is logged.
    pub async fn subscribe(
        &self,
        topic: Topic,
        connection: Arc<dyn Connection>,
    ) -> Result<(), SendError> {
        connection.accept().await?;
        let total = self.accepted.fetch_add(1, Ordering::Relaxed) + 1;
        let id = connection.id();

        let (replay, count) = {
            let mut slot = self.slot(topic);
            if !slot.subscribers.iter().any(|c| c.id() == id) {
                slot.subscribers.push(Arc::clone(&connection));
            }
            (slot.last.clone(), slot.subscribers.len())
        };
        info!(%topic, connection = %id, subscribers = count, accepted = total, "subscriber connected");

        if let Some(payload) = replay {
            if let Err(error) = connection.send(payload).await {
                warn!(%topic, connection = %id, %error, "replay failed, dropping subscriber");
                self.unsubscribe(topic, id);
            }
        }
        Ok(())
    }

    /// [Self::subscribe] by topic name. Unknown names are logged and ignored.
    pub async fn subscribe_named(
        &self,
        topic: &str,
        connection: Arc<dyn Connection>,
    ) -> Result<(), SendError> {
        match topic.parse::<Topic>() {
            Ok(topic) => self.subscribe(topic, connection).await,
            Err(error) => {
                warn!(connection = %connection.id(), %error, "ignoring subscription");
                Ok(())
            }
        }
    }

    /// Remove `id` from `topic`. Returns whether it was subscribed.
    pub fn unsubscribe(&self, topic: Topic, id: ConnectionId) -> bool {
        let (removed, remaining) = {
            let mut slot = self.slot(topic);
            let before = slot.subscribers.len();
            slot.subscribers.retain(|c| c.id() != id);
            (slot.subscribers.len() != before, slot.subscribers.len())
        };
        if removed {
            info!(%topic, connection = %id, subscribers = remaining, "subscriber disconnected");
        }
        removed
    }

    /// Remove `id` from every topic. Returns how many topics it left.
    pub fn unsubscribe_all(&self, id: ConnectionId) -> usize {
        Topic::ALL
            .into_iter()
            .filter(|&topic| self.unsubscribe(topic, id))
            .count()
    }

    /// Send `payload` to every connection subscribed to `topic` right now and
    /// cache it for late subscribers. Connections whose send fails are
    /// removed once the pass is over.
    pub async fn broadcast(&self, topic: Topic, payload: Payload) -> BroadcastReport {
        let targets = {
            let mut slot = self.slot(topic);
            slot.last = Some(Arc::clone(&payload));
            slot.subscribers.clone()
        };

        let mut report = BroadcastReport::default();
        for connection in &targets {
            match connection.send(Arc::clone(&payload)).await {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    warn!(%topic, connection = %connection.id(), %error, "send failed");
                    report.pruned.push(connection.id());
                }
            }
        }

        self.prune(topic, &report.pruned);
        debug!(%topic, delivered = report.delivered, pruned = report.pruned.len(), "broadcast");
        report
    }

    /// Send a keep-alive to every subscriber on every topic, pruning the
    /// ones that fail. The cached messages are left alone.
    pub async fn heartbeat(&self) -> usize {
        let payload: Payload = Arc::new(json!({
            "type": "heartbeat",
            "timestamp": chrono::Utc::now().timestamp(),
        }));

        let mut pruned = 0;
        for topic in Topic::ALL {
            let targets = self.slot(topic).subscribers.clone();
            let mut failed = Vec::new();
            for connection in &targets {
                if connection.send(Arc::clone(&payload)).await.is_err() {
                    failed.push(connection.id());
                }
            }
            pruned += failed.len();
            self.prune(topic, &failed);
        }
        if pruned > 0 {
            info!(pruned, "heartbeat dropped dead subscribers");
        }
        pruned
    }

    fn prune(&self, topic: Topic, failed: &[ConnectionId]) {
        if failed.is_empty() {
            return;
        }
        let remaining = {
            let mut slot = self.slot(topic);
            slot.subscribers.retain(|c| !failed.contains(&c.id()));
            slot.subscribers.len()
        };
        warn!(%topic, pruned = failed.len(), subscribers = remaining, "pruned failed subscribers");
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.slot(topic).subscribers.len()
    }

    /// Subscriber ids for `topic`, in subscribe order.
    pub fn subscribers(&self, topic: Topic) -> Vec<ConnectionId> {
        self.slot(topic).subscribers.iter().map(|c| c.id()).collect()
    }

    /// Topics with at least one subscriber.
    pub fn active_topics(&self) -> Vec<Topic> {
        Topic::ALL
            .into_iter()
            .filter(|&topic| self.subscriber_count(topic) > 0)
            .collect()
    }

    pub fn last_message(&self, topic: Topic) -> Option<Payload> {
        self.slot(topic).last.clone()
    }

    /// Connections accepted since start-up.
    pub fn total_accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }
}
