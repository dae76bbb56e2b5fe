use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::EnrichedFrame;

pub type SubscriberId = Uuid;

struct Subscriber {
    tx: mpsc::Sender<Utf8Bytes>,
    connected_at: DateTime<Utc>,
}

/// Counters describing fan-out traffic, for diagnostics endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct HubMetrics {
    pub subscribers: usize,
    pub total_published: u64,
    pub total_evicted: u64,
}

/// Owns the set of live subscriber connections and fans frames out to them.
///
/// Each subscriber gets a bounded frame queue drained by its own socket
/// task, so `publish` never waits on subscriber I/O: a queue that fills up
/// means the subscriber has fallen a full queue behind, and it is evicted
/// rather than allowed to stall the hub. Per-subscriber queues preserve
/// publish order.
#[derive(Clone)]
pub struct BroadcastHub {
    subscribers: Arc<RwLock<HashMap<SubscriberId, Subscriber>>>,
    queue_capacity: usize,
    total_published: Arc<AtomicU64>,
    total_evicted: Arc<AtomicU64>,
}

impl BroadcastHub {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            queue_capacity,
            total_published: Arc::new(AtomicU64::new(0)),
            total_evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Add a subscriber; the returned receiver yields serialized frames in
    /// publish order until the subscriber is unregistered or the hub closes.
    pub fn register(&self) -> (SubscriberId, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = Uuid::new_v4();
        self.subscribers.write().insert(
            id,
            Subscriber {
                tx,
                connected_at: Utc::now(),
            },
        );
        debug!(subscriber = %id, "subscriber registered");
        (id, rx)
    }

    /// Remove a subscriber. Removing an absent id is a no-op.
    pub fn unregister(&self, id: SubscriberId) {
        if let Some(subscriber) = self.subscribers.write().remove(&id) {
            let connected = Utc::now() - subscriber.connected_at;
            debug!(
                subscriber = %id,
                connected_seconds = connected.num_seconds(),
                "subscriber removed"
            );
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Serialize the frame once and enqueue it for every live subscriber.
    ///
    /// Called only from the pipeline task, so frames reach every queue in a
    /// single total order. A failed or lagging subscriber is evicted without
    /// affecting delivery to the others.
    pub fn publish(&self, frame: &EnrichedFrame) {
        if self.subscribers.read().is_empty() {
            return;
        }

        let payload: Utf8Bytes = match serde_json::to_string(frame) {
            Ok(json) => json.into(),
            Err(e) => {
                warn!("failed to serialize frame: {e}");
                return;
            }
        };

        let mut evicted: Vec<SubscriberId> = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for (id, subscriber) in subscribers.iter() {
                match subscriber.tx.try_send(payload.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!(subscriber = %id, "subscriber queue full, evicting");
                        evicted.push(*id);
                    }
                    Err(TrySendError::Closed(_)) => evicted.push(*id),
                }
            }
        }
        for id in evicted {
            self.total_evicted.fetch_add(1, Ordering::Relaxed);
            self.unregister(id);
        }

        self.total_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop every subscriber, closing their frame queues.
    pub fn close_all(&self) {
        let mut subscribers = self.subscribers.write();
        let count = subscribers.len();
        subscribers.clear();
        if count > 0 {
            debug!(count, "closed all subscriber queues");
        }
    }

    pub fn metrics(&self) -> HubMetrics {
        HubMetrics {
            subscribers: self.subscribers.read().len(),
            total_published: self.total_published.load(Ordering::Relaxed),
            total_evicted: self.total_evicted.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawSample, CHANNEL_COUNT};

    fn frame(seq: i64) -> EnrichedFrame {
        EnrichedFrame {
            sample: RawSample::with_timestamp([seq as f64; CHANNEL_COUNT], seq),
            bands: None,
        }
    }

    fn timestamp_of(payload: &Utf8Bytes) -> i64 {
        let value: serde_json::Value = serde_json::from_str(payload.as_str()).unwrap();
        value["ts"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn subscribers_receive_frames_in_publish_order() {
        let hub = BroadcastHub::new(8);
        let (_id, mut rx) = hub.register();

        for seq in 1..=3 {
            hub.publish(&frame(seq));
        }

        for expected in 1..=3 {
            let payload = rx.recv().await.unwrap();
            assert_eq!(timestamp_of(&payload), expected);
        }
    }

    #[tokio::test]
    async fn slow_subscriber_is_evicted_without_affecting_others() {
        let hub = BroadcastHub::new(2);
        let (slow_id, slow_rx) = hub.register();
        let (_fast_id, mut fast_rx) = hub.register();

        // The slow subscriber never drains; its 2-slot queue overflows on
        // the third publish and it gets evicted.
        for seq in 1..=3 {
            hub.publish(&frame(seq));
        }

        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(hub.metrics().total_evicted, 1);

        for expected in 1..=3 {
            let payload = fast_rx.recv().await.unwrap();
            assert_eq!(timestamp_of(&payload), expected);
        }

        drop(slow_rx);
        hub.unregister(slow_id); // already gone; must be a no-op
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn disconnected_subscriber_is_removed_on_next_publish() {
        let hub = BroadcastHub::new(8);
        let (_a_id, a_rx) = hub.register();
        let (_b_id, mut b_rx) = hub.register();

        drop(a_rx); // connection torn down by the transport

        hub.publish(&frame(7));
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(timestamp_of(&b_rx.recv().await.unwrap()), 7);
    }

    #[tokio::test]
    async fn publish_to_empty_hub_is_a_no_op() {
        let hub = BroadcastHub::new(8);
        hub.publish(&frame(1));
        assert_eq!(hub.metrics().total_published, 0);
    }

    #[tokio::test]
    async fn close_all_ends_every_receiver() {
        let hub = BroadcastHub::new(8);
        let (_a, mut a_rx) = hub.register();
        let (_b, mut b_rx) = hub.register();

        hub.close_all();
        assert_eq!(hub.subscriber_count(), 0);
        assert!(a_rx.recv().await.is_none());
        assert!(b_rx.recv().await.is_none());
    }
}
