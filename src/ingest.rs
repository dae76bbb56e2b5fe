use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;
use serde::Serialize;

use crate::types::RawSample;

/// Counters describing bridge traffic, for diagnostics endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeMetrics {
    pub total_submitted: u64,
    pub total_dropped: u64,
    pub depth: usize,
    pub capacity: usize,
}

struct Inner {
    queue: ArrayQueue<RawSample>,
    closed: AtomicBool,
    total_submitted: AtomicU64,
    total_dropped: AtomicU64,
}

/// Thread-safety boundary between the acquisition thread and the pipeline.
///
/// `submit` may be called from any thread and never blocks: the queue is
/// bounded and overflow evicts the oldest queued sample. Once closed,
/// submissions become silent no-ops; the driver thread may still be
/// delivering samples while the rest of the pipeline shuts down.
#[derive(Clone)]
pub struct IngestionBridge {
    inner: Arc<Inner>,
}

impl IngestionBridge {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: ArrayQueue::new(capacity),
                closed: AtomicBool::new(false),
                total_submitted: AtomicU64::new(0),
                total_dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Hand one sample to the pipeline. Wait-free; drop-oldest on overflow.
    pub fn submit(&self, sample: RawSample) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }

        let mut sample = sample;
        loop {
            match self.inner.queue.push(sample) {
                Ok(()) => break,
                Err(rejected) => {
                    if self.inner.queue.pop().is_some() {
                        self.inner.total_dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    sample = rejected;
                }
            }
        }
        self.inner.total_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove up to `max` samples, oldest first, in submission order.
    pub fn drain(&self, max: usize) -> Vec<RawSample> {
        let mut samples = Vec::with_capacity(max.min(self.inner.queue.len()));
        for _ in 0..max {
            match self.inner.queue.pop() {
                Some(sample) => samples.push(sample),
                None => break,
            }
        }
        samples
    }

    /// Stop accepting submissions. Queued samples stay until drained or
    /// discarded by the pipeline.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Discard everything currently queued, returning how many were thrown away.
    pub fn discard_queued(&self) -> usize {
        let mut discarded = 0;
        while self.inner.queue.pop().is_some() {
            discarded += 1;
        }
        discarded
    }

    pub fn len(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.queue.capacity()
    }

    pub fn metrics(&self) -> BridgeMetrics {
        BridgeMetrics {
            total_submitted: self.inner.total_submitted.load(Ordering::Relaxed),
            total_dropped: self.inner.total_dropped.load(Ordering::Relaxed),
            depth: self.inner.queue.len(),
            capacity: self.inner.queue.capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CHANNEL_COUNT;
    use std::time::{Duration, Instant};

    fn sample(seq: i64) -> RawSample {
        RawSample::with_timestamp([seq as f64; CHANNEL_COUNT], seq)
    }

    #[test]
    fn preserves_submission_order() {
        let bridge = IngestionBridge::with_capacity(16);
        for seq in 0..10 {
            bridge.submit(sample(seq));
        }

        let drained = bridge.drain(16);
        let timestamps: Vec<i64> = drained.iter().map(|s| s.ts_ns).collect();
        assert_eq!(timestamps, (0..10).collect::<Vec<i64>>());
    }

    #[test]
    fn overflow_drops_oldest_and_counts() {
        let bridge = IngestionBridge::with_capacity(4);
        for seq in 0..10 {
            bridge.submit(sample(seq));
        }

        let metrics = bridge.metrics();
        assert_eq!(metrics.total_submitted, 10);
        assert_eq!(metrics.total_dropped, 6);
        assert_eq!(metrics.depth, 4);

        // Survivors are the four newest, still in order.
        let timestamps: Vec<i64> = bridge.drain(4).iter().map(|s| s.ts_ns).collect();
        assert_eq!(timestamps, vec![6, 7, 8, 9]);
    }

    #[test]
    fn submit_after_close_is_a_no_op() {
        let bridge = IngestionBridge::with_capacity(4);
        bridge.submit(sample(1));
        bridge.close();
        bridge.submit(sample(2));

        assert_eq!(bridge.len(), 1);
        assert_eq!(bridge.metrics().total_submitted, 1);
    }

    #[test]
    fn submission_is_bounded_with_a_stalled_consumer() {
        // Nothing drains; a burst far beyond capacity must still complete
        // quickly and leave the queue at capacity.
        let bridge = IngestionBridge::with_capacity(64);
        let start = Instant::now();
        for seq in 0..100_000 {
            bridge.submit(sample(seq));
        }

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(bridge.len(), 64);
        assert_eq!(bridge.metrics().total_submitted, 100_000);
    }

    #[test]
    fn submissions_from_a_foreign_thread_arrive_in_order() {
        let bridge = IngestionBridge::with_capacity(256);
        let producer = bridge.clone();
        let handle = std::thread::spawn(move || {
            for seq in 0..100 {
                producer.submit(sample(seq));
            }
        });
        handle.join().unwrap();

        let timestamps: Vec<i64> = bridge.drain(256).iter().map(|s| s.ts_ns).collect();
        assert_eq!(timestamps, (0..100).collect::<Vec<i64>>());
    }

    #[test]
    fn discard_queued_empties_the_bridge() {
        let bridge = IngestionBridge::with_capacity(8);
        for seq in 0..5 {
            bridge.submit(sample(seq));
        }
        assert_eq!(bridge.discard_queued(), 5);
        assert!(bridge.is_empty());
    }
}
