//! Bounded delivery queue between the sampler and the worker pool.
//!
//! A thin wrapper over a bounded `mpsc` channel: the sampler is the
//! sole writer and blocks when the queue is full (backpressure, never
//! drop); the workers share one receiver and drain it non-blockingly.

use std::sync::Arc;

use tokio::sync::mpsc;

use pulse_model::Metric;

/// Create a queue of the given capacity.
pub fn bounded(capacity: usize) -> (mpsc::Sender<Metric>, SharedReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, SharedReceiver(Arc::new(tokio::sync::Mutex::new(rx))))
}

/// Receiver end shared by all delivery workers.
///
/// The mutex is held only for the `try_recv` itself, never across a
/// delivery, so workers drain concurrently.
#[derive(Clone)]
pub struct SharedReceiver(Arc<tokio::sync::Mutex<mpsc::Receiver<Metric>>>);

impl SharedReceiver {
    /// Pop the next queued metric without blocking; `None` when the
    /// queue is currently empty or the sampler is gone.
    pub async fn try_next(&self) -> Option<Metric> {
        self.0.lock().await.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn queue_preserves_fifo_order() {
        let (tx, rx) = bounded(8);
        tx.send(Metric::counter("a", 1)).await.unwrap();
        tx.send(Metric::counter("b", 2)).await.unwrap();

        assert_eq!(rx.try_next().await.unwrap().id, "a");
        assert_eq!(rx.try_next().await.unwrap().id, "b");
        assert!(rx.try_next().await.is_none());
    }

    #[tokio::test]
    async fn full_queue_blocks_the_producer() {
        let (tx, rx) = bounded(1);
        tx.send(Metric::gauge("first", 1.0)).await.unwrap();

        // Queue is full with a stalled consumer: the second send must
        // block rather than drop.
        let second = tx.send(Metric::gauge("second", 2.0));
        tokio::pin!(second);
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), second.as_mut()).await;
        assert!(blocked.is_err(), "send completed despite a full queue");

        // Draining one slot unblocks it.
        assert_eq!(rx.try_next().await.unwrap().id, "first");
        tokio::time::timeout(Duration::from_millis(200), second)
            .await
            .expect("send still blocked after space freed")
            .unwrap();

        assert_eq!(rx.try_next().await.unwrap().id, "second");
    }
}
