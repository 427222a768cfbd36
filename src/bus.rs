//! Outbound topics: wheel commands, odometry and transforms fan out to any
//! number of subscribers.
//!
//! Each message is wrapped in an `Arc` once and shared. A subscriber that
//! falls more than `capacity` messages behind sees `RecvError::Lagged` and
//! resumes from the oldest message still buffered; the publisher never waits.

use std::sync::Arc;
use tokio::sync::broadcast;

/// Broadcast topic with bounded capacity.
/// `T` must be `Send + Sync` because subscribers live on other tasks.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    tx: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes to every current subscriber. Returns how many received it;
    /// zero subscribers is not an error.
    pub fn publish(&self, msg: T) -> usize {
        self.tx.send(Arc::new(msg)).unwrap_or(0)
    }

    /// Receives only what is published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let topic: Topic<u32> = Topic::new(4);
        assert_eq!(topic.publish(7), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_messages() {
        let topic: Topic<u32> = Topic::new(4);
        let mut a = topic.subscribe();
        let mut b = topic.clone().subscribe();
        assert_eq!(topic.publish(42), 2);
        assert_eq!(*a.recv().await.unwrap(), 42);
        assert_eq!(*b.recv().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_without_blocking_publisher() {
        let topic: Topic<u32> = Topic::new(2);
        let mut rx = topic.subscribe();
        for i in 0..5 {
            assert_eq!(topic.publish(i), 1);
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(*rx.recv().await.unwrap(), 3);
    }
}
