use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::RwLock;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

/// One message on a live feed.
///
/// A new subscriber first receives a `Connected` marker, then replayed and
/// live `Event` items, with `KeepAlive` markers while the feed is idle so a
/// long-lived streaming transport can detect dead connections.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage<T> {
    Connected,
    Event(T),
    KeepAlive,
}

/// Broadcast hub with a bounded replay buffer.
///
/// Delivery is publish-and-forget: publishing never fails, tolerates zero
/// subscribers, and a slow subscriber that falls behind the channel capacity
/// loses the oldest items rather than blocking the publisher.
pub struct FanoutHub<T> {
    sender: broadcast::Sender<T>,
    replay: RwLock<VecDeque<T>>,
    replay_capacity: usize,
    keepalive: Duration,
}

impl<T: Clone + Send + 'static> FanoutHub<T> {
    pub fn new(replay_capacity: usize, keepalive: Duration) -> Self {
        let (sender, _) = broadcast::channel(replay_capacity.max(16));
        Self {
            sender,
            replay: RwLock::new(VecDeque::with_capacity(replay_capacity)),
            replay_capacity,
            keepalive,
        }
    }

    /// Publish an item to all current subscribers, best-effort.
    pub async fn publish(&self, item: T) {
        {
            let mut replay = self.replay.write().await;
            if replay.len() == self.replay_capacity {
                replay.pop_front();
            }
            replay.push_back(item.clone());
        }
        // Err here only means there are no subscribers right now.
        let _ = self.sender.send(item);
    }

    /// Subscribe to the feed, receiving the replay backlog first.
    pub async fn subscribe(&self) -> FeedSubscriber<T> {
        // Hold the replay lock across the broadcast subscription so no item
        // can slip between the snapshot and the live stream.
        let replay = self.replay.read().await;
        let receiver = self.sender.subscribe();
        let backlog: VecDeque<T> = replay.iter().cloned().collect();
        drop(replay);

        debug!(backlog = backlog.len(), "new feed subscriber");

        let mut keepalive = interval_at(Instant::now() + self.keepalive, self.keepalive);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        FeedSubscriber {
            connected_sent: false,
            backlog,
            receiver,
            keepalive,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct FeedSubscriber<T> {
    connected_sent: bool,
    backlog: VecDeque<T>,
    receiver: broadcast::Receiver<T>,
    keepalive: Interval,
}

impl<T: Clone> FeedSubscriber<T> {
    /// Next message on the feed; `None` once the hub is gone and the backlog
    /// is drained.
    pub async fn recv(&mut self) -> Option<FeedMessage<T>> {
        if !self.connected_sent {
            self.connected_sent = true;
            return Some(FeedMessage::Connected);
        }

        if let Some(item) = self.backlog.pop_front() {
            return Some(FeedMessage::Event(item));
        }

        loop {
            tokio::select! {
                result = self.receiver.recv() => match result {
                    Ok(item) => {
                        self.keepalive.reset();
                        return Some(FeedMessage::Event(item));
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "feed subscriber lagged, items dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
                _ = self.keepalive.tick() => return Some(FeedMessage::KeepAlive),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_gets_connected_marker_then_replay() {
        let hub: FanoutHub<u32> = FanoutHub::new(10, Duration::from_secs(30));
        hub.publish(1).await;
        hub.publish(2).await;

        let mut sub = hub.subscribe().await;
        assert_eq!(sub.recv().await, Some(FeedMessage::Connected));
        assert_eq!(sub.recv().await, Some(FeedMessage::Event(1)));
        assert_eq!(sub.recv().await, Some(FeedMessage::Event(2)));
    }

    #[tokio::test]
    async fn test_live_items_after_replay() {
        let hub: FanoutHub<u32> = FanoutHub::new(10, Duration::from_secs(30));
        let mut sub = hub.subscribe().await;
        assert_eq!(sub.recv().await, Some(FeedMessage::Connected));

        hub.publish(7).await;
        assert_eq!(sub.recv().await, Some(FeedMessage::Event(7)));
    }

    #[tokio::test]
    async fn test_replay_buffer_is_bounded() {
        let hub: FanoutHub<u32> = FanoutHub::new(3, Duration::from_secs(30));
        for i in 0..5 {
            hub.publish(i).await;
        }

        let mut sub = hub.subscribe().await;
        assert_eq!(sub.recv().await, Some(FeedMessage::Connected));
        assert_eq!(sub.recv().await, Some(FeedMessage::Event(2)));
        assert_eq!(sub.recv().await, Some(FeedMessage::Event(3)));
        assert_eq!(sub.recv().await, Some(FeedMessage::Event(4)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_on_idle_connection() {
        let hub: FanoutHub<u32> = FanoutHub::new(10, Duration::from_secs(30));
        let mut sub = hub.subscribe().await;
        assert_eq!(sub.recv().await, Some(FeedMessage::Connected));

        // Nothing published: the next message is a keep-alive after the
        // configured interval elapses.
        let next = tokio::time::timeout(Duration::from_secs(31), sub.recv())
            .await
            .expect("keep-alive should arrive within the interval");
        assert_eq!(next, Some(FeedMessage::KeepAlive));
    }

    #[tokio::test]
    async fn test_publish_with_zero_subscribers_is_fine() {
        let hub: FanoutHub<u32> = FanoutHub::new(10, Duration::from_secs(30));
        hub.publish(42).await;
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_hub_dropped() {
        let hub: FanoutHub<u32> = FanoutHub::new(10, Duration::from_secs(30));
        let mut sub = hub.subscribe().await;
        assert_eq!(sub.recv().await, Some(FeedMessage::Connected));

        drop(hub);
        assert_eq!(sub.recv().await, None);
    }
}
