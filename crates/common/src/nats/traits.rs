use anyhow::Result;
use async_nats::jetstream;
use async_trait::async_trait;

/// Trait for creating durable pull consumers on a JetStream stream.
/// Abstracted so consumption loops can be wired against a mock broker.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JetStreamConsumer: Send + Sync {
    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn PullConsumer>>;
}

/// Trait for fetching message batches from a pull consumer.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PullConsumer: Send + Sync {
    async fn fetch_messages(
        &self,
        max_messages: usize,
        expires: std::time::Duration,
    ) -> Result<Vec<jetstream::Message>>;
}

/// Trait for publishing messages to JetStream with acknowledgment.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JetStreamPublisher: Send + Sync {
    /// Publish a message to a subject and await the broker's acknowledgment,
    /// so nothing is left buffered when the call returns.
    async fn publish(&self, subject: String, payload: bytes::Bytes) -> Result<()>;
}
