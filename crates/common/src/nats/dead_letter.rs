use crate::nats::traits::JetStreamPublisher;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// A message that exhausted processing, preserved for manual inspection and
/// offline replay: the original payload plus failure metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    /// Stream the message was consumed from.
    pub stream: String,
    /// Full subject of the original message (carries the partition key).
    pub subject: String,
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
    /// Original payload, lossily decoded as UTF-8 (payloads are JSON text).
    pub payload: String,
}

/// Destination for messages that failed processing.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeadLetterPublisher: Send + Sync {
    async fn publish(&self, letter: &DeadLetter) -> Result<()>;
}

/// Publishes dead letters to the DLQ stream, keyed by source stream so
/// replay tooling can filter per origin.
pub struct NatsDeadLetterProducer {
    publisher: Arc<dyn JetStreamPublisher>,
    dlq_stream: String,
}

impl NatsDeadLetterProducer {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>, dlq_stream: String) -> Self {
        Self {
            publisher,
            dlq_stream,
        }
    }
}

#[async_trait]
impl DeadLetterPublisher for NatsDeadLetterProducer {
    async fn publish(&self, letter: &DeadLetter) -> Result<()> {
        let subject = format!("{}.{}", self.dlq_stream, letter.stream);
        let payload = serde_json::to_vec(letter).context("Failed to serialize dead letter")?;

        self.publisher
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish dead letter")?;

        info!(
            subject = %subject,
            source_subject = %letter.subject,
            attempts = letter.attempts,
            "Dead letter published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nats::MockJetStreamPublisher;

    #[tokio::test]
    async fn test_dead_letter_published_to_dlq_subject() {
        let mut publisher = MockJetStreamPublisher::new();
        publisher
            .expect_publish()
            .withf(|subject: &String, payload: &bytes::Bytes| {
                let letter: DeadLetter = serde_json::from_slice(payload).unwrap();
                subject == "fleetwatch-dlq.vehicle-positions"
                    && letter.error == "boom"
                    && letter.attempts == 4
            })
            .times(1)
            .return_once(|_, _| Ok(()));

        let producer =
            NatsDeadLetterProducer::new(Arc::new(publisher), "fleetwatch-dlq".to_string());

        let letter = DeadLetter {
            stream: "vehicle-positions".to_string(),
            subject: "vehicle-positions.TRK-01".to_string(),
            error: "boom".to_string(),
            attempts: 4,
            failed_at: Utc::now(),
            payload: "{}".to_string(),
        };

        producer.publish(&letter).await.unwrap();
    }
}
