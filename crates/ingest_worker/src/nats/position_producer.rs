use async_trait::async_trait;
use fleetwatch_common::domain::{DomainResult, PositionProducer, PositionSample};
use fleetwatch_common::nats::JetStreamPublisher;
use std::sync::Arc;
use tracing::debug;

/// Publishes position samples to `{stream}.{vehicleId}`, awaiting the
/// JetStream acknowledgment. The subject carries the partition key.
pub struct NatsPositionProducer {
    publisher: Arc<dyn JetStreamPublisher>,
    stream: String,
}

impl NatsPositionProducer {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>, stream: String) -> Self {
        Self { publisher, stream }
    }
}

#[async_trait]
impl PositionProducer for NatsPositionProducer {
    async fn publish(&self, sample: &PositionSample) -> DomainResult<()> {
        let subject = format!("{}.{}", self.stream, sample.vehicle_id);
        let payload = sample.to_json()?;

        debug!(
            subject = %subject,
            payload_size = payload.len(),
            "Publishing position sample"
        );

        self.publisher.publish(subject, payload.into()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleetwatch_common::nats::MockJetStreamPublisher;

    #[tokio::test]
    async fn test_sample_published_on_vehicle_keyed_subject() {
        let mut publisher = MockJetStreamPublisher::new();
        publisher
            .expect_publish()
            .withf(|subject: &String, payload: &bytes::Bytes| {
                let sample = PositionSample::from_json(payload).unwrap();
                subject == "vehicle-positions.TRK-07" && sample.vehicle_id == "TRK-07"
            })
            .times(1)
            .return_once(|_, _| Ok(()));

        let producer =
            NatsPositionProducer::new(Arc::new(publisher), "vehicle-positions".to_string());
        let sample = PositionSample {
            vehicle_id: "TRK-07".to_string(),
            lat: 24.89,
            lng: 67.02,
            speed_kph: Some(42.0),
            heading: None,
            timestamp: Utc::now(),
        };

        producer.publish(&sample).await.unwrap();
    }
}
