use async_trait::async_trait;
use fleetwatch_common::domain::{AlertEvent, AlertProducer, DomainResult};
use fleetwatch_common::nats::JetStreamPublisher;
use std::sync::Arc;
use tracing::debug;

/// Publishes derived alerts to the alert stream on
/// `{stream}.{vehicleId}`, awaiting the JetStream acknowledgment.
pub struct NatsAlertProducer {
    publisher: Arc<dyn JetStreamPublisher>,
    stream: String,
}

impl NatsAlertProducer {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>, stream: String) -> Self {
        Self { publisher, stream }
    }
}

#[async_trait]
impl AlertProducer for NatsAlertProducer {
    async fn publish(&self, alert: &AlertEvent) -> DomainResult<()> {
        let subject = format!("{}.{}", self.stream, alert.vehicle_id);
        let payload = alert.to_json()?;

        debug!(
            subject = %subject,
            alert_type = %alert.alert_type,
            "Publishing alert"
        );

        self.publisher.publish(subject, payload.into()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleetwatch_common::domain::AlertType;
    use fleetwatch_common::nats::MockJetStreamPublisher;

    #[tokio::test]
    async fn test_alert_published_on_vehicle_keyed_subject() {
        let mut publisher = MockJetStreamPublisher::new();
        publisher
            .expect_publish()
            .withf(|subject: &String, payload: &bytes::Bytes| {
                let alert = AlertEvent::from_json(payload).unwrap();
                subject == "vehicle-alerts.TRK-01" && alert.alert_type == AlertType::Speeding
            })
            .times(1)
            .return_once(|_, _| Ok(()));

        let producer = NatsAlertProducer::new(Arc::new(publisher), "vehicle-alerts".to_string());
        let alert = AlertEvent {
            vehicle_id: "TRK-01".to_string(),
            alert_type: AlertType::Speeding,
            details: serde_json::Map::new(),
            timestamp: Utc::now(),
            lat: 24.89,
            lng: 67.02,
        };

        producer.publish(&alert).await.unwrap();
    }
}
