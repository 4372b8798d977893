use crate::domain::DetectionService;
use async_trait::async_trait;
use fleetwatch_common::domain::PositionSample;
use fleetwatch_common::nats::{MessageHandler, ProcessError};
use std::sync::Arc;
use tracing::debug;

/// Consumption-point handler feeding position samples to the detectors.
///
/// Decode failures are malformed (dead-letter, no retry); detector errors
/// are retryable through the supervisor.
pub struct DetectionProcessor {
    service: Arc<DetectionService>,
}

impl DetectionProcessor {
    pub fn new(service: Arc<DetectionService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for DetectionProcessor {
    async fn handle(&self, subject: &str, payload: &[u8]) -> Result<(), ProcessError> {
        let sample = PositionSample::from_json(payload)?;
        debug!(subject = %subject, vehicle_id = %sample.vehicle_id, "Running detectors");
        self.service.process_sample(&sample).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GeofenceDetector, IdleDetector, SpeedingDetector};
    use fleetwatch_common::domain::{AlertProducer, MockAlertProducer};
    use fleetwatch_common::geo::InMemoryZoneIndex;
    use fleetwatch_common::memory::{InMemoryIdleEpisodeStore, InMemoryZoneMembershipStore};

    fn processor(producer: MockAlertProducer) -> DetectionProcessor {
        let producer: Arc<dyn AlertProducer> = Arc::new(producer);
        let service = DetectionService::new(
            SpeedingDetector::new(80.0),
            IdleDetector::new(
                Arc::new(InMemoryIdleEpisodeStore::new()),
                producer.clone(),
                1.0,
                chrono::Duration::minutes(10),
            ),
            GeofenceDetector::new(
                Arc::new(InMemoryZoneIndex::new(Vec::new())),
                Arc::new(InMemoryZoneMembershipStore::new()),
                producer.clone(),
                10.0,
                std::time::Duration::from_secs(2),
            ),
            producer,
        );
        DetectionProcessor::new(Arc::new(service))
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_malformed() {
        let mut producer = MockAlertProducer::new();
        producer.expect_publish().times(0);
        let processor = processor(producer);

        let result = processor
            .handle("vehicle-positions.TRK-01", b"definitely not json")
            .await;
        assert!(matches!(result, Err(ProcessError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_valid_sample_runs_detectors() {
        let mut producer = MockAlertProducer::new();
        producer.expect_publish().times(1).returning(|_| Ok(()));
        let processor = processor(producer);

        processor
            .handle(
                "vehicle-positions.TRK-01",
                br#"{"vehicleId": "TRK-01", "lat": 24.89, "lng": 67.02, "speedKph": 120.0}"#,
            )
            .await
            .unwrap();
    }
}
