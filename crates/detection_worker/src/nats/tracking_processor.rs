use crate::domain::TrackingService;
use async_trait::async_trait;
use fleetwatch_common::domain::PositionSample;
use fleetwatch_common::nats::{MessageHandler, ProcessError};
use std::sync::Arc;

/// Consumption-point handler feeding position samples to the vehicle
/// tracking service (its own consumer group on the position stream).
pub struct TrackingProcessor {
    service: Arc<TrackingService>,
}

impl TrackingProcessor {
    pub fn new(service: Arc<TrackingService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for TrackingProcessor {
    async fn handle(&self, _subject: &str, payload: &[u8]) -> Result<(), ProcessError> {
        let sample = PositionSample::from_json(payload)?;
        self.service.process_sample(&sample).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetwatch_common::domain::{ClassificationPolicy, VehicleStateRepository};
    use fleetwatch_common::fanout::FanoutHub;
    use fleetwatch_common::memory::InMemoryVehicleStateRepository;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sample_updates_vehicle_state() {
        let states = Arc::new(InMemoryVehicleStateRepository::new());
        let service = TrackingService::new(
            states.clone(),
            ClassificationPolicy::default(),
            Arc::new(FanoutHub::new(16, Duration::from_secs(30))),
        );
        let processor = TrackingProcessor::new(Arc::new(service));

        processor
            .handle(
                "vehicle-positions.TRK-09",
                br#"{"vehicleId": "TRK-09", "lat": 24.89, "lng": 67.02, "speedKph": 55.0}"#,
            )
            .await
            .unwrap();

        assert!(states.get("TRK-09").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_required_field_is_malformed() {
        let states = Arc::new(InMemoryVehicleStateRepository::new());
        let service = TrackingService::new(
            states,
            ClassificationPolicy::default(),
            Arc::new(FanoutHub::new(16, Duration::from_secs(30))),
        );
        let processor = TrackingProcessor::new(Arc::new(service));

        let result = processor
            .handle("vehicle-positions.TRK-09", br#"{"lat": 24.89, "lng": 67.02}"#)
            .await;
        assert!(matches!(result, Err(ProcessError::Malformed(_))));
    }
}
