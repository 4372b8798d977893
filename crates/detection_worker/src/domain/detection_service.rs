use crate::domain::{GeofenceDetector, IdleDetector, SpeedingDetector};
use fleetwatch_common::domain::{AlertProducer, DomainResult, PositionSample};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Runs every detector over each position sample, in a fixed order.
///
/// The detectors only emit: the alert sink, consuming the derived-alert
/// stream, is the single writer of alerts. Any error returned here is
/// retryable at the consumption boundary; redelivered samples regenerate
/// identical alerts, which the sink dedups.
pub struct DetectionService {
    speeding: SpeedingDetector,
    idle: IdleDetector,
    geofence: GeofenceDetector,
    producer: Arc<dyn AlertProducer>,
}

impl DetectionService {
    pub fn new(
        speeding: SpeedingDetector,
        idle: IdleDetector,
        geofence: GeofenceDetector,
        producer: Arc<dyn AlertProducer>,
    ) -> Self {
        Self {
            speeding,
            idle,
            geofence,
            producer,
        }
    }

    #[instrument(skip(self, sample), fields(vehicle_id = %sample.vehicle_id))]
    pub async fn process_sample(&self, sample: &PositionSample) -> DomainResult<()> {
        let mut emitted = 0usize;

        if let Some(alert) = self.speeding.detect(sample) {
            info!(
                vehicle_id = %sample.vehicle_id,
                speed_kph = sample.speed_kph,
                "Speeding alert emitted"
            );
            self.producer.publish(&alert).await?;
            emitted += 1;
        }

        if self.idle.process(sample).await?.is_some() {
            emitted += 1;
        }

        if self.geofence.process(sample).await?.is_some() {
            emitted += 1;
        }

        debug!(
            vehicle_id = %sample.vehicle_id,
            alerts = emitted,
            "Sample processed by detectors"
        );
        Ok(())
    }
}
