use fleetwatch_common::domain::{DomainResult, PositionProducer, PositionSample};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Validates raw position payloads and publishes them onto the partitioned
/// position stream.
///
/// This is the boundary between the unkeyed inbound firehose and the
/// per-vehicle-ordered stream the detectors consume: everything downstream
/// relies on the producer keying by vehicle id.
pub struct IngestService {
    producer: Arc<dyn PositionProducer>,
}

impl IngestService {
    pub fn new(producer: Arc<dyn PositionProducer>) -> Self {
        Self { producer }
    }

    /// Decode, validate and forward one raw sample. The decoded sample is
    /// returned for observability.
    #[instrument(skip_all)]
    pub async fn ingest(&self, payload: &[u8]) -> DomainResult<PositionSample> {
        let sample = PositionSample::from_json(payload)?;
        debug!(
            vehicle_id = %sample.vehicle_id,
            lat = sample.lat,
            lng = sample.lng,
            speed_kph = sample.speed_kph,
            "Ingesting position sample"
        );

        self.producer.publish(&sample).await?;
        Ok(sample)
    }
}
