use chrono::Utc;
use fleetwatch_common::domain::{
    ClassificationPolicy, DomainResult, PositionSample, VehicleRuntimeState,
    VehicleStateRepository,
};
use fleetwatch_common::fanout::FanoutHub;
use std::sync::Arc;
use tracing::debug;

/// Maintains the latest-known-state record for each vehicle and feeds the
/// live position stream.
///
/// Runs as its own consumer group on the position stream, independent of the
/// detectors. The classification written here is refreshed on every sample;
/// the status classifier re-evaluates silent vehicles on its timer.
pub struct TrackingService {
    states: Arc<dyn VehicleStateRepository>,
    policy: ClassificationPolicy,
    live_feed: Arc<FanoutHub<VehicleRuntimeState>>,
}

impl TrackingService {
    pub fn new(
        states: Arc<dyn VehicleStateRepository>,
        policy: ClassificationPolicy,
        live_feed: Arc<FanoutHub<VehicleRuntimeState>>,
    ) -> Self {
        Self {
            states,
            policy,
            live_feed,
        }
    }

    pub async fn process_sample(&self, sample: &PositionSample) -> DomainResult<()> {
        let classification =
            self.policy
                .classify_parts(sample.timestamp, sample.speed_kph, Utc::now());

        let state = VehicleRuntimeState {
            vehicle_id: sample.vehicle_id.clone(),
            lat: sample.lat,
            lng: sample.lng,
            speed_kph: sample.speed_kph,
            heading: sample.heading,
            last_seen: sample.timestamp,
            classification,
        };

        self.states.upsert(state.clone()).await?;
        debug!(
            vehicle_id = %state.vehicle_id,
            classification = %state.classification,
            "Vehicle state updated"
        );

        // Live delivery is best-effort and must not fail the sample.
        self.live_feed.publish(state).await;
        Ok(())
    }
}
