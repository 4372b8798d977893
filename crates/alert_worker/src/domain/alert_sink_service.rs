use fleetwatch_common::domain::{AlertEvent, AlertInsert, AlertRepository, DomainResult};
use fleetwatch_common::fanout::FanoutHub;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// The single writer of alerts: records each derived alert exactly once,
/// then fans it out to live subscribers.
///
/// Detectors only emit; this service, consuming the derived-alert stream, is
/// the sole persistence point. The repository insert is idempotent on the
/// alert's natural key, so a redelivered alert is recognized as a duplicate
/// and is neither re-recorded nor re-delivered downstream.
pub struct AlertSinkService {
    repository: Arc<dyn AlertRepository>,
    alert_feed: Arc<FanoutHub<AlertEvent>>,
}

impl AlertSinkService {
    pub fn new(repository: Arc<dyn AlertRepository>, alert_feed: Arc<FanoutHub<AlertEvent>>) -> Self {
        Self {
            repository,
            alert_feed,
        }
    }

    #[instrument(skip(self, alert), fields(vehicle_id = %alert.vehicle_id, alert_type = %alert.alert_type))]
    pub async fn process_alert(&self, alert: AlertEvent) -> DomainResult<()> {
        match self.repository.insert(&alert).await? {
            AlertInsert::Recorded => {
                info!(
                    vehicle_id = %alert.vehicle_id,
                    alert_type = %alert.alert_type,
                    "Alert recorded"
                );
                // Fan-out only happens for newly recorded alerts, and is
                // best-effort.
                self.alert_feed.publish(alert).await;
            }
            AlertInsert::Duplicate => {
                debug!(
                    vehicle_id = %alert.vehicle_id,
                    alert_type = %alert.alert_type,
                    "Duplicate alert skipped"
                );
            }
        }
        Ok(())
    }
}
