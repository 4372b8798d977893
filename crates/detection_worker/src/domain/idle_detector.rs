use chrono::Duration;
use fleetwatch_common::domain::{
    AlertEvent, AlertProducer, AlertType, DomainResult, IdleEpisode, IdleEpisodeStore,
    PositionSample,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-vehicle idle state machine with alert-once-per-episode semantics.
///
/// MOVING (no stored episode) → IDLE_PENDING (episode open, alert not sent)
/// → IDLE_ALERTED (episode open, alert sent). A speed above the threshold
/// closes the episode; one alert is emitted per episode at most, once the
/// episode has lasted the duration threshold. Episode timing uses sample
/// timestamps, so redelivered sequences reproduce identical alerts.
pub struct IdleDetector {
    store: Arc<dyn IdleEpisodeStore>,
    producer: Arc<dyn AlertProducer>,
    speed_threshold_kph: f64,
    duration_threshold: Duration,
}

impl IdleDetector {
    pub fn new(
        store: Arc<dyn IdleEpisodeStore>,
        producer: Arc<dyn AlertProducer>,
        speed_threshold_kph: f64,
        duration_threshold: Duration,
    ) -> Self {
        Self {
            store,
            producer,
            speed_threshold_kph,
            duration_threshold,
        }
    }

    /// Advance the vehicle's idle state with one sample, publishing an IDLE
    /// alert when an open episode crosses the duration threshold.
    ///
    /// Samples without a speed reading leave the state untouched: a missing
    /// reading says nothing about whether the vehicle moved.
    pub async fn process(&self, sample: &PositionSample) -> DomainResult<Option<AlertEvent>> {
        let Some(speed) = sample.speed_kph else {
            return Ok(None);
        };
        let vehicle_id = &sample.vehicle_id;

        if speed > self.speed_threshold_kph {
            if self.store.get(vehicle_id).await?.is_some() {
                self.store.delete(vehicle_id).await?;
                debug!(vehicle_id = %vehicle_id, speed_kph = speed, "Vehicle resumed movement, idle episode closed");
            }
            return Ok(None);
        }

        let mut episode = match self.store.get(vehicle_id).await? {
            Some(episode) => episode,
            None => {
                debug!(vehicle_id = %vehicle_id, at = %sample.timestamp, "Vehicle became idle");
                IdleEpisode {
                    started_at: sample.timestamp,
                    alert_sent: false,
                    last_speed: speed,
                    last_update: sample.timestamp,
                }
            }
        };
        episode.last_speed = speed;
        episode.last_update = sample.timestamp;

        let idle_for = sample.timestamp - episode.started_at;
        let mut emitted = None;
        if !episode.alert_sent && idle_for >= self.duration_threshold {
            let alert = build_idle_alert(sample, idle_for);
            info!(
                vehicle_id = %vehicle_id,
                idle_minutes = idle_for.num_minutes(),
                "Idle alert emitted"
            );
            // Publish precedes the state write: a failed publish is retried
            // with alert_sent still false, and the sink dedups redelivery.
            self.producer.publish(&alert).await?;
            episode.alert_sent = true;
            emitted = Some(alert);
        }

        self.store.put(vehicle_id, episode).await?;
        Ok(emitted)
    }
}

fn build_idle_alert(sample: &PositionSample, idle_for: Duration) -> AlertEvent {
    let idle_minutes = idle_for.num_minutes();
    let mut details = serde_json::Map::new();
    details.insert("idleMinutes".to_string(), json!(idle_minutes));
    details.insert(
        "location".to_string(),
        json!(format!("{:.6},{:.6}", sample.lat, sample.lng)),
    );
    details.insert(
        "reason".to_string(),
        json!(format!("Vehicle stationary for {idle_minutes} minutes")),
    );

    AlertEvent {
        vehicle_id: sample.vehicle_id.clone(),
        alert_type: AlertType::Idle,
        details,
        timestamp: sample.timestamp,
        lat: sample.lat,
        lng: sample.lng,
    }
}
