use crate::domain::vehicle::{VehicleClassification, VehicleRuntimeState};
use chrono::{DateTime, Duration, Utc};

/// Policy for deriving a vehicle's display classification from its runtime
/// state. First match wins: offline beats idle beats online.
#[derive(Debug, Clone)]
pub struct ClassificationPolicy {
    /// A vehicle silent for longer than this is OFFLINE.
    pub offline_after: Duration,
    /// A vehicle not offline but silent for longer than this is IDLE even
    /// when its last speed is stale or unknown.
    pub idle_after: Duration,
    /// At or below this speed the vehicle is considered stationary.
    pub idle_speed_kph: f64,
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self {
            offline_after: Duration::minutes(30),
            idle_after: Duration::minutes(10),
            idle_speed_kph: 1.0,
        }
    }
}

impl ClassificationPolicy {
    pub fn classify(&self, state: &VehicleRuntimeState, now: DateTime<Utc>) -> VehicleClassification {
        self.classify_parts(state.last_seen, state.speed_kph, now)
    }

    pub fn classify_parts(
        &self,
        last_seen: DateTime<Utc>,
        speed_kph: Option<f64>,
        now: DateTime<Utc>,
    ) -> VehicleClassification {
        let silent_for = now - last_seen;

        if silent_for > self.offline_after {
            return VehicleClassification::Offline;
        }
        if let Some(speed) = speed_kph {
            if speed <= self.idle_speed_kph {
                return VehicleClassification::Idle;
            }
        }
        if silent_for > self.idle_after {
            return VehicleClassification::Idle;
        }
        VehicleClassification::Online
    }
}
