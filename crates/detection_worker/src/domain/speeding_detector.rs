use fleetwatch_common::domain::{AlertEvent, AlertType, PositionSample};
use serde_json::json;

/// Stateless speed-limit check.
///
/// A pure function of the sample and the configured threshold: no state, no
/// side effects, idempotent under replay.
pub struct SpeedingDetector {
    threshold_kph: f64,
}

impl SpeedingDetector {
    pub fn new(threshold_kph: f64) -> Self {
        Self { threshold_kph }
    }

    /// An alert iff the sample's speed strictly exceeds the threshold. A
    /// missing speed reading never alerts.
    pub fn detect(&self, sample: &PositionSample) -> Option<AlertEvent> {
        let speed = sample.speed_kph?;
        if speed <= self.threshold_kph {
            return None;
        }

        let mut details = serde_json::Map::new();
        details.insert("speedKph".to_string(), json!(speed));
        details.insert("threshold".to_string(), json!(self.threshold_kph));
        details.insert("excess".to_string(), json!(speed - self.threshold_kph));

        Some(AlertEvent {
            vehicle_id: sample.vehicle_id.clone(),
            alert_type: AlertType::Speeding,
            details,
            timestamp: sample.timestamp,
            lat: sample.lat,
            lng: sample.lng,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(speed_kph: Option<f64>) -> PositionSample {
        PositionSample {
            vehicle_id: "TRK-01".to_string(),
            lat: 24.89,
            lng: 67.02,
            speed_kph,
            heading: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_alert_carries_speed_threshold_and_excess() {
        let detector = SpeedingDetector::new(80.0);
        let alert = detector.detect(&sample(Some(95.5))).unwrap();

        assert_eq!(alert.alert_type, AlertType::Speeding);
        assert_eq!(alert.vehicle_id, "TRK-01");
        assert_eq!(alert.details["speedKph"], 95.5);
        assert_eq!(alert.details["threshold"], 80.0);
        assert_eq!(alert.details["excess"], 15.5);
    }

    #[test]
    fn test_no_alert_at_or_below_threshold() {
        let detector = SpeedingDetector::new(80.0);
        assert!(detector.detect(&sample(Some(79.9))).is_none());
        // Exactly at the threshold is not speeding.
        assert!(detector.detect(&sample(Some(80.0))).is_none());
    }

    #[test]
    fn test_missing_speed_never_alerts() {
        let detector = SpeedingDetector::new(80.0);
        assert!(detector.detect(&sample(None)).is_none());
    }

    #[test]
    fn test_detection_is_idempotent() {
        let detector = SpeedingDetector::new(80.0);
        let s = sample(Some(100.0));
        assert_eq!(detector.detect(&s), detector.detect(&s));
    }
}
