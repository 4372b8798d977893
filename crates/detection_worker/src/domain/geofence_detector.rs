use fleetwatch_common::domain::{
    AlertEvent, AlertProducer, AlertType, DomainError, DomainResult, PositionSample, Zone,
    ZoneLookup, ZoneMembershipStore,
};
use fleetwatch_common::geo::polygon_area_m2;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-vehicle "current zone" tracker with boundary hysteresis.
///
/// Resolves overlapping zones to the most specific one (smallest area) and
/// keeps the previous zone while the vehicle stays within the buffer
/// distance of it, so GPS jitter at a boundary cannot flap membership.
/// Lookup failures and timeouts never abort the stream: the sample simply
/// produces no alert and leaves membership untouched.
pub struct GeofenceDetector {
    lookup: Arc<dyn ZoneLookup>,
    membership: Arc<dyn ZoneMembershipStore>,
    producer: Arc<dyn AlertProducer>,
    buffer_meters: f64,
    lookup_timeout: Duration,
}

impl GeofenceDetector {
    pub fn new(
        lookup: Arc<dyn ZoneLookup>,
        membership: Arc<dyn ZoneMembershipStore>,
        producer: Arc<dyn AlertProducer>,
        buffer_meters: f64,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            lookup,
            membership,
            producer,
            buffer_meters,
            lookup_timeout,
        }
    }

    pub async fn process(&self, sample: &PositionSample) -> DomainResult<Option<AlertEvent>> {
        let vehicle_id = &sample.vehicle_id;

        let overlapping = match self.zones_containing(sample.lat, sample.lng).await {
            Ok(zones) => zones,
            Err(e) => {
                warn!(
                    vehicle_id = %vehicle_id,
                    error = %e,
                    "Zone lookup failed, skipping geofence evaluation for this sample"
                );
                return Ok(None);
            }
        };

        // Most specific zone wins on overlap; unknown area ranks last.
        let candidate = overlapping
            .iter()
            .min_by(|a, b| area_rank(a).total_cmp(&area_rank(b)))
            .map(|zone| zone.name.clone());

        let previous = self.membership.get(vehicle_id).await?;

        let mut current = candidate;
        if current.is_none() {
            if let Some(previous_zone) = &previous {
                if self
                    .still_within_buffer(sample.lat, sample.lng, previous_zone)
                    .await
                {
                    debug!(
                        vehicle_id = %vehicle_id,
                        zone = %previous_zone,
                        "Staying in zone within buffer distance"
                    );
                    current = Some(previous_zone.clone());
                }
            }
        }

        let emitted = match (&previous, &current) {
            (previous, Some(zone)) if previous.as_deref() != Some(zone.as_str()) => {
                info!(
                    vehicle_id = %vehicle_id,
                    zone = %zone,
                    lat = sample.lat,
                    lng = sample.lng,
                    "Geofence entry"
                );
                let alert =
                    build_geofence_alert(sample, AlertType::GeofenceEnter, zone, &overlapping);
                self.producer.publish(&alert).await?;
                Some(alert)
            }
            (Some(vacated), None) => {
                info!(
                    vehicle_id = %vehicle_id,
                    zone = %vacated,
                    lat = sample.lat,
                    lng = sample.lng,
                    "Geofence exit"
                );
                let alert =
                    build_geofence_alert(sample, AlertType::GeofenceExit, vacated, &overlapping);
                self.producer.publish(&alert).await?;
                Some(alert)
            }
            _ => None,
        };

        // Membership commits after the publish so a failed publish is
        // retried from the previous state.
        match &current {
            Some(zone) => self.membership.put(vehicle_id, zone.clone()).await?,
            None => self.membership.delete(vehicle_id).await?,
        }

        Ok(emitted)
    }

    async fn zones_containing(&self, lat: f64, lng: f64) -> DomainResult<Vec<Zone>> {
        match tokio::time::timeout(self.lookup_timeout, self.lookup.zones_containing(lat, lng))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(DomainError::ZoneLookupTimeout(
                self.lookup_timeout.as_millis() as u64,
            )),
        }
    }

    /// Whether the named zone is still within the hysteresis buffer of the
    /// point. Any failure counts as "not within": the vehicle then exits.
    async fn still_within_buffer(&self, lat: f64, lng: f64, zone_name: &str) -> bool {
        let lookup = tokio::time::timeout(
            self.lookup_timeout,
            self.lookup.zones_within(lat, lng, self.buffer_meters),
        )
        .await;

        match lookup {
            Ok(Ok(zones)) => zones.iter().any(|z| z.name == zone_name),
            Ok(Err(e)) => {
                warn!(zone = %zone_name, error = %e, "Buffer-zone lookup failed");
                false
            }
            Err(_) => {
                warn!(zone = %zone_name, "Buffer-zone lookup timed out");
                false
            }
        }
    }
}

fn area_rank(zone: &Zone) -> f64 {
    polygon_area_m2(&zone.polygon).unwrap_or(f64::INFINITY)
}

fn build_geofence_alert(
    sample: &PositionSample,
    alert_type: AlertType,
    zone_name: &str,
    overlapping: &[Zone],
) -> AlertEvent {
    let mut details = serde_json::Map::new();
    details.insert("geofence".to_string(), json!(zone_name));
    details.insert("zone".to_string(), json!(zone_name));
    details.insert("lat".to_string(), json!(sample.lat));
    details.insert("lng".to_string(), json!(sample.lng));
    details.insert(
        "action".to_string(),
        json!(if alert_type == AlertType::GeofenceEnter {
            "entered"
        } else {
            "exited"
        }),
    );

    // Informational only: the single current zone is decided above.
    if overlapping.len() > 1 {
        let names: Vec<&str> = overlapping.iter().map(|z| z.name.as_str()).collect();
        details.insert("zoneCount".to_string(), json!(names.len()));
        details.insert("overlappingZones".to_string(), json!(names));
    }

    AlertEvent {
        vehicle_id: sample.vehicle_id.clone(),
        alert_type,
        details,
        timestamp: sample.timestamp,
        lat: sample.lat,
        lng: sample.lng,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleetwatch_common::domain::{MockAlertProducer, MockZoneLookup};
    use fleetwatch_common::geo::InMemoryZoneIndex;
    use fleetwatch_common::memory::InMemoryZoneMembershipStore;

    fn square(name: &str, lng_min: f64, lat_min: f64, lng_max: f64, lat_max: f64) -> Zone {
        Zone {
            name: name.to_string(),
            polygon: vec![
                [lng_min, lat_min],
                [lng_max, lat_min],
                [lng_max, lat_max],
                [lng_min, lat_max],
            ],
            metadata: None,
        }
    }

    fn sample(lat: f64, lng: f64) -> PositionSample {
        PositionSample {
            vehicle_id: "TRK-01".to_string(),
            lat,
            lng,
            speed_kph: Some(30.0),
            heading: None,
            timestamp: Utc::now(),
        }
    }

    fn detector_with_zones(zones: Vec<Zone>, producer: MockAlertProducer) -> GeofenceDetector {
        GeofenceDetector::new(
            Arc::new(InMemoryZoneIndex::new(zones)),
            Arc::new(InMemoryZoneMembershipStore::new()),
            Arc::new(producer),
            10.0,
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_single_entry_alert_when_crossing_into_zone() {
        let mut producer = MockAlertProducer::new();
        producer
            .expect_publish()
            .withf(|alert: &AlertEvent| {
                alert.alert_type == AlertType::GeofenceEnter
                    && alert.details["zone"] == "warehouse-a"
                    && alert.details["action"] == "entered"
            })
            .times(1)
            .return_once(|_| Ok(()));
        let detector =
            detector_with_zones(vec![square("warehouse-a", 67.01, 24.89, 67.02, 24.90)], producer);

        // Outside, then inside twice: exactly one entry alert.
        assert!(detector.process(&sample(24.80, 67.00)).await.unwrap().is_none());
        assert!(detector.process(&sample(24.895, 67.015)).await.unwrap().is_some());
        assert!(detector.process(&sample(24.896, 67.016)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hysteresis_suppresses_boundary_flicker() {
        let mut producer = MockAlertProducer::new();
        producer.expect_publish().times(1).returning(|_| Ok(()));
        let detector =
            detector_with_zones(vec![square("warehouse-a", 67.01, 24.89, 67.02, 24.90)], producer);

        // Enter the zone (the one expected publish).
        detector.process(&sample(24.895, 67.015)).await.unwrap();

        // Drift ~5 m past the eastern edge: still within the 10 m buffer,
        // so no exit is emitted and membership is kept.
        let drifted = detector.process(&sample(24.895, 67.02005)).await.unwrap();
        assert!(drifted.is_none());

        // Back inside: same zone, no new entry alert.
        let returned = detector.process(&sample(24.895, 67.019)).await.unwrap();
        assert!(returned.is_none());
    }

    #[tokio::test]
    async fn test_exit_alert_beyond_buffer_distance() {
        let mut producer = MockAlertProducer::new();
        let mut seq = mockall::Sequence::new();
        producer
            .expect_publish()
            .withf(|a: &AlertEvent| a.alert_type == AlertType::GeofenceEnter)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        producer
            .expect_publish()
            .withf(|a: &AlertEvent| {
                a.alert_type == AlertType::GeofenceExit
                    && a.details["zone"] == "warehouse-a"
                    && a.details["action"] == "exited"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let detector =
            detector_with_zones(vec![square("warehouse-a", 67.01, 24.89, 67.02, 24.90)], producer);

        detector.process(&sample(24.895, 67.015)).await.unwrap();

        // ~100 m east of the edge: beyond the buffer, exactly one exit.
        let exited = detector.process(&sample(24.895, 67.021)).await.unwrap();
        assert_eq!(exited.unwrap().alert_type, AlertType::GeofenceExit);

        // Still outside: no further alert.
        assert!(detector.process(&sample(24.895, 67.022)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overlap_resolves_to_smallest_zone() {
        let mut producer = MockAlertProducer::new();
        producer
            .expect_publish()
            .withf(|alert: &AlertEvent| {
                alert.details["zone"] == "loading-dock"
                    && alert.details["zoneCount"] == 2
                    && alert.details["overlappingZones"]
                        .as_array()
                        .unwrap()
                        .len()
                        == 2
            })
            .times(1)
            .return_once(|_| Ok(()));

        // A small dock nested inside a large yard; the point is in both.
        let detector = detector_with_zones(
            vec![
                square("yard", 67.00, 24.80, 67.10, 24.90),
                square("loading-dock", 67.04, 24.84, 67.05, 24.85),
            ],
            producer,
        );

        let alert = detector.process(&sample(24.845, 67.045)).await.unwrap().unwrap();
        assert_eq!(alert.alert_type, AlertType::GeofenceEnter);
    }

    #[tokio::test]
    async fn test_lookup_failure_yields_no_alert_and_keeps_state() {
        let mut lookup = MockZoneLookup::new();
        lookup
            .expect_zones_containing()
            .times(1)
            .return_once(|_, _| Err(DomainError::ZoneLookupFailed("backend down".to_string())));
        let mut producer = MockAlertProducer::new();
        producer.expect_publish().times(0);

        let membership = Arc::new(InMemoryZoneMembershipStore::new());
        membership
            .put("TRK-01", "warehouse-a".to_string())
            .await
            .unwrap();

        let detector = GeofenceDetector::new(
            Arc::new(lookup),
            membership.clone(),
            Arc::new(producer),
            10.0,
            Duration::from_secs(2),
        );

        let result = detector.process(&sample(24.895, 67.015)).await.unwrap();
        assert!(result.is_none());
        assert_eq!(
            membership.get("TRK-01").await.unwrap(),
            Some("warehouse-a".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_timeout_is_a_lookup_failure() {
        struct SlowZoneLookup;

        #[async_trait::async_trait]
        impl ZoneLookup for SlowZoneLookup {
            async fn zones_containing(&self, _lat: f64, _lng: f64) -> DomainResult<Vec<Zone>> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Vec::new())
            }

            async fn zones_within(
                &self,
                _lat: f64,
                _lng: f64,
                _distance_meters: f64,
            ) -> DomainResult<Vec<Zone>> {
                Ok(Vec::new())
            }
        }

        let mut producer = MockAlertProducer::new();
        producer.expect_publish().times(0);

        let detector = GeofenceDetector::new(
            Arc::new(SlowZoneLookup),
            Arc::new(InMemoryZoneMembershipStore::new()),
            Arc::new(producer),
            10.0,
            Duration::from_secs(2),
        );

        let result = detector.process(&sample(24.895, 67.015)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_direct_zone_switch_emits_entry_for_new_zone() {
        let mut producer = MockAlertProducer::new();
        producer.expect_publish().times(2).returning(|_| Ok(()));

        let detector = detector_with_zones(
            vec![
                square("west", 67.00, 24.80, 67.01, 24.90),
                square("east", 67.02, 24.80, 67.03, 24.90),
            ],
            producer,
        );

        let entered = detector.process(&sample(24.85, 67.005)).await.unwrap().unwrap();
        assert_eq!(entered.details["zone"], "west");

        // Jump straight into the other zone: a single entry for it, no exit.
        let switched = detector.process(&sample(24.85, 67.025)).await.unwrap().unwrap();
        assert_eq!(switched.alert_type, AlertType::GeofenceEnter);
        assert_eq!(switched.details["zone"], "east");
    }
}
