use chrono::{DateTime, Utc};
use fleetwatch_common::domain::{ClassificationPolicy, DomainResult, VehicleStateRepository};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of one re-evaluation sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub checked: usize,
    pub updated: usize,
}

/// Periodic re-evaluation of every vehicle's display classification.
///
/// Event-driven updates keep a vehicle's label fresh while it reports; this
/// sweep catches the vehicles that went silent, using wall-clock time
/// against last-seen. Only records whose classification actually changed are
/// written back, bounding write amplification to the diff.
pub struct StatusClassifier {
    states: Arc<dyn VehicleStateRepository>,
    policy: ClassificationPolicy,
}

impl StatusClassifier {
    pub fn new(states: Arc<dyn VehicleStateRepository>, policy: ClassificationPolicy) -> Self {
        Self { states, policy }
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> DomainResult<SweepOutcome> {
        let states = self.states.list().await?;
        let checked = states.len();
        let mut updated = 0usize;

        for state in states {
            let classification = self.policy.classify(&state, now);
            if classification != state.classification {
                info!(
                    vehicle_id = %state.vehicle_id,
                    old = %state.classification,
                    new = %classification,
                    "Status change"
                );
                let mut changed = state;
                changed.classification = classification;
                self.states.upsert(changed).await?;
                updated += 1;
            }
        }

        if updated > 0 {
            info!(checked, updated, "Vehicle statuses categorized");
        } else {
            debug!(checked, "Vehicle statuses unchanged");
        }
        Ok(SweepOutcome { checked, updated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use fleetwatch_common::domain::{
        MockVehicleStateRepository, VehicleClassification, VehicleRuntimeState,
    };
    use fleetwatch_common::memory::InMemoryVehicleStateRepository;

    fn now() -> DateTime<Utc> {
        "2024-05-01T12:00:00Z".parse().unwrap()
    }

    fn state(
        vehicle_id: &str,
        minutes_ago: i64,
        speed: Option<f64>,
        classification: VehicleClassification,
    ) -> VehicleRuntimeState {
        VehicleRuntimeState {
            vehicle_id: vehicle_id.to_string(),
            lat: 24.89,
            lng: 67.02,
            speed_kph: speed,
            heading: None,
            last_seen: now() - Duration::minutes(minutes_ago),
            classification,
        }
    }

    #[tokio::test]
    async fn test_sweep_reclassifies_silent_vehicles() {
        let repo = Arc::new(InMemoryVehicleStateRepository::new());
        // Went silent 35 minutes ago while moving: must become OFFLINE.
        repo.upsert(state("gone", 35, Some(60.0), VehicleClassification::Online))
            .await
            .unwrap();
        // Seen 30 seconds ago at speed: stays ONLINE.
        repo.upsert(state("fresh", 0, Some(40.0), VehicleClassification::Online))
            .await
            .unwrap();
        // Seen 2 minutes ago, stationary: becomes IDLE.
        repo.upsert(state("parked", 2, Some(0.0), VehicleClassification::Online))
            .await
            .unwrap();

        let classifier = StatusClassifier::new(repo.clone(), ClassificationPolicy::default());
        let outcome = classifier.sweep(now()).await.unwrap();

        assert_eq!(outcome, SweepOutcome {
            checked: 3,
            updated: 2,
        });
        assert_eq!(
            repo.get("gone").await.unwrap().unwrap().classification,
            VehicleClassification::Offline
        );
        assert_eq!(
            repo.get("fresh").await.unwrap().unwrap().classification,
            VehicleClassification::Online
        );
        assert_eq!(
            repo.get("parked").await.unwrap().unwrap().classification,
            VehicleClassification::Idle
        );
    }

    #[tokio::test]
    async fn test_sweep_writes_nothing_when_nothing_changed() {
        let mut repo = MockVehicleStateRepository::new();
        repo.expect_list().times(1).return_once(|| {
            Ok(vec![VehicleRuntimeState {
                vehicle_id: "steady".to_string(),
                lat: 24.89,
                lng: 67.02,
                speed_kph: Some(50.0),
                heading: None,
                last_seen: "2024-05-01T11:59:30Z".parse().unwrap(),
                classification: VehicleClassification::Online,
            }])
        });
        // Incremental diff: no upsert when the classification is unchanged.
        repo.expect_upsert().times(0);

        let classifier = StatusClassifier::new(Arc::new(repo), ClassificationPolicy::default());
        let outcome = classifier.sweep(now()).await.unwrap();
        assert_eq!(outcome.updated, 0);
    }

    #[tokio::test]
    async fn test_stale_speed_vehicle_goes_idle_before_offline() {
        let repo = Arc::new(InMemoryVehicleStateRepository::new());
        repo.upsert(state("drifting", 15, Some(70.0), VehicleClassification::Online))
            .await
            .unwrap();

        let classifier = StatusClassifier::new(repo.clone(), ClassificationPolicy::default());
        classifier.sweep(now()).await.unwrap();

        assert_eq!(
            repo.get("drifting").await.unwrap().unwrap().classification,
            VehicleClassification::Idle
        );
    }
}
