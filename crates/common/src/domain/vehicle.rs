use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display classification of a vehicle, recomputed from its runtime state.
///
/// Distinct from the idle *alert* state machine: this is the label shown to
/// consumers, not an alertable episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleClassification {
    Online,
    Idle,
    Offline,
}

impl VehicleClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Idle => "IDLE",
            Self::Offline => "OFFLINE",
        }
    }
}

impl std::fmt::Display for VehicleClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest known state for one vehicle. One logical record per vehicle id,
/// overwritten on every sample and never deleted once the vehicle has
/// reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRuntimeState {
    pub vehicle_id: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_kph: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    pub last_seen: DateTime<Utc>,
    pub classification: VehicleClassification,
}

/// Upsert store for per-vehicle runtime state, keyed by vehicle id.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait VehicleStateRepository: Send + Sync {
    async fn get(&self, vehicle_id: &str) -> DomainResult<Option<VehicleRuntimeState>>;

    async fn upsert(&self, state: VehicleRuntimeState) -> DomainResult<()>;

    async fn list(&self) -> DomainResult<Vec<VehicleRuntimeState>>;
}
