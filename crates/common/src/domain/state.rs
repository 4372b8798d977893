use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One continuous interval during which a vehicle's speed stays at or below
/// the idle threshold.
///
/// Invariant: at most one open episode per vehicle, and at most one alert is
/// emitted per episode (`alert_sent` latches once set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdleEpisode {
    pub started_at: DateTime<Utc>,
    pub alert_sent: bool,
    pub last_speed: f64,
    pub last_update: DateTime<Utc>,
}

/// Keyed state store for open idle episodes, one per vehicle id.
///
/// Modeled as an external Get/Put/Delete store rather than a process-global
/// map so state survives restarts and shards by key.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdleEpisodeStore: Send + Sync {
    async fn get(&self, vehicle_id: &str) -> DomainResult<Option<IdleEpisode>>;

    async fn put(&self, vehicle_id: &str, episode: IdleEpisode) -> DomainResult<()>;

    async fn delete(&self, vehicle_id: &str) -> DomainResult<()>;
}

/// Keyed state store for the zone a vehicle is currently considered inside.
/// Absent entry means the vehicle is outside all zones.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ZoneMembershipStore: Send + Sync {
    async fn get(&self, vehicle_id: &str) -> DomainResult<Option<String>>;

    async fn put(&self, vehicle_id: &str, zone_name: String) -> DomainResult<()>;

    async fn delete(&self, vehicle_id: &str) -> DomainResult<()>;
}
