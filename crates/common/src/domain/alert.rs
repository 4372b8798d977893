use crate::domain::result::{DomainError, DomainResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    Speeding,
    Idle,
    GeofenceEnter,
    GeofenceExit,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Speeding => "SPEEDING",
            Self::Idle => "IDLE",
            Self::GeofenceEnter => "GEOFENCE_ENTER",
            Self::GeofenceExit => "GEOFENCE_EXIT",
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A derived operational alert.
///
/// Immutable and append-only: created by a detector, recorded once by the
/// alert sink, then delivered to fan-out. The detected-at timestamp is the
/// triggering sample's timestamp so replays reproduce the same event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub vehicle_id: String,
    pub alert_type: AlertType,
    pub details: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lng: f64,
}

impl AlertEvent {
    pub fn from_json(payload: &[u8]) -> DomainResult<Self> {
        serde_json::from_slice(payload).map_err(|e| DomainError::InvalidAlert(e.to_string()))
    }

    pub fn to_json(&self) -> DomainResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| DomainError::PublishError(e.to_string()))
    }

    /// Natural dedup key. No richer identifier exists on the wire, so the
    /// sink treats (vehicle, type, detected-at, coordinates) as identity.
    pub fn dedup_key(&self) -> AlertKey {
        AlertKey {
            vehicle_id: self.vehicle_id.clone(),
            alert_type: self.alert_type,
            timestamp: self.timestamp,
            lat_bits: self.lat.to_bits(),
            lng_bits: self.lng.to_bits(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub vehicle_id: String,
    pub alert_type: AlertType,
    pub timestamp: DateTime<Utc>,
    lat_bits: u64,
    lng_bits: u64,
}

/// Whether an insert recorded a new alert or hit an already-recorded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertInsert {
    Recorded,
    Duplicate,
}

/// Append-only alert store. Inserts are idempotent on the natural key so a
/// redelivered alert is reported as a duplicate rather than written twice.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn insert(&self, alert: &AlertEvent) -> DomainResult<AlertInsert>;
}

/// Trait for publishing derived alerts to the alert stream, keyed by
/// vehicle id.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AlertProducer: Send + Sync {
    async fn publish(&self, alert: &AlertEvent) -> DomainResult<()>;
}
