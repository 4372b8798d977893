use crate::domain::result::{DomainError, DomainResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single GPS reading for one vehicle.
///
/// Samples are immutable once emitted. Ordering is only meaningful within a
/// single vehicle id; the position stream is partitioned by vehicle id so a
/// consumer sees each vehicle's samples in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSample {
    pub vehicle_id: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_kph: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// Defaults to the time of ingest when the device did not report one.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    /// Decode a sample from its wire JSON form and validate required fields.
    ///
    /// Any failure here is malformed input: it must go to the dead-letter
    /// destination without retry, since re-parsing the same bytes cannot
    /// succeed.
    pub fn from_json(payload: &[u8]) -> DomainResult<Self> {
        let sample: Self = serde_json::from_slice(payload)
            .map_err(|e| DomainError::InvalidSample(e.to_string()))?;
        sample.validate()?;
        Ok(sample)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.vehicle_id.trim().is_empty() {
            return Err(DomainError::InvalidSample(
                "vehicleId must not be empty".to_string(),
            ));
        }
        // The vehicle id becomes a subject token on the partitioned stream.
        if self
            .vehicle_id
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '.' | '*' | '>'))
        {
            return Err(DomainError::InvalidSample(format!(
                "vehicleId contains invalid characters: {:?}",
                self.vehicle_id
            )));
        }
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(DomainError::InvalidSample(format!(
                "lat out of range: {}",
                self.lat
            )));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(DomainError::InvalidSample(format!(
                "lng out of range: {}",
                self.lng
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> DomainResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| DomainError::PublishError(e.to_string()))
    }
}

/// Trait for publishing position samples to the partitioned position stream.
///
/// Implementations must key the message by vehicle id (one subject per
/// vehicle) so that per-vehicle ordering is preserved end-to-end.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PositionProducer: Send + Sync {
    async fn publish(&self, sample: &PositionSample) -> DomainResult<()>;
}
