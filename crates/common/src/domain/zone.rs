use crate::domain::result::DomainResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A named geofence region. Owned by the geospatial collaborator and
/// read-only from the engine's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    /// Polygon ring of `[lng, lat]` vertices. The last vertex may repeat the
    /// first; implementations close the ring either way.
    pub polygon: Vec<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Geospatial lookup consumed by the geofence detector.
///
/// Membership is "covers", inclusive of the polygon boundary. Calls may block
/// on I/O in real implementations; callers bound them with a timeout and
/// treat a timeout as a lookup failure.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ZoneLookup: Send + Sync {
    /// All zones whose polygon covers the point.
    async fn zones_containing(&self, lat: f64, lng: f64) -> DomainResult<Vec<Zone>>;

    /// All zones whose polygon covers the point or lies within
    /// `distance_meters` of it.
    async fn zones_within(
        &self,
        lat: f64,
        lng: f64,
        distance_meters: f64,
    ) -> DomainResult<Vec<Zone>>;
}
