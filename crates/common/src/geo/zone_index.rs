use crate::domain::{DomainError, DomainResult, Zone, ZoneLookup};
use async_trait::async_trait;
use tracing::debug;

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// In-memory implementation of [`ZoneLookup`] over a fixed zone set.
///
/// Containment is "covers" (boundary inclusive). Distances and areas use an
/// equirectangular approximation, which is accurate to well under a percent
/// at geofence scale.
pub struct InMemoryZoneIndex {
    zones: Vec<Zone>,
}

impl InMemoryZoneIndex {
    pub fn new(zones: Vec<Zone>) -> Self {
        debug!(zone_count = zones.len(), "building in-memory zone index");
        Self { zones }
    }

    /// Load a zone set from its JSON wire form (an array of zones).
    pub fn from_json(payload: &[u8]) -> DomainResult<Self> {
        let zones: Vec<Zone> =
            serde_json::from_slice(payload).map_err(|e| DomainError::InvalidZone(e.to_string()))?;
        for zone in &zones {
            if ring(&zone.polygon).len() < 3 {
                return Err(DomainError::InvalidZone(format!(
                    "zone '{}' has fewer than 3 vertices",
                    zone.name
                )));
            }
        }
        Ok(Self::new(zones))
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }
}

#[async_trait]
impl ZoneLookup for InMemoryZoneIndex {
    async fn zones_containing(&self, lat: f64, lng: f64) -> DomainResult<Vec<Zone>> {
        Ok(self
            .zones
            .iter()
            .filter(|z| covers(&z.polygon, lat, lng))
            .cloned()
            .collect())
    }

    async fn zones_within(
        &self,
        lat: f64,
        lng: f64,
        distance_meters: f64,
    ) -> DomainResult<Vec<Zone>> {
        Ok(self
            .zones
            .iter()
            .filter(|z| {
                covers(&z.polygon, lat, lng)
                    || distance_to_boundary_m(&z.polygon, lat, lng) <= distance_meters
            })
            .cloned()
            .collect())
    }
}

/// The polygon ring without a duplicated closing vertex.
fn ring(polygon: &[[f64; 2]]) -> &[[f64; 2]] {
    if polygon.len() > 1 && polygon[polygon.len() - 1] == polygon[0] {
        &polygon[..polygon.len() - 1]
    } else {
        polygon
    }
}

/// Point-in-polygon via ray casting, inclusive of the boundary.
pub fn covers(polygon: &[[f64; 2]], lat: f64, lng: f64) -> bool {
    let ring = ring(polygon);
    if ring.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i][0], ring[i][1]);
        let (xj, yj) = (ring[j][0], ring[j][1]);

        if on_segment(xi, yi, xj, yj, lng, lat) {
            return true;
        }

        if ((yi > lat) != (yj > lat))
            && (lng < (xj - xi) * (lat - yi) / (yj - yi) + xi)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn on_segment(x1: f64, y1: f64, x2: f64, y2: f64, x: f64, y: f64) -> bool {
    const EPS: f64 = 1e-9;
    let cross = (x2 - x1) * (y - y1) - (y2 - y1) * (x - x1);
    if cross.abs() > EPS {
        return false;
    }
    let dot = (x - x1) * (x2 - x1) + (y - y1) * (y2 - y1);
    let len_sq = (x2 - x1).powi(2) + (y2 - y1).powi(2);
    dot >= -EPS && dot <= len_sq + EPS
}

/// Minimum distance in meters from a point to the polygon boundary.
pub fn distance_to_boundary_m(polygon: &[[f64; 2]], lat: f64, lng: f64) -> f64 {
    let ring = ring(polygon);
    if ring.is_empty() {
        return f64::INFINITY;
    }

    let scale_x = lat.to_radians().cos() * METERS_PER_DEGREE;
    let px = lng * scale_x;
    let py = lat * METERS_PER_DEGREE;

    let mut min_dist = f64::INFINITY;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (ax, ay) = (ring[j][0] * scale_x, ring[j][1] * METERS_PER_DEGREE);
        let (bx, by) = (ring[i][0] * scale_x, ring[i][1] * METERS_PER_DEGREE);
        min_dist = min_dist.min(point_segment_distance(px, py, ax, ay, bx, by));
        j = i;
    }
    min_dist
}

fn point_segment_distance(px: f64, py: f64, ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

/// Approximate polygon area in square meters via the shoelace formula, used
/// to rank overlapping zones (smallest area = most specific). `None` for
/// degenerate polygons, which rank last.
pub fn polygon_area_m2(polygon: &[[f64; 2]]) -> Option<f64> {
    let ring = ring(polygon);
    if ring.len() < 3 {
        return None;
    }

    let mean_lat = ring.iter().map(|v| v[1]).sum::<f64>() / ring.len() as f64;
    let scale_x = mean_lat.to_radians().cos() * METERS_PER_DEGREE;

    let mut sum = 0.0;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (ax, ay) = (ring[j][0] * scale_x, ring[j][1] * METERS_PER_DEGREE);
        let (bx, by) = (ring[i][0] * scale_x, ring[i][1] * METERS_PER_DEGREE);
        sum += ax * by - bx * ay;
        j = i;
    }

    let area = (sum / 2.0).abs();
    if area > 0.0 {
        Some(area)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Axis-aligned square zone given in [lng, lat] vertices.
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

    #[tokio::test]
    async fn test_zones_containing_inside_and_outside() {
        let index = InMemoryZoneIndex::new(vec![square("warehouse-a", 67.01, 24.89, 67.02, 24.90)]);

        let inside = index.zones_containing(24.895, 67.015).await.unwrap();
        assert_eq!(inside.len(), 1);
        assert_eq!(inside[0].name, "warehouse-a");

        let outside = index.zones_containing(24.95, 67.10).await.unwrap();
        assert!(outside.is_empty());
    }

    #[tokio::test]
    async fn test_boundary_is_inclusive() {
        let index = InMemoryZoneIndex::new(vec![square("z", 67.01, 24.89, 67.02, 24.90)]);
        // Exactly on the southern edge.
        let on_edge = index.zones_containing(24.89, 67.015).await.unwrap();
        assert_eq!(on_edge.len(), 1);
        // A corner vertex counts too.
        let on_corner = index.zones_containing(24.89, 67.01).await.unwrap();
        assert_eq!(on_corner.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_ring_is_accepted() {
        let mut zone = square("closed", 67.01, 24.89, 67.02, 24.90);
        zone.polygon.push(zone.polygon[0]);
        let index = InMemoryZoneIndex::new(vec![zone]);
        let found = index.zones_containing(24.895, 67.015).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_zones_within_buffer_distance() {
        let index = InMemoryZoneIndex::new(vec![square("z", 67.01, 24.89, 67.02, 24.90)]);

        // ~5.5 m east of the eastern edge (0.00005 deg of longitude near the
        // equator-scale cosine at 24.9 deg latitude ≈ 5 m).
        let near = index.zones_within(24.895, 67.02005, 10.0).await.unwrap();
        assert_eq!(near.len(), 1);

        // ~100 m east is beyond a 10 m buffer.
        let far = index.zones_within(24.895, 67.021, 10.0).await.unwrap();
        assert!(far.is_empty());

        // A point inside is trivially within any buffer.
        let inside = index.zones_within(24.895, 67.015, 0.0).await.unwrap();
        assert_eq!(inside.len(), 1);
    }

    #[test]
    fn test_area_ranks_smaller_zone_first() {
        let big = square("big", 67.00, 24.80, 67.10, 24.90);
        let small = square("small", 67.01, 24.81, 67.02, 24.82);

        let big_area = polygon_area_m2(&big.polygon).unwrap();
        let small_area = polygon_area_m2(&small.polygon).unwrap();
        assert!(small_area < big_area);
    }

    #[test]
    fn test_area_of_degenerate_polygon_is_none() {
        assert_eq!(polygon_area_m2(&[[67.0, 24.0], [67.1, 24.1]]), None);
        assert_eq!(
            polygon_area_m2(&[[67.0, 24.0], [67.0, 24.0], [67.0, 24.0]]),
            None
        );
    }

    #[test]
    fn test_from_json_validates_vertex_count() {
        let payload = br#"[{"name": "broken", "polygon": [[67.0, 24.0], [67.1, 24.1]]}]"#;
        assert!(matches!(
            InMemoryZoneIndex::from_json(payload),
            Err(DomainError::InvalidZone(_))
        ));

        let payload = br#"[{"name": "ok", "polygon": [[67.0, 24.0], [67.1, 24.0], [67.1, 24.1]]}]"#;
        let index = InMemoryZoneIndex::from_json(payload).unwrap();
        assert_eq!(index.zones().len(), 1);
    }
}
