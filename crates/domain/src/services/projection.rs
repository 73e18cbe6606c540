//! Local planar projection.
//!
//! An equirectangular projection centered on a reference point. Within the
//! few kilometers a working day covers, distances and areas are accurate to
//! well under a percent, and the inverse is exact.

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Planar point in meters: `[x east, y north]`.
pub type PlanarPoint = [f64; 2];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProjection {
    origin_lat: f64,
    origin_lon: f64,
    meters_per_deg_lat: f64,
    meters_per_deg_lon: f64,
}

impl LocalProjection {
    pub fn new(origin_lat: f64, origin_lon: f64) -> Self {
        let meters_per_deg = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        Self {
            origin_lat,
            origin_lon,
            meters_per_deg_lat: meters_per_deg,
            meters_per_deg_lon: meters_per_deg * origin_lat.to_radians().cos(),
        }
    }

    /// Projection centered on the mean of `(lat, lon)` pairs.
    pub fn centered_on(coords: &[(f64, f64)]) -> Option<Self> {
        if coords.is_empty() {
            return None;
        }
        let n = coords.len() as f64;
        let (lat_sum, lon_sum) = coords
            .iter()
            .fold((0.0, 0.0), |(a, b), (lat, lon)| (a + lat, b + lon));
        Some(Self::new(lat_sum / n, lon_sum / n))
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.origin_lat, self.origin_lon)
    }

    pub fn forward(&self, lat: f64, lon: f64) -> PlanarPoint {
        [
            (lon - self.origin_lon) * self.meters_per_deg_lon,
            (lat - self.origin_lat) * self.meters_per_deg_lat,
        ]
    }

    /// Returns `(lat, lon)`.
    pub fn inverse(&self, point: PlanarPoint) -> (f64, f64) {
        (
            self.origin_lat + point[1] / self.meters_per_deg_lat,
            self.origin_lon + point[0] / self.meters_per_deg_lon,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_zero() {
        let proj = LocalProjection::new(45.0, 4.0);
        assert_eq!(proj.forward(45.0, 4.0), [0.0, 0.0]);
    }

    #[test]
    fn test_inverse_round_trips() {
        let proj = LocalProjection::new(47.3, -1.55);
        let p = proj.forward(47.301, -1.549);
        let (lat, lon) = proj.inverse(p);
        assert!((lat - 47.301).abs() < 1e-12);
        assert!((lon + 1.549).abs() < 1e-12);
    }

    #[test]
    fn test_scale_is_metric() {
        let proj = LocalProjection::new(0.0, 0.0);
        let p = proj.forward(0.001, 0.001);
        // 0.001 degree is ~111.2 m at the equator in both directions.
        assert!((p[0] - 111.19).abs() < 0.05);
        assert!((p[1] - 111.19).abs() < 0.05);

        let north = LocalProjection::new(60.0, 0.0);
        let q = north.forward(60.0, 0.001);
        assert!((q[0] - 55.6).abs() < 0.05);
    }

    #[test]
    fn test_centered_on_mean() {
        let proj = LocalProjection::centered_on(&[(10.0, 20.0), (12.0, 22.0)]).unwrap();
        assert_eq!(proj.origin(), (11.0, 21.0));
        assert!(LocalProjection::centered_on(&[]).is_none());
    }
}
