//! Spherical Web Mercator projection (EPSG:3857).

/// Earth radius used by Web Mercator (meters).
const WEB_MERCATOR_RADIUS: f64 = 6378137.0;

/// Web Mercator on a sphere of radius `radius`.
#[derive(Debug, Clone, PartialEq)]
pub struct WebMercator {
    pub radius: f64,
}

impl Default for WebMercator {
    fn default() -> Self {
        Self {
            radius: WEB_MERCATOR_RADIUS,
        }
    }
}

impl WebMercator {
    /// Convert (lon, lat) degrees to (x, y) meters.
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let x = lon.to_radians() * self.radius;
        let lat_rad = lat.to_radians();
        let y = ((std::f64::consts::PI / 4.0) + (lat_rad / 2.0)).tan().ln() * self.radius;
        (x, y)
    }

    /// Convert (x, y) meters to (lon, lat) degrees.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = (x / self.radius).to_degrees();
        let y_normalized = y / self.radius;
        let lat = (2.0 * y_normalized.exp().atan() - std::f64::consts::PI / 2.0).to_degrees();
        (lon, lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_extent() {
        let proj = WebMercator::default();
        let (x, _) = proj.forward(180.0, 0.0);
        assert!((x - 20037508.342789244).abs() < 1e-3);
    }

    #[test]
    fn test_roundtrip() {
        let proj = WebMercator::default();
        let (x, y) = proj.forward(12.5, 41.9);
        let (lon, lat) = proj.inverse(x, y);
        assert!((lon - 12.5).abs() < 1e-9);
        assert!((lat - 41.9).abs() < 1e-9);
    }
}
