//! Lambert Conformal Conic projection.
//!
//! Commonly used for regional weather grids such as HRRR. It maps a cone
//! tangent or secant to the Earth's surface onto a flat plane.
//!
//! The projection parameters include:
//! - Latitude of origin (lat0): where northing is zero
//! - Central meridian (lon0): where easting is zero (LoV in GRIB2)
//! - Standard parallel(s): Latin1 and Latin2 (can be equal for tangent cone)

use std::f64::consts::PI;

/// Mean Earth radius used by NCEP grids (meters).
const EARTH_RADIUS: f64 = 6371229.0;

/// Lambert Conformal Conic projection on a sphere.
#[derive(Debug, Clone, PartialEq)]
pub struct LambertConformal {
    /// Central meridian in radians
    pub lon0: f64,
    /// Latitude of origin in radians
    pub lat0: f64,
    /// First standard parallel in radians
    pub latin1: f64,
    /// Second standard parallel in radians
    pub latin2: f64,
    /// Earth radius (meters)
    pub earth_radius: f64,
    /// Cone constant (n)
    n: f64,
    /// F constant
    f: f64,
    /// Rho at the latitude of origin
    rho0: f64,
}

impl LambertConformal {
    /// Create a projection from parameters in degrees.
    pub fn new(lat0_deg: f64, lon0_deg: f64, latin1_deg: f64, latin2_deg: f64) -> Self {
        let to_rad = PI / 180.0;

        let lat0 = lat0_deg * to_rad;
        let lon0 = lon0_deg * to_rad;
        let latin1 = latin1_deg * to_rad;
        let latin2 = latin2_deg * to_rad;
        let earth_radius = EARTH_RADIUS;

        let n = if (latin1 - latin2).abs() < 1e-10 {
            // Tangent cone
            latin1.sin()
        } else {
            // Secant cone
            let ln_ratio = (latin1.cos() / latin2.cos()).ln();
            let tan_ratio =
                ((PI / 4.0 + latin2 / 2.0).tan() / (PI / 4.0 + latin1 / 2.0).tan()).ln();
            ln_ratio / tan_ratio
        };

        let f = (latin1.cos() * (PI / 4.0 + latin1 / 2.0).tan().powf(n)) / n;
        let rho0 = earth_radius * f / (PI / 4.0 + lat0 / 2.0).tan().powf(n);

        Self {
            lon0,
            lat0,
            latin1,
            latin2,
            earth_radius,
            n,
            f,
            rho0,
        }
    }

    /// The HRRR CONUS projection: LoV -97.5°, standard parallels 38.5°.
    pub fn hrrr() -> Self {
        Self::new(38.5, -97.5, 38.5, 38.5)
    }

    /// Project (lon, lat) in degrees to (x, y) in meters.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let lat = lat_deg.to_radians();
        let lon = lon_deg.to_radians();

        // Normalize longitude difference to [-π, π]
        let mut dlon = lon - self.lon0;
        while dlon > PI {
            dlon -= 2.0 * PI;
        }
        while dlon < -PI {
            dlon += 2.0 * PI;
        }

        let rho = self.earth_radius * self.f / (PI / 4.0 + lat / 2.0).tan().powf(self.n);
        let theta = self.n * dlon;

        let x = rho * theta.sin();
        let y = self.rho0 - rho * theta.cos();
        (x, y)
    }

    /// Unproject (x, y) in meters to (lon, lat) in degrees.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let dy = self.rho0 - y;
        let mut rho = (x * x + dy * dy).sqrt();
        let theta = if self.n < 0.0 {
            rho = -rho;
            (-x).atan2(-dy)
        } else {
            x.atan2(dy)
        };

        let lat = 2.0 * ((self.earth_radius * self.f / rho).powf(1.0 / self.n)).atan() - PI / 2.0;
        let lon = self.lon0 + theta / self.n;

        (lon.to_degrees(), lat.to_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_zero() {
        let proj = LambertConformal::hrrr();
        let (x, y) = proj.forward(-97.5, 38.5);
        assert!(x.abs() < 1e-6, "x should be ~0, got {}", x);
        assert!(y.abs() < 1e-6, "y should be ~0, got {}", y);
    }

    #[test]
    fn test_roundtrip() {
        let proj = LambertConformal::hrrr();

        for &(lon, lat) in &[(-122.7, 21.1), (-94.5, 39.0), (-70.0, 50.0)] {
            let (x, y) = proj.forward(lon, lat);
            let (rlon, rlat) = proj.inverse(x, y);
            assert!((rlon - lon).abs() < 1e-6, "lon roundtrip failed: {} vs {}", lon, rlon);
            assert!((rlat - lat).abs() < 1e-6, "lat roundtrip failed: {} vs {}", lat, rlat);
        }
    }

    #[test]
    fn test_secant_cone_roundtrip() {
        let proj = LambertConformal::new(25.0, -95.0, 25.0, 60.0);
        let (x, y) = proj.forward(-80.0, 45.0);
        let (lon, lat) = proj.inverse(x, y);
        assert!((lon + 80.0).abs() < 1e-6);
        assert!((lat - 45.0).abs() < 1e-6);
    }

    #[test]
    fn test_east_is_positive_x() {
        let proj = LambertConformal::hrrr();
        let (x_east, _) = proj.forward(-90.0, 38.5);
        let (x_west, _) = proj.forward(-105.0, 38.5);
        assert!(x_east > 0.0);
        assert!(x_west < 0.0);
    }
}
