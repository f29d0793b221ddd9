//! Interpolation of continuous grid coverages.

use serde::{Deserialize, Serialize};

/// How a continuous coverage computes a value between cell centres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Value of the cell containing the point (preserves exact values).
    #[default]
    Nearest,
    /// Bilinear over the two horizontal grid axes, nearest on the others.
    Bilinear,
}

impl InterpolationMethod {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "bilinear" | "linear" => Self::Bilinear,
            _ => Self::Nearest,
        }
    }
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Bilinear => write!(f, "bilinear"),
        }
    }
}

/// Bilinear blend of four corner values.
///
/// `v00` is at the lower grid indices on both axes, `v10` one step along the
/// first axis. If any corner is NaN, the result is NaN.
pub fn bilinear(v00: f64, v10: f64, v01: f64, v11: f64, xf: f64, yf: f64) -> f64 {
    if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
        return f64::NAN;
    }

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

/// Lower corner index and fractional offset of `x` on an axis `[low, high]`.
///
/// The corner pair is clamped so that both indices stay on the axis.
pub fn corner(x: f64, low: i64, high: i64) -> (i64, i64, f64) {
    let x0 = (x.floor() as i64).clamp(low, high);
    let x1 = (x0 + 1).min(high);
    let frac = if x1 == x0 { 0.0 } else { (x - x0 as f64).clamp(0.0, 1.0) };
    (x0, x1, frac)
}
