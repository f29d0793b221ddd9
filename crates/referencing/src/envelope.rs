//! N-dimensional envelopes.

use serde::{Deserialize, Serialize};

use crate::error::{ReferencingError, Result};
use crate::operation::CoordinateOperation;

/// Number of samples taken along each envelope edge when transforming it.
const EDGE_SAMPLES: usize = 8;

/// An axis-aligned box with one `[lower, upper]` range per dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Envelope {
    /// Build an envelope, validating the bounds.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(ReferencingError::DimensionMismatch {
                expected: lower.len(),
                actual: upper.len(),
            });
        }
        if let Some(d) = (0..lower.len()).find(|&d| lower[d] > upper[d]) {
            return Err(ReferencingError::InvalidEnvelope(format!(
                "lower bound {} exceeds upper bound {} in dimension {}",
                lower[d], upper[d], d
            )));
        }
        Ok(Self { lower, upper })
    }

    pub(crate) fn from_bounds(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self { lower, upper }
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Extent of the envelope along one dimension.
    pub fn span(&self, dimension: usize) -> f64 {
        self.upper[dimension] - self.lower[dimension]
    }

    pub fn median(&self, dimension: usize) -> f64 {
        (self.lower[dimension] + self.upper[dimension]) / 2.0
    }

    /// Sub-envelope over the dimensions `[offset, offset + size)`.
    pub fn sub(&self, offset: usize, size: usize) -> Envelope {
        Envelope {
            lower: self.lower[offset..offset + size].to_vec(),
            upper: self.upper[offset..offset + size].to_vec(),
        }
    }

    /// Concatenate the dimensions of two envelopes.
    pub fn concat(&self, other: &Envelope) -> Envelope {
        let mut lower = self.lower.clone();
        let mut upper = self.upper.clone();
        lower.extend_from_slice(&other.lower);
        upper.extend_from_slice(&other.upper);
        Envelope { lower, upper }
    }

    /// Intersection with another envelope of the same dimension, `None` when disjoint.
    pub fn intersection(&self, other: &Envelope) -> Option<Envelope> {
        if self.dimension() != other.dimension() {
            return None;
        }
        let mut lower = Vec::with_capacity(self.dimension());
        let mut upper = Vec::with_capacity(self.dimension());
        for d in 0..self.dimension() {
            let lo = self.lower[d].max(other.lower[d]);
            let hi = self.upper[d].min(other.upper[d]);
            if lo > hi {
                return None;
            }
            lower.push(lo);
            upper.push(hi);
        }
        Some(Envelope { lower, upper })
    }

    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.dimension()
            && (0..self.dimension()).all(|d| point[d] >= self.lower[d] && point[d] <= self.upper[d])
    }

    /// Transform the envelope through an operation.
    ///
    /// Corners and points sampled along every edge are transformed; the result
    /// is the bounding envelope of the transformed points. Points that fail to
    /// transform are skipped, and an error is returned only if all of them fail.
    pub fn transform(&self, operation: &dyn CoordinateOperation) -> Result<Envelope> {
        ReferencingError::check_dimension(operation.source_dimension(), self.dimension())?;
        let target_dim = operation.target_dimension();
        let mut lower = vec![f64::INFINITY; target_dim];
        let mut upper = vec![f64::NEG_INFINITY; target_dim];
        let mut last_error = None;
        let mut any = false;

        let n = self.dimension();
        let steps = if n <= 3 { EDGE_SAMPLES } else { 1 };
        // Sample a lattice of (steps + 1)^n points covering the envelope.
        let per_axis = steps + 1;
        let total = per_axis.pow(n as u32);
        let mut point = vec![0.0; n];
        for index in 0..total {
            let mut rest = index;
            for d in 0..n {
                let k = rest % per_axis;
                rest /= per_axis;
                point[d] = self.lower[d] + self.span(d) * k as f64 / steps as f64;
            }
            match operation.transform(&point) {
                Ok(out) => {
                    if out.iter().any(|v| !v.is_finite()) {
                        continue;
                    }
                    any = true;
                    for d in 0..target_dim {
                        lower[d] = lower[d].min(out[d]);
                        upper[d] = upper[d].max(out[d]);
                    }
                }
                Err(e) => last_error = Some(e),
            }
        }

        if !any {
            return Err(last_error.unwrap_or_else(|| {
                ReferencingError::InvalidEnvelope("no finite transformed point".to_string())
            }));
        }
        Ok(Envelope { lower, upper })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::LinearOperation;

    #[test]
    fn test_new_rejects_inverted_bounds() {
        assert!(Envelope::new(vec![0.0, 5.0], vec![1.0, 4.0]).is_err());
        assert!(Envelope::new(vec![0.0], vec![1.0, 4.0]).is_err());
    }

    #[test]
    fn test_intersection() {
        let a = Envelope::new(vec![0.0, 0.0], vec![10.0, 10.0]).unwrap();
        let b = Envelope::new(vec![5.0, -5.0], vec![15.0, 5.0]).unwrap();
        let c = Envelope::new(vec![20.0, 20.0], vec![30.0, 30.0]).unwrap();

        let i = a.intersection(&b).unwrap();
        assert_eq!(i.lower(), &[5.0, 0.0]);
        assert_eq!(i.upper(), &[10.0, 5.0]);
        assert!(a.intersection(&c).is_none());
    }

    #[test]
    fn test_transform_linear() {
        let env = Envelope::new(vec![0.0], vec![10.0]).unwrap();
        let op = LinearOperation::new(vec![-2.0], vec![1.0]);
        let out = env.transform(&op).unwrap();
        assert_eq!(out.lower(), &[-19.0]);
        assert_eq!(out.upper(), &[1.0]);
    }

    #[test]
    fn test_sub_and_concat() {
        let env = Envelope::new(vec![0.0, 1.0, 2.0], vec![3.0, 4.0, 5.0]).unwrap();
        let head = env.sub(0, 2);
        let tail = env.sub(2, 1);
        assert_eq!(head.concat(&tail), env);
        assert_eq!(tail.span(0), 3.0);
    }

    #[test]
    fn test_deserialize() {
        let env: Envelope =
            serde_json::from_str(r#"{"lower": [-10.0, 0.0], "upper": [10.0, 5.0]}"#).unwrap();
        assert_eq!(env.dimension(), 2);
        assert_eq!(env.median(0), 0.0);
    }
}
