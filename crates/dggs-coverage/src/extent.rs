//! Integer grid extents.

use serde::{Deserialize, Serialize};

use crate::error::{CoverageError, Result};

/// Range of valid grid coordinates, with inclusive low and high bounds per dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridExtent {
    low: Vec<i64>,
    high: Vec<i64>,
}

impl GridExtent {
    /// Create an extent from inclusive bounds.
    pub fn new(low: Vec<i64>, high: Vec<i64>) -> Result<Self> {
        if low.len() != high.len() {
            return Err(CoverageError::invalid_geometry(format!(
                "extent bounds have {} and {} dimensions",
                low.len(),
                high.len()
            )));
        }
        if let Some(d) = (0..low.len()).find(|&d| low[d] > high[d]) {
            return Err(CoverageError::invalid_geometry(format!(
                "extent low {} exceeds high {} in dimension {}",
                low[d], high[d], d
            )));
        }
        Ok(Self { low, high })
    }

    /// Extent starting at zero with the given number of cells per dimension.
    pub fn from_sizes(sizes: &[usize]) -> Result<Self> {
        if sizes.contains(&0) {
            return Err(CoverageError::invalid_geometry("extent sizes must be > 0"));
        }
        Ok(Self {
            low: vec![0; sizes.len()],
            high: sizes.iter().map(|&s| s as i64 - 1).collect(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.low.len()
    }

    pub fn low(&self, dimension: usize) -> i64 {
        self.low[dimension]
    }

    pub fn high(&self, dimension: usize) -> i64 {
        self.high[dimension]
    }

    pub fn lows(&self) -> &[i64] {
        &self.low
    }

    pub fn highs(&self) -> &[i64] {
        &self.high
    }

    /// Number of cells along one dimension.
    pub fn size(&self, dimension: usize) -> usize {
        (self.high[dimension] - self.low[dimension] + 1) as usize
    }

    pub fn sizes(&self) -> Vec<usize> {
        (0..self.dimension()).map(|d| self.size(d)).collect()
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        (0..self.dimension()).map(|d| self.size(d)).product()
    }

    pub fn contains(&self, position: &[i64]) -> bool {
        position.len() == self.dimension()
            && position
                .iter()
                .enumerate()
                .all(|(d, &p)| p >= self.low[d] && p <= self.high[d])
    }

    /// Check one coordinate against the bounds of `dimension`.
    pub fn check(&self, dimension: usize, value: i64) -> Result<()> {
        if value < self.low[dimension] || value > self.high[dimension] {
            return Err(CoverageError::OutsideGridBounds {
                dimension,
                value,
                low: self.low[dimension],
                high: self.high[dimension],
            });
        }
        Ok(())
    }

    /// Sub-extent over the dimensions `[offset, offset + size)`.
    pub fn sub(&self, offset: usize, size: usize) -> GridExtent {
        GridExtent {
            low: self.low[offset..offset + size].to_vec(),
            high: self.high[offset..offset + size].to_vec(),
        }
    }

    /// Append the dimensions of another extent.
    pub fn concat(&self, other: &GridExtent) -> GridExtent {
        let mut low = self.low.clone();
        let mut high = self.high.clone();
        low.extend_from_slice(&other.low);
        high.extend_from_slice(&other.high);
        GridExtent { low, high }
    }

    /// Intersection with an extent of the same dimension, `None` when disjoint.
    pub fn intersect(&self, other: &GridExtent) -> Option<GridExtent> {
        if self.dimension() != other.dimension() {
            return None;
        }
        let mut low = Vec::with_capacity(self.dimension());
        let mut high = Vec::with_capacity(self.dimension());
        for d in 0..self.dimension() {
            let lo = self.low[d].max(other.low[d]);
            let hi = self.high[d].min(other.high[d]);
            if lo > hi {
                return None;
            }
            low.push(lo);
            high.push(hi);
        }
        Some(GridExtent { low, high })
    }
}
