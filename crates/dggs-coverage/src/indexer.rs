//! Row-major linearization of grid positions.
//!
//! The last dimension varies fastest: `stride[n-1] == 1` and
//! `stride[i] == stride[i+1] * size[i+1]`. Every storage and iterator in this
//! crate goes through [`GridIndexer`], so they all agree on the layout.

use crate::error::{CoverageError, Result};
use crate::extent::GridExtent;

/// Converts grid positions to storage offsets and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridIndexer {
    sizes: Vec<usize>,
    offsets: Vec<i64>,
    strides: Vec<usize>,
    count: usize,
}

impl GridIndexer {
    pub fn new(extent: &GridExtent) -> Self {
        let sizes = extent.sizes();
        let offsets = extent.lows().to_vec();
        let mut strides = vec![1; sizes.len()];
        for d in (0..sizes.len().saturating_sub(1)).rev() {
            strides[d] = strides[d + 1] * sizes[d + 1];
        }
        let count = sizes.iter().product();
        Self {
            sizes,
            offsets,
            strides,
            count,
        }
    }

    pub fn dimension(&self) -> usize {
        self.sizes.len()
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn offsets(&self) -> &[i64] {
        &self.offsets
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn cell_count(&self) -> usize {
        self.count
    }

    /// Storage offset of a grid position.
    pub fn linear(&self, position: &[i64]) -> Result<usize> {
        if position.len() != self.dimension() {
            return Err(CoverageError::PositionNotInCoverage(position.to_vec()));
        }
        let mut index = 0usize;
        for (d, &p) in position.iter().enumerate() {
            let local = p - self.offsets[d];
            if local < 0 || local as usize >= self.sizes[d] {
                return Err(CoverageError::PositionNotInCoverage(position.to_vec()));
            }
            index += local as usize * self.strides[d];
        }
        if index >= self.count {
            return Err(CoverageError::PositionNotInCoverage(position.to_vec()));
        }
        Ok(index)
    }

    /// Grid position of a storage offset. Exact inverse of [`GridIndexer::linear`].
    pub fn position(&self, linear: usize) -> Vec<i64> {
        let mut rest = linear;
        let mut position = Vec::with_capacity(self.dimension());
        for d in 0..self.dimension() {
            position.push((rest / self.strides[d]) as i64 + self.offsets[d]);
            rest %= self.strides[d];
        }
        position
    }
}
