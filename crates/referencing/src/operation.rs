//! Coordinate operations between reference systems.

use std::fmt;
use std::sync::Arc;

use crate::crs::Projection;
use crate::error::{ReferencingError, Result};

/// A conversion of coordinates from one reference system to another.
pub trait CoordinateOperation: fmt::Debug + Send + Sync {
    /// Number of input ordinates.
    fn source_dimension(&self) -> usize;

    /// Number of output ordinates.
    fn target_dimension(&self) -> usize;

    /// Transform one point.
    fn transform(&self, source: &[f64]) -> Result<Vec<f64>>;
}

/// Shared handle to an operation.
pub type OperationRef = Arc<dyn CoordinateOperation>;

/// Passes coordinates through unchanged.
#[derive(Debug, Clone)]
pub struct Identity {
    dimension: usize,
}

impl Identity {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl CoordinateOperation for Identity {
    fn source_dimension(&self) -> usize {
        self.dimension
    }

    fn target_dimension(&self) -> usize {
        self.dimension
    }

    fn transform(&self, source: &[f64]) -> Result<Vec<f64>> {
        ReferencingError::check_dimension(self.dimension, source.len())?;
        Ok(source.to_vec())
    }
}

/// Keeps a subset of the input ordinates, in the given order.
#[derive(Debug, Clone)]
pub struct AxisSelection {
    source_dimension: usize,
    indices: Vec<usize>,
}

impl AxisSelection {
    pub fn new(source_dimension: usize, indices: Vec<usize>) -> Self {
        Self {
            source_dimension,
            indices,
        }
    }

    /// Select the contiguous range `[offset, offset + size)`.
    pub fn range(source_dimension: usize, offset: usize, size: usize) -> Self {
        Self::new(source_dimension, (offset..offset + size).collect())
    }
}

impl CoordinateOperation for AxisSelection {
    fn source_dimension(&self) -> usize {
        self.source_dimension
    }

    fn target_dimension(&self) -> usize {
        self.indices.len()
    }

    fn transform(&self, source: &[f64]) -> Result<Vec<f64>> {
        ReferencingError::check_dimension(self.source_dimension, source.len())?;
        Ok(self.indices.iter().map(|&i| source[i]).collect())
    }
}

/// Per-axis `scale * x + offset`, used for unit and epoch changes.
#[derive(Debug, Clone)]
pub struct LinearOperation {
    scale: Vec<f64>,
    offset: Vec<f64>,
}

impl LinearOperation {
    pub fn new(scale: Vec<f64>, offset: Vec<f64>) -> Self {
        Self { scale, offset }
    }
}

impl CoordinateOperation for LinearOperation {
    fn source_dimension(&self) -> usize {
        self.scale.len()
    }

    fn target_dimension(&self) -> usize {
        self.scale.len()
    }

    fn transform(&self, source: &[f64]) -> Result<Vec<f64>> {
        ReferencingError::check_dimension(self.scale.len(), source.len())?;
        Ok(source
            .iter()
            .zip(self.scale.iter().zip(&self.offset))
            .map(|(&x, (&s, &o))| s * x + o)
            .collect())
    }
}

/// Direction of a projection operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionDirection {
    /// Geographic degrees to projected meters.
    Forward,
    /// Projected meters to geographic degrees.
    Inverse,
}

/// Applies a map projection in one direction.
#[derive(Debug, Clone)]
pub struct ProjectionOperation {
    projection: Projection,
    direction: ProjectionDirection,
}

impl ProjectionOperation {
    pub fn new(projection: Projection, direction: ProjectionDirection) -> Self {
        Self {
            projection,
            direction,
        }
    }
}

impl CoordinateOperation for ProjectionOperation {
    fn source_dimension(&self) -> usize {
        2
    }

    fn target_dimension(&self) -> usize {
        2
    }

    fn transform(&self, source: &[f64]) -> Result<Vec<f64>> {
        ReferencingError::check_dimension(2, source.len())?;
        let (a, b) = match self.direction {
            ProjectionDirection::Forward => self.projection.forward(source[0], source[1]),
            ProjectionDirection::Inverse => self.projection.inverse(source[0], source[1]),
        };
        Ok(vec![a, b])
    }
}

/// Applies operations one after the other.
#[derive(Debug, Clone)]
pub struct Concatenated {
    steps: Vec<OperationRef>,
}

impl Concatenated {
    /// Chain `steps`; an empty chain is not allowed.
    pub fn new(steps: Vec<OperationRef>) -> Result<Self> {
        if steps.is_empty() {
            return Err(ReferencingError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }
        for pair in steps.windows(2) {
            ReferencingError::check_dimension(pair[0].target_dimension(), pair[1].source_dimension())?;
        }
        Ok(Self { steps })
    }
}

impl CoordinateOperation for Concatenated {
    fn source_dimension(&self) -> usize {
        self.steps[0].source_dimension()
    }

    fn target_dimension(&self) -> usize {
        self.steps[self.steps.len() - 1].target_dimension()
    }

    fn transform(&self, source: &[f64]) -> Result<Vec<f64>> {
        let mut point = source.to_vec();
        for step in &self.steps {
            point = step.transform(&point)?;
        }
        Ok(point)
    }
}

/// Applies several operations to the same input and concatenates their outputs.
#[derive(Debug, Clone)]
pub struct Stacked {
    source_dimension: usize,
    parts: Vec<OperationRef>,
}

impl Stacked {
    pub fn new(source_dimension: usize, parts: Vec<OperationRef>) -> Result<Self> {
        for part in &parts {
            ReferencingError::check_dimension(source_dimension, part.source_dimension())?;
        }
        Ok(Self {
            source_dimension,
            parts,
        })
    }
}

impl CoordinateOperation for Stacked {
    fn source_dimension(&self) -> usize {
        self.source_dimension
    }

    fn target_dimension(&self) -> usize {
        self.parts.iter().map(|p| p.target_dimension()).sum()
    }

    fn transform(&self, source: &[f64]) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.target_dimension());
        for part in &self.parts {
            out.extend(part.transform(source)?);
        }
        Ok(out)
    }
}
