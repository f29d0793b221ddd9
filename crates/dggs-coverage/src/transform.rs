//! Transforms between integer grid positions and compound addresses.
//!
//! [`GridTransform`] is a closed set of variants:
//!
//! - [`ContinuousTransform`]: affine grid-to-CRS mapping over some dimensions
//! - [`LookupTransform`]: grid index `i` maps to the `i`-th listed value
//! - [`UndefinedTransform`]: placeholder for an axis not yet resolved
//! - `Compound`: two transforms side by side, dimensions concatenated
//!
//! Any transform can be split into the part responsible for a contiguous
//! dimension range, as long as that range does not straddle two children of
//! a compound.

use std::sync::{Arc, OnceLock};

use nalgebra::DMatrix;

use crate::address::{Address, Ordinate};
use crate::error::{CoverageError, Result};
use crate::extent::GridExtent;
use referencing::{Envelope, ReferencingError};

/// Coefficients smaller than this are treated as zero when separating dimensions.
const EPSILON: f64 = 1e-12;

// ============================================================================
// Continuous
// ============================================================================

/// Affine mapping from grid coordinates to CRS coordinates.
///
/// Stored as an `(n+1) x (n+1)` augmented matrix. The inverse is computed on
/// first use and cached.
#[derive(Debug, Clone)]
pub struct ContinuousTransform {
    matrix: DMatrix<f64>,
    inverse: OnceLock<Option<DMatrix<f64>>>,
}

impl PartialEq for ContinuousTransform {
    fn eq(&self, other: &Self) -> bool {
        self.matrix == other.matrix
    }
}

impl ContinuousTransform {
    /// Build from an augmented affine matrix.
    pub fn new(matrix: DMatrix<f64>) -> Result<Self> {
        let n = matrix.nrows();
        if n == 0 || matrix.ncols() != n {
            return Err(CoverageError::invalid_geometry(format!(
                "affine matrix must be square, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        let last = n - 1;
        let affine = (0..last).all(|c| matrix[(last, c)] == 0.0) && matrix[(last, last)] == 1.0;
        if !affine {
            return Err(CoverageError::invalid_geometry("last matrix row must be [0 .. 0 1]"));
        }
        Ok(Self {
            matrix,
            inverse: OnceLock::new(),
        })
    }

    pub fn identity(dimension: usize) -> Self {
        Self {
            matrix: DMatrix::identity(dimension + 1, dimension + 1),
            inverse: OnceLock::new(),
        }
    }

    /// Diagonal transform `crs[d] = grid[d] * scale[d] + translate[d]`.
    pub fn scale_translate(scale: &[f64], translate: &[f64]) -> Result<Self> {
        ReferencingError::check_dimension(scale.len(), translate.len())?;
        let n = scale.len();
        let mut matrix = DMatrix::identity(n + 1, n + 1);
        for d in 0..n {
            matrix[(d, d)] = scale[d];
            matrix[(d, n)] = translate[d];
        }
        Self::new(matrix)
    }

    /// Map cell centres of `extent` evenly over `envelope`.
    pub fn from_envelope(extent: &GridExtent, envelope: &Envelope) -> Result<Self> {
        ReferencingError::check_dimension(extent.dimension(), envelope.dimension())?;
        let n = extent.dimension();
        let mut scale = Vec::with_capacity(n);
        let mut translate = Vec::with_capacity(n);
        for d in 0..n {
            let s = envelope.span(d) / extent.size(d) as f64;
            scale.push(s);
            translate.push(envelope.lower()[d] + (0.5 - extent.low(d) as f64) * s);
        }
        Self::scale_translate(&scale, &translate)
    }

    pub fn dimension(&self) -> usize {
        self.matrix.nrows() - 1
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Diagonal coefficient of one dimension, i.e. the cell size along it.
    pub fn scale(&self, dimension: usize) -> f64 {
        self.matrix[(dimension, dimension)]
    }

    fn affine(m: &DMatrix<f64>, point: &[f64]) -> Vec<f64> {
        let n = m.nrows() - 1;
        (0..n)
            .map(|r| (0..n).map(|c| m[(r, c)] * point[c]).sum::<f64>() + m[(r, n)])
            .collect()
    }

    /// Forward mapping of real-valued grid coordinates.
    pub fn apply(&self, grid: &[f64]) -> Result<Vec<f64>> {
        ReferencingError::check_dimension(self.dimension(), grid.len())?;
        Ok(Self::affine(&self.matrix, grid))
    }

    fn inverse_matrix(&self) -> Result<&DMatrix<f64>> {
        self.inverse
            .get_or_init(|| self.matrix.clone().try_inverse())
            .as_ref()
            .ok_or_else(|| ReferencingError::NonInvertible("singular grid-to-CRS matrix".into()).into())
    }

    /// Inverse mapping to real-valued grid coordinates.
    pub fn inverse_apply(&self, crs: &[f64]) -> Result<Vec<f64>> {
        ReferencingError::check_dimension(self.dimension(), crs.len())?;
        Ok(Self::affine(self.inverse_matrix()?, crs))
    }

    pub fn to_address(&self, grid: &[i64]) -> Result<Address> {
        let real: Vec<f64> = grid.iter().map(|&g| g as f64).collect();
        Ok(Address::numeric(&self.apply(&real)?))
    }

    /// Grid position of the cell whose centre is nearest to the ordinates.
    pub fn to_grid(&self, ordinates: &[Ordinate]) -> Result<Vec<i64>> {
        let values = Address::new(ordinates.to_vec()).to_numbers()?;
        let real = self.inverse_apply(&values)?;
        real.iter()
            .map(|&v| {
                if v.is_finite() {
                    Ok(v.round() as i64)
                } else {
                    Err(CoverageError::PointOutsideCoverage(values.clone()))
                }
            })
            .collect()
    }

    /// Block diagonal concatenation: `self` on the first dimensions, `other` on the rest.
    pub fn block_diagonal(&self, other: &ContinuousTransform) -> ContinuousTransform {
        let na = self.dimension();
        let nb = other.dimension();
        let n = na + nb;
        let mut matrix = DMatrix::identity(n + 1, n + 1);
        for r in 0..na {
            for c in 0..na {
                matrix[(r, c)] = self.matrix[(r, c)];
            }
            matrix[(r, n)] = self.matrix[(r, na)];
        }
        for r in 0..nb {
            for c in 0..nb {
                matrix[(na + r, na + c)] = other.matrix[(r, c)];
            }
            matrix[(na + r, n)] = other.matrix[(r, nb)];
        }
        ContinuousTransform {
            matrix,
            inverse: OnceLock::new(),
        }
    }

    /// Sub-transform of the dimensions `[offset, offset + size)`.
    ///
    /// Fails unless those dimensions depend on no other dimension and no other
    /// dimension depends on them.
    pub fn split(&self, offset: usize, size: usize) -> Result<ContinuousTransform> {
        let n = self.dimension();
        let end = offset + size;
        if size == 0 || end > n {
            return Err(CoverageError::UnsplittableRange {
                offset,
                end,
                dimension: n,
            });
        }
        if offset == 0 && size == n {
            return Ok(self.clone());
        }
        let inside = |i: usize| i >= offset && i < end;
        for r in 0..n {
            for c in 0..n {
                if inside(r) != inside(c) && self.matrix[(r, c)].abs() > EPSILON {
                    return Err(CoverageError::UnsplittableRange {
                        offset,
                        end,
                        dimension: n,
                    });
                }
            }
        }
        let index = |i: usize| if i < size { offset + i } else { n };
        let sub = DMatrix::from_fn(size + 1, size + 1, |r, c| self.matrix[(index(r), index(c))]);
        Self::new(sub)
    }
}

// ============================================================================
// Lookup
// ============================================================================

/// One dimensional transform listing the value of every grid index.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTransform {
    values: Arc<[Ordinate]>,
}

impl LookupTransform {
    pub fn new(values: impl Into<Arc<[Ordinate]>>) -> Self {
        Self {
            values: values.into(),
        }
    }

    pub fn values(&self) -> &[Ordinate] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_address(&self, grid: &[i64]) -> Result<Address> {
        ReferencingError::check_dimension(1, grid.len())?;
        usize::try_from(grid[0])
            .ok()
            .and_then(|i| self.values.get(i))
            .map(|o| Address::new(vec![o.clone()]))
            .ok_or_else(|| CoverageError::OutsideGridBounds {
                dimension: 0,
                value: grid[0],
                low: 0,
                high: self.values.len() as i64 - 1,
            })
    }

    pub fn to_grid(&self, ordinates: &[Ordinate]) -> Result<Vec<i64>> {
        ReferencingError::check_dimension(1, ordinates.len())?;
        self.values
            .iter()
            .position(|v| *v == ordinates[0])
            .map(|i| vec![i as i64])
            .ok_or_else(|| CoverageError::no_data(format!("{} is not listed", ordinates[0])))
    }
}

// ============================================================================
// Undefined
// ============================================================================

/// Placeholder carrying only a reference system name and a dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct UndefinedTransform {
    pub name: String,
    pub dimension: usize,
}

impl UndefinedTransform {
    fn unsupported(&self) -> CoverageError {
        CoverageError::unsupported(format!("transform of {} is undefined", self.name))
    }
}

// ============================================================================
// Grid transform
// ============================================================================

/// Grid-to-address transform of a grid geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum GridTransform {
    Continuous(ContinuousTransform),
    Lookup(LookupTransform),
    Undefined(UndefinedTransform),
    Compound(Box<GridTransform>, Box<GridTransform>),
}

impl GridTransform {
    pub fn undefined(name: impl Into<String>, dimension: usize) -> Self {
        GridTransform::Undefined(UndefinedTransform {
            name: name.into(),
            dimension,
        })
    }

    pub fn lookup(values: Vec<Ordinate>) -> Self {
        GridTransform::Lookup(LookupTransform::new(values))
    }

    /// Place two transforms side by side.
    pub fn compose(first: GridTransform, second: GridTransform) -> Self {
        GridTransform::Compound(Box::new(first), Box::new(second))
    }

    /// Left fold of [`GridTransform::compose`] over `parts`.
    pub fn compose_all(parts: Vec<GridTransform>) -> Result<Self> {
        let mut iter = parts.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| CoverageError::invalid_geometry("no transform to compose"))?;
        Ok(iter.fold(first, GridTransform::compose))
    }

    pub fn dimension(&self) -> usize {
        match self {
            GridTransform::Continuous(t) => t.dimension(),
            GridTransform::Lookup(_) => 1,
            GridTransform::Undefined(t) => t.dimension,
            GridTransform::Compound(a, b) => a.dimension() + b.dimension(),
        }
    }

    /// Whether every part of the transform can convert positions.
    pub fn is_defined(&self) -> bool {
        match self {
            GridTransform::Undefined(_) => false,
            GridTransform::Compound(a, b) => a.is_defined() && b.is_defined(),
            _ => true,
        }
    }

    pub fn as_continuous(&self) -> Option<&ContinuousTransform> {
        match self {
            GridTransform::Continuous(t) => Some(t),
            _ => None,
        }
    }

    /// Merge a transform made only of continuous parts into one affine transform.
    pub fn to_continuous(&self) -> Option<ContinuousTransform> {
        match self {
            GridTransform::Continuous(t) => Some(t.clone()),
            GridTransform::Compound(a, b) => Some(a.to_continuous()?.block_diagonal(&b.to_continuous()?)),
            _ => None,
        }
    }

    pub fn to_address(&self, grid: &[i64]) -> Result<Address> {
        ReferencingError::check_dimension(self.dimension(), grid.len())?;
        match self {
            GridTransform::Continuous(t) => t.to_address(grid),
            GridTransform::Lookup(t) => t.to_address(grid),
            GridTransform::Undefined(t) => Err(t.unsupported()),
            GridTransform::Compound(a, b) => {
                let split = a.dimension();
                let head = a.to_address(&grid[..split])?;
                let tail = b.to_address(&grid[split..])?;
                let mut ordinates = head.ordinates().to_vec();
                ordinates.extend_from_slice(tail.ordinates());
                Ok(Address::new(ordinates))
            }
        }
    }

    pub fn to_grid(&self, address: &Address) -> Result<Vec<i64>> {
        ReferencingError::check_dimension(self.dimension(), address.dimension())?;
        self.to_grid_ordinates(address.ordinates())
    }

    fn to_grid_ordinates(&self, ordinates: &[Ordinate]) -> Result<Vec<i64>> {
        match self {
            GridTransform::Continuous(t) => t.to_grid(ordinates),
            GridTransform::Lookup(t) => t.to_grid(ordinates),
            GridTransform::Undefined(t) => Err(t.unsupported()),
            GridTransform::Compound(a, b) => {
                let split = a.dimension();
                let mut grid = a.to_grid_ordinates(&ordinates[..split])?;
                grid.extend(b.to_grid_ordinates(&ordinates[split..])?);
                Ok(grid)
            }
        }
    }

    /// Sub-transform of the dimensions `[offset, offset + size)`.
    ///
    /// The full range returns the transform itself. Other ranges must fall
    /// inside a single child of a compound.
    pub fn split(&self, offset: usize, size: usize) -> Result<GridTransform> {
        let dimension = self.dimension();
        let end = offset + size;
        let unsplittable = CoverageError::UnsplittableRange {
            offset,
            end,
            dimension,
        };
        if size == 0 || end > dimension {
            return Err(unsplittable);
        }
        if offset == 0 && size == dimension {
            return Ok(self.clone());
        }
        match self {
            GridTransform::Continuous(t) => Ok(GridTransform::Continuous(t.split(offset, size)?)),
            GridTransform::Compound(a, b) => {
                let da = a.dimension();
                if end <= da {
                    a.split(offset, size)
                } else if offset >= da {
                    b.split(offset - da, size)
                } else {
                    Err(unsplittable)
                }
            }
            GridTransform::Undefined(t) => Ok(GridTransform::undefined(t.name.clone(), size)),
            GridTransform::Lookup(_) => Err(unsplittable),
        }
    }
}

impl From<ContinuousTransform> for GridTransform {
    fn from(t: ContinuousTransform) -> Self {
        GridTransform::Continuous(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use referencing::ZoneId;

    fn zones() -> GridTransform {
        GridTransform::lookup(
            ["Q0", "Q1", "Q2", "Q3"]
                .iter()
                .map(|z| Ordinate::Zone(ZoneId::from(*z)))
                .collect(),
        )
    }

    #[test]
    fn test_continuous_roundtrip() {
        let t = ContinuousTransform::scale_translate(&[0.5, -2.0], &[10.0, 100.0]).unwrap();
        let address = t.to_address(&[4, 3]).unwrap();
        assert_eq!(address, Address::numeric(&[12.0, 94.0]));
        assert_eq!(t.to_grid(address.ordinates()).unwrap(), vec![4, 3]);
    }

    #[test]
    fn test_to_grid_rounds_to_nearest_cell() {
        let t = ContinuousTransform::scale_translate(&[10.0], &[0.0]).unwrap();
        assert_eq!(t.to_grid(&[Ordinate::Number(14.0)]).unwrap(), vec![1]);
        assert_eq!(t.to_grid(&[Ordinate::Number(16.0)]).unwrap(), vec![2]);
    }

    #[test]
    fn test_singular_matrix_is_reported() {
        let t = ContinuousTransform::scale_translate(&[0.0], &[1.0]).unwrap();
        let err = t.to_grid(&[Ordinate::Number(1.0)]).unwrap_err();
        assert!(matches!(err, CoverageError::Referencing(ReferencingError::NonInvertible(_))));
    }

    #[test]
    fn test_continuous_split_separable() {
        let t = ContinuousTransform::scale_translate(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap();
        let sub = t.split(1, 2).unwrap();
        assert_eq!(sub.dimension(), 2);
        assert_eq!(sub.apply(&[1.0, 1.0]).unwrap(), vec![7.0, 9.0]);
    }

    #[test]
    fn test_continuous_split_rejects_rotation() {
        let mut m = DMatrix::identity(3, 3);
        m[(0, 1)] = 0.5;
        let t = ContinuousTransform::new(m).unwrap();
        assert!(matches!(
            t.split(0, 1),
            Err(CoverageError::UnsplittableRange { .. })
        ));
        assert!(t.split(0, 2).is_ok());
    }

    #[test]
    fn test_compound_of_continuous_merges() {
        let a = ContinuousTransform::scale_translate(&[2.0], &[1.0]).unwrap();
        let b = ContinuousTransform::scale_translate(&[3.0, 4.0], &[0.0, -1.0]).unwrap();
        let t = GridTransform::compose(a.into(), b.into());
        let merged = t.to_continuous().unwrap();
        assert_eq!(merged.apply(&[1.0, 1.0, 1.0]).unwrap(), vec![3.0, 3.0, 3.0]);
        assert!(GridTransform::compose(t, zones()).to_continuous().is_none());
    }

    #[test]
    fn test_lookup_index_of() {
        let t = zones();
        let address = t.to_address(&[2]).unwrap();
        assert_eq!(address.ordinates()[0], Ordinate::Zone(ZoneId::from("Q2")));
        assert_eq!(t.to_grid(&address).unwrap(), vec![2]);
        assert!(t.to_address(&[4]).is_err());
        assert!(t
            .to_grid(&Address::new(vec![Ordinate::Zone(ZoneId::from("Q33"))]))
            .is_err());
    }

    #[test]
    fn test_undefined_is_unsupported() {
        let t = GridTransform::undefined("quad", 1);
        assert!(!t.is_defined());
        assert!(matches!(t.to_address(&[0]), Err(CoverageError::Unsupported(_))));
    }

    #[test]
    fn test_compound_delegates_by_range() {
        let height = ContinuousTransform::scale_translate(&[100.0], &[0.0]).unwrap();
        let t = GridTransform::compose(zones(), height.into());
        assert_eq!(t.dimension(), 2);
        let address = t.to_address(&[1, 2]).unwrap();
        assert_eq!(
            address,
            Address::new(vec![ZoneId::from("Q1").into(), 200.0.into()])
        );
        assert_eq!(t.to_grid(&address).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_compound_split_cross_child_fails() {
        let a: GridTransform = ContinuousTransform::identity(2).into();
        let t = GridTransform::compose(a, zones());
        assert!(matches!(
            t.split(1, 2),
            Err(CoverageError::UnsplittableRange { .. })
        ));
        assert_eq!(t.split(0, 3).unwrap(), t);
        assert_eq!(t.split(2, 1).unwrap(), zones());
    }
}
