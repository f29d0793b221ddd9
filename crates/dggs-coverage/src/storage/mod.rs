//! Per-cell sample storage.
//!
//! Two backings implement [`CellStore`]:
//!
//! - [`ArrayStorage`]: one flat typed buffer per band
//! - [`RecordStorage`]: one record per cell, with possibly non-numeric fields
//!
//! Cells are addressed by linear position; see [`crate::indexer::GridIndexer`].

mod array;
mod record;

pub use array::{ArrayStorage, BandArray, SampleBuffer};
pub use record::{FieldValue, Record, RecordStorage};

use std::fmt;

use crate::error::{CoverageError, Result};

/// Storage of the sample vectors of a coverage.
pub trait CellStore: fmt::Debug + Send + Sync {
    /// Number of cells.
    fn cell_count(&self) -> usize;

    /// Number of samples per cell.
    fn band_count(&self) -> usize;

    /// Read one sample as `f64`.
    fn sample(&self, cell: usize, band: usize) -> Result<f64>;

    /// Check that `value` could be written to a slot, without writing it.
    fn check_sample(&self, cell: usize, band: usize, value: f64) -> Result<()>;

    /// Write one sample. Rejects read-only and non-numeric slots.
    fn set_sample(&mut self, cell: usize, band: usize, value: f64) -> Result<()>;

    /// Read all samples of a cell into `out`, replacing its content.
    fn samples(&self, cell: usize, out: &mut Vec<f64>) -> Result<()> {
        out.clear();
        for band in 0..self.band_count() {
            out.push(self.sample(cell, band)?);
        }
        Ok(())
    }

    /// Write all samples of a cell. Either every band is written or none is.
    fn set_samples(&mut self, cell: usize, values: &[f64]) -> Result<()> {
        if values.len() != self.band_count() {
            return Err(CoverageError::BandCountMismatch {
                expected: self.band_count(),
                actual: values.len(),
            });
        }
        for (band, &value) in values.iter().enumerate() {
            self.check_sample(cell, band, value)?;
        }
        for (band, &value) in values.iter().enumerate() {
            self.set_sample(cell, band, value)?;
        }
        Ok(())
    }
}

/// Check cell and band indices against a store's dimensions.
pub(crate) fn check_index(cell: usize, band: usize, cells: usize, bands: usize) -> Result<()> {
    if band >= bands {
        return Err(CoverageError::BandOutOfRange { band, count: bands });
    }
    if cell >= cells {
        return Err(CoverageError::PositionNotInCoverage(vec![cell as i64]));
    }
    Ok(())
}
