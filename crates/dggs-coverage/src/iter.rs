//! Cursors over the cells of a coverage.
//!
//! Iterators start before the first cell, so the usual loop is
//! `while it.next() { ... }`. [`CellIterator::move_to`] jumps to a grid
//! position and [`CellIterator::position`] is its exact inverse.

use crate::error::{CoverageError, Result};
use crate::indexer::GridIndexer;
use crate::storage::CellStore;

/// Linear position state shared by both iterator kinds.
#[derive(Debug, Clone)]
struct Cursor<'a> {
    indexer: &'a GridIndexer,
    /// `None` before the first cell.
    linear: Option<usize>,
}

impl<'a> Cursor<'a> {
    fn new(indexer: &'a GridIndexer) -> Self {
        Self {
            indexer,
            linear: None,
        }
    }

    fn next(&mut self) -> bool {
        let count = self.indexer.cell_count();
        let next = self.linear.map_or(0, |l| l.saturating_add(1).min(count));
        self.linear = Some(next);
        next < count
    }

    fn move_to(&mut self, position: &[i64]) -> Result<()> {
        self.linear = Some(self.indexer.linear(position)?);
        Ok(())
    }

    fn current(&self) -> Result<usize> {
        self.linear
            .filter(|&l| l < self.indexer.cell_count())
            .ok_or(CoverageError::NoCurrentCell)
    }

    fn position(&self) -> Result<Vec<i64>> {
        Ok(self.indexer.position(self.current()?))
    }
}

/// Read-only cursor.
#[derive(Debug, Clone)]
pub struct CellIterator<'a> {
    store: &'a dyn CellStore,
    cursor: Cursor<'a>,
}

impl<'a> CellIterator<'a> {
    pub fn new(store: &'a dyn CellStore, indexer: &'a GridIndexer) -> Self {
        Self {
            store,
            cursor: Cursor::new(indexer),
        }
    }

    /// Advance to the next cell; `false` once all cells have been visited.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        self.cursor.next()
    }

    /// Jump to a grid position. Fails if the position is not part of the coverage.
    pub fn move_to(&mut self, position: &[i64]) -> Result<()> {
        self.cursor.move_to(position)
    }

    /// Grid position of the current cell.
    pub fn position(&self) -> Result<Vec<i64>> {
        self.cursor.position()
    }

    pub fn linear_position(&self) -> Result<usize> {
        self.cursor.current()
    }

    /// Go back before the first cell.
    pub fn rewind(&mut self) {
        self.cursor.linear = None;
    }

    pub fn sample(&self, band: usize) -> Result<f64> {
        self.store.sample(self.cursor.current()?, band)
    }

    pub fn samples(&self, out: &mut Vec<f64>) -> Result<()> {
        self.store.samples(self.cursor.current()?, out)
    }
}

/// Cursor that can also write the current cell.
#[derive(Debug)]
pub struct WritableCellIterator<'a> {
    store: &'a mut dyn CellStore,
    cursor: Cursor<'a>,
}

impl<'a> WritableCellIterator<'a> {
    pub fn new(store: &'a mut dyn CellStore, indexer: &'a GridIndexer) -> Self {
        Self {
            store,
            cursor: Cursor::new(indexer),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        self.cursor.next()
    }

    pub fn move_to(&mut self, position: &[i64]) -> Result<()> {
        self.cursor.move_to(position)
    }

    pub fn position(&self) -> Result<Vec<i64>> {
        self.cursor.position()
    }

    pub fn linear_position(&self) -> Result<usize> {
        self.cursor.current()
    }

    pub fn rewind(&mut self) {
        self.cursor.linear = None;
    }

    pub fn sample(&self, band: usize) -> Result<f64> {
        self.store.sample(self.cursor.current()?, band)
    }

    pub fn samples(&self, out: &mut Vec<f64>) -> Result<()> {
        self.store.samples(self.cursor.current()?, out)
    }

    pub fn set_sample(&mut self, band: usize, value: f64) -> Result<()> {
        let cell = self.cursor.current()?;
        self.store.set_sample(cell, band, value)
    }

    pub fn set_samples(&mut self, values: &[f64]) -> Result<()> {
        let cell = self.cursor.current()?;
        self.store.set_samples(cell, values)
    }
}
