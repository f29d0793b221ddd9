//! Deterministic sample generators.
//!
//! Grids are `cols x rows` with the column as the first grid dimension, so the
//! row index varies fastest in memory, matching row-major linearization with
//! the last dimension contiguous.

/// Values `0, 1, 2, ...`: each cell holds its own linear position.
pub fn linear_values(len: usize) -> Vec<f64> {
    (0..len).map(|i| i as f64).collect()
}

/// Creates a test grid with predictable values.
///
/// Each cell value is `col * 1000 + row`, which makes misplaced reads obvious.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[0], 0.0);    // col=0, row=0
/// assert_eq!(grid[1], 1.0);    // col=0, row=1
/// assert_eq!(grid[5], 1000.0); // col=1, row=0
/// ```
pub fn create_test_grid(cols: usize, rows: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(cols * rows);
    for col in 0..cols {
        for row in 0..rows {
            data.push((col * 1000 + row) as f64);
        }
    }
    data
}

/// Creates a test grid with temperature-like values in Kelvin.
///
/// Values go from 250K in the first cell to about 310K in the last, with a
/// gradient along both axes.
pub fn create_temperature_grid(cols: usize, rows: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(cols * rows);
    for col in 0..cols {
        for row in 0..rows {
            let x_factor = col as f64 / cols.max(1) as f64;
            let y_factor = row as f64 / rows.max(1) as f64;
            data.push(250.0 + x_factor * 30.0 + y_factor * 30.0);
        }
    }
    data
}

/// Like [`create_test_grid`] with NaN every `period` cells, starting at cell 0.
pub fn create_grid_with_gaps(cols: usize, rows: usize, period: usize) -> Vec<f64> {
    let mut data = create_test_grid(cols, rows);
    for value in data.iter_mut().step_by(period.max(1)) {
        *value = f64::NAN;
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_grid_layout() {
        let grid = create_test_grid(3, 2);
        assert_eq!(grid, vec![0.0, 1.0, 1000.0, 1001.0, 2000.0, 2001.0]);
    }

    #[test]
    fn test_temperature_range() {
        let grid = create_temperature_grid(20, 10);
        assert!(grid.iter().all(|t| (250.0..310.0).contains(t)));
        assert_eq!(grid[0], 250.0);
    }

    #[test]
    fn test_gaps() {
        let grid = create_grid_with_gaps(2, 2, 2);
        assert!(grid[0].is_nan());
        assert_eq!(grid[1], 1.0);
        assert!(grid[2].is_nan());
    }

    #[test]
    fn test_linear_values() {
        assert_eq!(linear_values(3), vec![0.0, 1.0, 2.0]);
    }
}
