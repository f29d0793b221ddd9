//! Array-backed storage: one flat buffer per band.

use num_traits::NumCast;

use super::{check_index, CellStore};
use crate::error::{CoverageError, Result};
use crate::sample::{SampleSchema, SampleType};

/// Typed values of one band.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    U8(Vec<u8>),
}

impl SampleBuffer {
    /// Buffer of `len` copies of `value`, typed for `sample_type`.
    pub fn filled(sample_type: SampleType, len: usize, value: f64) -> Result<Self> {
        Ok(match sample_type {
            SampleType::F32 => SampleBuffer::F32(vec![value as f32; len]),
            SampleType::F64 => SampleBuffer::F64(vec![value; len]),
            SampleType::I32 => SampleBuffer::I32(vec![cast(value, sample_type)?; len]),
            SampleType::U8 => SampleBuffer::U8(vec![cast(value, sample_type)?; len]),
            SampleType::Text => {
                return Err(CoverageError::NonNumericSample(sample_type.to_string()))
            }
        })
    }

    pub fn len(&self) -> usize {
        match self {
            SampleBuffer::F32(v) => v.len(),
            SampleBuffer::F64(v) => v.len(),
            SampleBuffer::I32(v) => v.len(),
            SampleBuffer::U8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            SampleBuffer::F32(_) => SampleType::F32,
            SampleBuffer::F64(_) => SampleType::F64,
            SampleBuffer::I32(_) => SampleType::I32,
            SampleBuffer::U8(_) => SampleType::U8,
        }
    }

    fn get(&self, index: usize) -> f64 {
        match self {
            SampleBuffer::F32(v) => v[index] as f64,
            SampleBuffer::F64(v) => v[index],
            SampleBuffer::I32(v) => v[index] as f64,
            SampleBuffer::U8(v) => v[index] as f64,
        }
    }

    fn check(&self, value: f64) -> Result<()> {
        match self {
            SampleBuffer::F32(_) | SampleBuffer::F64(_) => Ok(()),
            SampleBuffer::I32(_) => cast::<i32>(value, SampleType::I32).map(|_| ()),
            SampleBuffer::U8(_) => cast::<u8>(value, SampleType::U8).map(|_| ()),
        }
    }

    fn set(&mut self, index: usize, value: f64) -> Result<()> {
        match self {
            SampleBuffer::F32(v) => v[index] = value as f32,
            SampleBuffer::F64(v) => v[index] = value,
            SampleBuffer::I32(v) => v[index] = cast(value, SampleType::I32)?,
            SampleBuffer::U8(v) => v[index] = cast(value, SampleType::U8)?,
        }
        Ok(())
    }
}

/// Convert to an integer type, rejecting fractional, NaN and out of range values.
fn cast<T: NumCast>(value: f64, sample_type: SampleType) -> Result<T> {
    let not_representable = || CoverageError::SampleNotRepresentable {
        value,
        sample_type: sample_type.to_string(),
    };
    if value.fract() != 0.0 {
        return Err(not_representable());
    }
    T::from(value).ok_or_else(not_representable)
}

/// A band given as an n-dimensional array; storage accepts one dimensional ones only.
#[derive(Debug, Clone, PartialEq)]
pub struct BandArray {
    pub shape: Vec<usize>,
    pub values: SampleBuffer,
}

impl BandArray {
    pub fn flat(values: SampleBuffer) -> Self {
        Self {
            shape: vec![values.len()],
            values,
        }
    }

    pub fn shaped(shape: Vec<usize>, values: SampleBuffer) -> Self {
        Self { shape, values }
    }
}

/// One typed buffer per band, each holding one value per cell.
#[derive(Debug, Clone)]
pub struct ArrayStorage {
    bands: Vec<SampleBuffer>,
    read_only: Vec<bool>,
    names: Vec<String>,
    cells: usize,
}

impl ArrayStorage {
    /// Wrap existing buffers. Every buffer must hold `cells` values.
    pub fn new(schema: &SampleSchema, bands: Vec<SampleBuffer>, cells: usize) -> Result<Self> {
        if bands.len() != schema.len() {
            return Err(CoverageError::BandCountMismatch {
                expected: schema.len(),
                actual: bands.len(),
            });
        }
        for (band, (buffer, dim)) in bands.iter().zip(schema.dimensions()).enumerate() {
            if !dim.sample_type.is_numeric() {
                return Err(CoverageError::NonNumericSample(dim.name.clone()));
            }
            if buffer.len() != cells {
                return Err(CoverageError::SampleCountMismatch {
                    band,
                    expected: cells,
                    actual: buffer.len(),
                });
            }
        }
        Ok(Self {
            read_only: schema.dimensions().iter().map(|d| d.read_only).collect(),
            names: schema.dimensions().iter().map(|d| d.name.clone()).collect(),
            bands,
            cells,
        })
    }

    /// Storage of `cells` cells, every band filled with its fill value.
    pub fn filled(schema: &SampleSchema, cells: usize, float_fill: f64) -> Result<Self> {
        let bands = schema
            .dimensions()
            .iter()
            .map(|d| SampleBuffer::filled(d.sample_type, cells, d.fill_value(float_fill)))
            .collect::<Result<Vec<_>>>()?;
        Self::new(schema, bands, cells)
    }

    /// Build from band arrays, rejecting arrays that are not one dimensional.
    pub fn from_band_arrays(
        schema: &SampleSchema,
        arrays: Vec<BandArray>,
        cells: usize,
    ) -> Result<Self> {
        let mut bands = Vec::with_capacity(arrays.len());
        for (band, array) in arrays.into_iter().enumerate() {
            if array.shape.len() != 1 {
                return Err(CoverageError::NotOneDimensional {
                    band,
                    dimensions: array.shape.len(),
                });
            }
            if array.shape[0] != array.values.len() {
                return Err(CoverageError::SampleCountMismatch {
                    band,
                    expected: array.shape[0],
                    actual: array.values.len(),
                });
            }
            bands.push(array.values);
        }
        Self::new(schema, bands, cells)
    }

    pub fn band(&self, band: usize) -> Option<&SampleBuffer> {
        self.bands.get(band)
    }

    pub fn into_bands(self) -> Vec<SampleBuffer> {
        self.bands
    }
}

impl CellStore for ArrayStorage {
    fn cell_count(&self) -> usize {
        self.cells
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn sample(&self, cell: usize, band: usize) -> Result<f64> {
        check_index(cell, band, self.cells, self.bands.len())?;
        Ok(self.bands[band].get(cell))
    }

    fn check_sample(&self, cell: usize, band: usize, value: f64) -> Result<()> {
        check_index(cell, band, self.cells, self.bands.len())?;
        if self.read_only[band] {
            return Err(CoverageError::ReadOnlySample(self.names[band].clone()));
        }
        self.bands[band].check(value)
    }

    fn set_sample(&mut self, cell: usize, band: usize, value: f64) -> Result<()> {
        self.check_sample(cell, band, value)?;
        self.bands[band].set(cell, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleDimension;

    fn schema() -> SampleSchema {
        SampleSchema::new(vec![
            SampleDimension::float("temperature"),
            SampleDimension::new("class", SampleType::U8).with_no_data(255.0),
            SampleDimension::new("mask", SampleType::I32).read_only(),
        ])
        .unwrap()
    }

    #[test]
    fn test_filled_uses_band_fill() {
        let storage = ArrayStorage::filled(&schema(), 4, f64::NAN).unwrap();
        assert!(storage.sample(3, 0).unwrap().is_nan());
        assert_eq!(storage.sample(3, 1).unwrap(), 255.0);
        assert_eq!(storage.sample(3, 2).unwrap(), 0.0);
    }

    #[test]
    fn test_integer_writes_reject_lossy_values() {
        let mut storage = ArrayStorage::filled(&schema(), 2, f64::NAN).unwrap();
        storage.set_sample(0, 1, 12.0).unwrap();
        assert_eq!(storage.sample(0, 1).unwrap(), 12.0);
        for bad in [12.5, 256.0, -1.0, f64::NAN] {
            assert!(matches!(
                storage.set_sample(0, 1, bad),
                Err(CoverageError::SampleNotRepresentable { .. })
            ));
        }
    }

    #[test]
    fn test_read_only_band() {
        let mut storage = ArrayStorage::filled(&schema(), 2, f64::NAN).unwrap();
        assert!(matches!(
            storage.set_sample(1, 2, 1.0),
            Err(CoverageError::ReadOnlySample(_))
        ));
        assert!(matches!(
            storage.set_samples(1, &[1.0, 2.0, 3.0]),
            Err(CoverageError::ReadOnlySample(_))
        ));
    }

    #[test]
    fn test_rejected_cell_write_leaves_cell_unchanged() {
        let mut storage = ArrayStorage::filled(&schema(), 2, f64::NAN).unwrap();
        assert!(matches!(
            storage.set_samples(0, &[7.0, 1.0, 1.0]),
            Err(CoverageError::ReadOnlySample(_))
        ));
        assert!(storage.sample(0, 0).unwrap().is_nan());
        assert_eq!(storage.sample(0, 1).unwrap(), 255.0);

        let mut floats = ArrayStorage::new(
            &SampleSchema::new(vec![
                SampleDimension::float("a"),
                SampleDimension::new("class", SampleType::U8),
            ])
            .unwrap(),
            vec![SampleBuffer::F64(vec![1.0]), SampleBuffer::U8(vec![2])],
            1,
        )
        .unwrap();
        assert!(matches!(
            floats.set_samples(0, &[7.0, 2.5]),
            Err(CoverageError::SampleNotRepresentable { .. })
        ));
        assert_eq!(floats.sample(0, 0).unwrap(), 1.0);
        assert_eq!(floats.sample(0, 1).unwrap(), 2.0);

        floats.set_samples(0, &[7.0, 3.0]).unwrap();
        assert_eq!(floats.sample(0, 0).unwrap(), 7.0);
        assert_eq!(floats.sample(0, 1).unwrap(), 3.0);
    }

    #[test]
    fn test_length_checks() {
        let schema = SampleSchema::floats(1);
        let short = vec![SampleBuffer::F64(vec![0.0; 3])];
        assert!(matches!(
            ArrayStorage::new(&schema, short, 4),
            Err(CoverageError::SampleCountMismatch { band: 0, expected: 4, actual: 3 })
        ));

        let grid = vec![BandArray::shaped(vec![2, 2], SampleBuffer::F64(vec![0.0; 4]))];
        assert!(matches!(
            ArrayStorage::from_band_arrays(&schema, grid, 4),
            Err(CoverageError::NotOneDimensional { band: 0, dimensions: 2 })
        ));

        let flat = vec![BandArray::flat(SampleBuffer::F64(vec![0.0; 4]))];
        assert!(ArrayStorage::from_band_arrays(&schema, flat, 4).is_ok());
    }

    #[test]
    fn test_out_of_range_access() {
        let storage = ArrayStorage::filled(&SampleSchema::floats(2), 3, 0.0).unwrap();
        assert!(matches!(
            storage.sample(0, 2),
            Err(CoverageError::BandOutOfRange { band: 2, count: 2 })
        ));
        assert!(storage.sample(3, 0).is_err());
    }
}
