//! Record-backed storage: one structured record per cell.

use serde::{Deserialize, Serialize};

use super::{check_index, CellStore};
use crate::error::{CoverageError, Result};
use crate::sample::{RecordType, SampleSchema, SampleType};

/// Value of one record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

/// Attributes of one cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    pub values: Vec<FieldValue>,
}

/// One [`Record`] per cell, fields laid out by a [`RecordType`].
#[derive(Debug, Clone)]
pub struct RecordStorage {
    record_type: RecordType,
    records: Vec<Record>,
}

impl RecordStorage {
    pub fn new(record_type: RecordType, records: Vec<Record>) -> Result<Self> {
        let fields = record_type.fields.len();
        if let Some(r) = records.iter().find(|r| r.values.len() != fields) {
            return Err(CoverageError::BandCountMismatch {
                expected: fields,
                actual: r.values.len(),
            });
        }
        Ok(Self {
            record_type,
            records,
        })
    }

    /// `cells` records with numeric fields set to their fill value and text fields empty.
    pub fn filled(schema: &SampleSchema, cells: usize, float_fill: f64) -> Self {
        let template = Record {
            values: schema
                .dimensions()
                .iter()
                .map(|d| match d.sample_type {
                    SampleType::Text => FieldValue::Text(String::new()),
                    _ => FieldValue::Number(d.fill_value(float_fill)),
                })
                .collect(),
        };
        Self {
            record_type: schema.record_type(),
            records: vec![template; cells],
        }
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn record(&self, cell: usize) -> Option<&Record> {
        self.records.get(cell)
    }

    /// Field of a cell by name.
    pub fn field(&self, cell: usize, name: &str) -> Option<&FieldValue> {
        let index = self.record_type.field_index(name)?;
        self.records.get(cell)?.values.get(index)
    }

    /// Replace a text field. Numeric fields go through [`CellStore::set_sample`].
    pub fn set_text(&mut self, cell: usize, name: &str, text: impl Into<String>) -> Result<()> {
        let band = self
            .record_type
            .field_index(name)
            .ok_or_else(|| CoverageError::NonNumericSample(name.to_string()))?;
        check_index(cell, band, self.records.len(), self.record_type.fields.len())?;
        match &mut self.records[cell].values[band] {
            FieldValue::Text(t) => {
                *t = text.into();
                Ok(())
            }
            FieldValue::Number(_) => Err(CoverageError::unsupported(format!(
                "field {} is numeric",
                name
            ))),
        }
    }
}

impl CellStore for RecordStorage {
    fn cell_count(&self) -> usize {
        self.records.len()
    }

    fn band_count(&self) -> usize {
        self.record_type.fields.len()
    }

    fn sample(&self, cell: usize, band: usize) -> Result<f64> {
        check_index(cell, band, self.records.len(), self.band_count())?;
        match &self.records[cell].values[band] {
            FieldValue::Number(v) => Ok(*v),
            FieldValue::Text(_) => Err(CoverageError::NonNumericSample(
                self.record_type.fields[band].name.clone(),
            )),
        }
    }

    fn check_sample(&self, cell: usize, band: usize, _value: f64) -> Result<()> {
        check_index(cell, band, self.records.len(), self.band_count())?;
        let field = &self.record_type.fields[band];
        if !field.sample_type.is_numeric() {
            return Err(CoverageError::NonNumericSample(field.name.clone()));
        }
        if !field.writable {
            return Err(CoverageError::ReadOnlySample(field.name.clone()));
        }
        Ok(())
    }

    fn set_sample(&mut self, cell: usize, band: usize, value: f64) -> Result<()> {
        self.check_sample(cell, band, value)?;
        self.records[cell].values[band] = FieldValue::Number(value);
        Ok(())
    }
}
