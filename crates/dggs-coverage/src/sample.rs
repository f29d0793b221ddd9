//! Sample dimensions (bands) and the record type derived from them.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{CoverageError, Result};

/// Storage type of one sample dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    F32,
    #[default]
    F64,
    I32,
    U8,
    /// Free text, only representable in record storage.
    Text,
}

impl SampleType {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, SampleType::Text)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, SampleType::I32 | SampleType::U8)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SampleType::F32 => "f32",
            SampleType::F64 => "f64",
            SampleType::I32 => "i32",
            SampleType::U8 => "u8",
            SampleType::Text => "text",
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed sample dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDimension {
    pub name: String,
    #[serde(default)]
    pub sample_type: SampleType,
    /// Value marking a missing sample.
    #[serde(default)]
    pub no_data: Option<f64>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub read_only: bool,
}

impl SampleDimension {
    pub fn new(name: impl Into<String>, sample_type: SampleType) -> Self {
        Self {
            name: name.into(),
            sample_type,
            no_data: None,
            units: None,
            read_only: false,
        }
    }

    /// A `f64` band.
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, SampleType::F64)
    }

    pub fn with_no_data(mut self, value: f64) -> Self {
        self.no_data = Some(value);
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Value used to fill freshly allocated storage.
    pub fn fill_value(&self, float_fill: f64) -> f64 {
        match self.sample_type {
            SampleType::F32 | SampleType::F64 => self.no_data.unwrap_or(float_fill),
            _ => self.no_data.unwrap_or(0.0),
        }
    }
}

/// One field of a [`RecordType`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub sample_type: SampleType,
    pub writable: bool,
}

/// Structure of the per-cell records of record-backed storage.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    pub fields: Vec<FieldDescriptor>,
}

impl RecordType {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Ordered list of sample dimensions with lookup by name.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSchema {
    dimensions: Vec<SampleDimension>,
    by_name: HashMap<String, usize>,
}

impl SampleSchema {
    pub fn new(dimensions: Vec<SampleDimension>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(dimensions.len());
        for (i, d) in dimensions.iter().enumerate() {
            if by_name.insert(d.name.clone(), i).is_some() {
                return Err(CoverageError::DuplicateSampleName(d.name.clone()));
            }
        }
        Ok(Self { dimensions, by_name })
    }

    /// `count` float bands named `band0`, `band1`...
    pub fn floats(count: usize) -> Self {
        let dimensions: Vec<SampleDimension> = (0..count)
            .map(|i| SampleDimension::float(format!("band{}", i)))
            .collect();
        let by_name = dimensions
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i))
            .collect();
        Self { dimensions, by_name }
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn dimensions(&self) -> &[SampleDimension] {
        &self.dimensions
    }

    pub fn get(&self, band: usize) -> Option<&SampleDimension> {
        self.dimensions.get(band)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Schema restricted to a band range.
    pub fn select(&self, bands: Range<usize>) -> Result<SampleSchema> {
        if bands.start > bands.end || bands.end > self.len() {
            return Err(CoverageError::BandOutOfRange {
                band: bands.end.saturating_sub(1).max(bands.start),
                count: self.len(),
            });
        }
        SampleSchema::new(self.dimensions[bands].to_vec())
    }

    /// Record structure equivalent to this schema.
    pub fn record_type(&self) -> RecordType {
        RecordType {
            fields: self
                .dimensions
                .iter()
                .map(|d| FieldDescriptor {
                    name: d.name.clone(),
                    sample_type: d.sample_type,
                    writable: !d.read_only && d.sample_type.is_numeric(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name() {
        let schema = SampleSchema::new(vec![
            SampleDimension::float("temperature").with_units("K"),
            SampleDimension::new("class", SampleType::U8).with_no_data(255.0),
        ])
        .unwrap();
        assert_eq!(schema.index_of("class"), Some(1));
        assert_eq!(schema.index_of("pressure"), None);
        assert_eq!(schema.get(1).unwrap().fill_value(f64::NAN), 255.0);
        assert!(schema.get(0).unwrap().fill_value(f64::NAN).is_nan());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = SampleSchema::new(vec![SampleDimension::float("a"), SampleDimension::float("a")])
            .unwrap_err();
        assert_eq!(err, CoverageError::DuplicateSampleName("a".to_string()));
    }

    #[test]
    fn test_select_and_record_type() {
        let schema = SampleSchema::new(vec![
            SampleDimension::float("a"),
            SampleDimension::new("label", SampleType::Text),
            SampleDimension::float("c").read_only(),
        ])
        .unwrap();
        let sub = schema.select(1..3).unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.index_of("c"), Some(1));
        assert!(schema.select(2..4).is_err());

        let record = schema.record_type();
        assert!(record.fields[0].writable);
        assert!(!record.fields[1].writable);
        assert!(!record.fields[2].writable);
        assert_eq!(record.field_index("label"), Some(1));
    }

    #[test]
    fn test_deserialize_defaults() {
        let dim: SampleDimension = serde_json::from_str(r#"{"name": "t"}"#).unwrap();
        assert_eq!(dim.sample_type, SampleType::F64);
        assert!(!dim.read_only);
    }
}
