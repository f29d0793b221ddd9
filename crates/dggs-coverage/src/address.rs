//! Compound addresses mixing numeric ordinates and zone identifiers.

use std::fmt;

use referencing::ZoneId;
use serde::{Deserialize, Serialize};

use crate::error::{CoverageError, Result};

/// One slot of an [`Address`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ordinate {
    Number(f64),
    Zone(ZoneId),
}

impl Ordinate {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Ordinate::Number(v) => Some(*v),
            Ordinate::Zone(_) => None,
        }
    }

    pub fn as_zone(&self) -> Option<&ZoneId> {
        match self {
            Ordinate::Zone(z) => Some(z),
            Ordinate::Number(_) => None,
        }
    }
}

impl From<f64> for Ordinate {
    fn from(v: f64) -> Self {
        Ordinate::Number(v)
    }
}

impl From<ZoneId> for Ordinate {
    fn from(z: ZoneId) -> Self {
        Ordinate::Zone(z)
    }
}

impl fmt::Display for Ordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ordinate::Number(v) => write!(f, "{}", v),
            Ordinate::Zone(z) => write!(f, "{}", z),
        }
    }
}

/// Immutable tuple of ordinates, one per dimension of a reference system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address(Vec<Ordinate>);

impl Address {
    pub fn new(ordinates: Vec<Ordinate>) -> Self {
        Self(ordinates)
    }

    /// Address made of numbers only.
    pub fn numeric(values: &[f64]) -> Self {
        Self(values.iter().map(|&v| Ordinate::Number(v)).collect())
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn ordinates(&self) -> &[Ordinate] {
        &self.0
    }

    pub fn get(&self, dimension: usize) -> Option<&Ordinate> {
        self.0.get(dimension)
    }

    /// All ordinates as numbers; fails if any slot holds a zone.
    pub fn to_numbers(&self) -> Result<Vec<f64>> {
        self.0
            .iter()
            .map(|o| {
                o.as_number()
                    .ok_or_else(|| CoverageError::unsupported(format!("ordinate {} is not numeric", o)))
            })
            .collect()
    }

    /// Ordinates of the dimensions `[offset, offset + size)`.
    pub fn slice(&self, offset: usize, size: usize) -> &[Ordinate] {
        &self.0[offset..offset + size]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, o) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", o)?;
        }
        write!(f, ")")
    }
}
