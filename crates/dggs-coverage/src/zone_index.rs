//! Zone identifier to grid slot mapping.

use std::collections::HashMap;

use referencing::ZoneId;

use crate::error::{CoverageError, Result};

/// Dense list of zones plus the reverse lookup `zone -> slot`.
///
/// Built once per coverage and never mutated.
#[derive(Debug, Clone, Default)]
pub struct ZoneIndex {
    zones: Vec<ZoneId>,
    slots: HashMap<ZoneId, usize>,
}

impl ZoneIndex {
    /// Index the zones in list order. A zone listed twice is an error.
    pub fn new(zones: Vec<ZoneId>) -> Result<Self> {
        let mut slots = HashMap::with_capacity(zones.len());
        for (slot, zone) in zones.iter().enumerate() {
            if slots.insert(zone.clone(), slot).is_some() {
                return Err(CoverageError::DuplicateZone(zone.to_string()));
            }
        }
        Ok(Self { zones, slots })
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn get(&self, zone: &ZoneId) -> Option<usize> {
        self.slots.get(zone).copied()
    }

    pub fn zone(&self, slot: usize) -> Option<&ZoneId> {
        self.zones.get(slot)
    }

    pub fn zones(&self) -> &[ZoneId] {
        &self.zones
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bijection() {
        let zones: Vec<ZoneId> = ["Q0", "Q1", "Q2", "Q3"].iter().map(|z| ZoneId::from(*z)).collect();
        let index = ZoneIndex::new(zones.clone()).unwrap();
        for (i, z) in zones.iter().enumerate() {
            assert_eq!(index.get(z), Some(i));
            assert_eq!(index.zone(i), Some(z));
        }
        assert_eq!(index.get(&ZoneId::from("Q00")), None);
    }

    #[test]
    fn test_duplicate_rejected() {
        let zones = vec![ZoneId::from("Q0"), ZoneId::from("Q0")];
        assert!(matches!(
            ZoneIndex::new(zones),
            Err(CoverageError::DuplicateZone(_))
        ));
    }
}
