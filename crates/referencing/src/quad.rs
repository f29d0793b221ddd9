//! A quad-tree discrete global grid.
//!
//! The extent of the base CRS is split in four quadrants at every level.
//! Zone identifiers are `Q` followed by one quadrant digit per level
//! (`0` north-west, `1` north-east, `2` south-west, `3` south-east), so a
//! zone's parent is its identifier without the last digit.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::bbox::BoundingBox;
use crate::crs::Crs;
use crate::dggs::{DiscreteGlobalGrid, Zone, ZoneCoder, ZoneId};
use crate::error::{ReferencingError, Result};

const PREFIX: char = 'Q';

/// Deepest level representable without overflowing cell indices.
pub const MAX_LEVEL: u8 = 30;

/// Quad-tree DGGS over a rectangular extent of a horizontal CRS.
#[derive(Debug, Clone)]
pub struct QuadGrid {
    name: String,
    base_crs: Arc<Crs>,
    extent: BoundingBox,
    levels: RangeInclusive<u8>,
    valid_areas: BTreeMap<u8, BoundingBox>,
}

impl QuadGrid {
    pub fn new(
        name: impl Into<String>,
        base_crs: Arc<Crs>,
        extent: BoundingBox,
        levels: RangeInclusive<u8>,
    ) -> Self {
        let levels = (*levels.start()).min(MAX_LEVEL)..=(*levels.end()).min(MAX_LEVEL);
        Self {
            name: name.into(),
            base_crs,
            extent,
            levels,
            valid_areas: BTreeMap::new(),
        }
    }

    /// Whole-world grid on WGS84 with levels `0..=max_level`.
    pub fn global(max_level: u8) -> Self {
        Self::new(
            "quad-wgs84",
            Arc::new(Crs::wgs84()),
            BoundingBox::world(),
            0..=max_level,
        )
    }

    /// Limit the area where positions can be encoded at `level`.
    pub fn restrict_level(mut self, level: u8, area: BoundingBox) -> Self {
        self.valid_areas.insert(level, area);
        self
    }

    pub fn extent(&self) -> &BoundingBox {
        &self.extent
    }

    /// Identifier of the zone at (`col`, `row`) of `level`, rows counted from the top.
    pub fn zone_id(&self, level: u8, col: u64, row: u64) -> ZoneId {
        let mut id = String::with_capacity(level as usize + 1);
        id.push(PREFIX);
        for i in (0..level).rev() {
            let digit = ((col >> i) & 1) + 2 * ((row >> i) & 1);
            id.push(char::from(b'0' + digit as u8));
        }
        ZoneId::new(id)
    }

    /// Parent zone, `None` for the root.
    pub fn parent(&self, zone: &ZoneId) -> Option<ZoneId> {
        let id = zone.as_str();
        let (last, _) = id.char_indices().last()?;
        if last == 0 {
            return None;
        }
        Some(ZoneId::new(&id[..last]))
    }

    /// The four children of a zone, in quadrant order.
    pub fn children(&self, zone: &ZoneId) -> Result<Vec<ZoneId>> {
        let (level, _, _) = self.parse(zone)?;
        if level >= *self.levels.end() {
            return Err(ReferencingError::InvalidLevel {
                level: level + 1,
                min: *self.levels.start(),
                max: *self.levels.end(),
            });
        }
        Ok((0..4)
            .map(|digit| ZoneId::new(format!("{}{}", zone.as_str(), digit)))
            .collect())
    }

    fn cells(level: u8) -> u64 {
        1u64 << level
    }

    /// Inclusive column and row ranges of the zones of `level` touching `bbox`.
    fn span(&self, bbox: &BoundingBox, level: u8) -> Result<Option<(u64, u64, u64, u64)>> {
        self.check_level(level)?;
        let e = &self.extent;
        if bbox.max_x < e.min_x || bbox.min_x > e.max_x || bbox.max_y < e.min_y || bbox.min_y > e.max_y
        {
            return Ok(None);
        }

        let n = Self::cells(level);
        let zw = e.width() / n as f64;
        let zh = e.height() / n as f64;
        let last = (n - 1) as f64;

        let c0 = ((bbox.min_x.max(e.min_x) - e.min_x) / zw).floor().clamp(0.0, last) as u64;
        let c1 = (((bbox.max_x.min(e.max_x) - e.min_x) / zw).ceil() - 1.0).clamp(c0 as f64, last) as u64;
        let r0 = ((e.max_y - bbox.max_y.min(e.max_y)) / zh).floor().clamp(0.0, last) as u64;
        let r1 = (((e.max_y - bbox.min_y.max(e.min_y)) / zh).ceil() - 1.0).clamp(r0 as f64, last) as u64;
        Ok(Some((c0, c1, r0, r1)))
    }

    fn check_level(&self, level: u8) -> Result<()> {
        if self.levels.contains(&level) {
            Ok(())
        } else {
            Err(ReferencingError::InvalidLevel {
                level,
                min: *self.levels.start(),
                max: *self.levels.end(),
            })
        }
    }

    fn parse(&self, zone: &ZoneId) -> Result<(u8, u64, u64)> {
        let id = zone.as_str();
        let mut chars = id.chars();
        if chars.next() != Some(PREFIX) {
            return Err(ReferencingError::InvalidZone(id.to_string()));
        }
        let digits = &id[1..];
        if digits.len() > MAX_LEVEL as usize {
            return Err(ReferencingError::InvalidZone(id.to_string()));
        }
        let mut col = 0u64;
        let mut row = 0u64;
        for c in digits.chars() {
            let digit = c
                .to_digit(4)
                .ok_or_else(|| ReferencingError::InvalidZone(id.to_string()))?
                as u64;
            col = (col << 1) | (digit & 1);
            row = (row << 1) | (digit >> 1);
        }
        Ok((digits.len() as u8, col, row))
    }

    fn zone_bbox(&self, level: u8, col: u64, row: u64) -> BoundingBox {
        let n = Self::cells(level) as f64;
        let zw = self.extent.width() / n;
        let zh = self.extent.height() / n;
        let min_x = self.extent.min_x + col as f64 * zw;
        let max_y = self.extent.max_y - row as f64 * zh;
        BoundingBox::new(min_x, max_y - zh, min_x + zw, max_y)
    }

    fn encode_at(&self, level: u8, position: &[f64]) -> Result<ZoneId> {
        ReferencingError::check_dimension(2, position.len())?;
        let (x, y) = (position[0], position[1]);
        let inside = self.extent.contains_point(x, y)
            && self
                .valid_areas
                .get(&level)
                .map_or(true, |area| area.contains_point(x, y));
        if !inside {
            return Err(ReferencingError::OutsideValidArea {
                dggs: self.name.clone(),
                level,
                position: position.to_vec(),
            });
        }

        let n = Self::cells(level);
        let fx = (x - self.extent.min_x) / self.extent.width();
        let fy = (self.extent.max_y - y) / self.extent.height();
        let col = ((fx * n as f64).floor() as u64).min(n - 1);
        let row = ((fy * n as f64).floor() as u64).min(n - 1);
        Ok(self.zone_id(level, col, row))
    }
}

impl DiscreteGlobalGrid for QuadGrid {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_crs(&self) -> Arc<Crs> {
        Arc::clone(&self.base_crs)
    }

    fn refinement_levels(&self) -> RangeInclusive<u8> {
        self.levels.clone()
    }

    fn create_coder(&self) -> Box<dyn ZoneCoder> {
        Box::new(QuadCoder {
            grid: self.clone(),
            level: *self.levels.start(),
        })
    }

    fn zones_within(&self, bbox: &BoundingBox, level: u8) -> Result<Vec<ZoneId>> {
        let Some((c0, c1, r0, r1)) = self.span(bbox, level)? else {
            return Ok(Vec::new());
        };
        let mut zones = Vec::new();
        for row in r0..=r1 {
            for col in c0..=c1 {
                zones.push(self.zone_id(level, col, row));
            }
        }
        Ok(zones)
    }

    fn zone_count(&self, bbox: &BoundingBox, level: u8) -> Result<u64> {
        Ok(self
            .span(bbox, level)?
            .map(|(c0, c1, r0, r1)| (c1 - c0 + 1).saturating_mul(r1 - r0 + 1))
            .unwrap_or(0))
    }

    fn zone_size(&self, level: u8) -> f64 {
        self.extent.width().max(self.extent.height()) / Self::cells(level) as f64
    }
}

/// Coder for a [`QuadGrid`].
#[derive(Debug, Clone)]
pub struct QuadCoder {
    grid: QuadGrid,
    level: u8,
}

impl ZoneCoder for QuadCoder {
    fn precision(&self) -> u8 {
        self.level
    }

    fn set_precision(&mut self, level: u8) -> Result<()> {
        self.grid.check_level(level)?;
        self.level = level;
        Ok(())
    }

    fn encode(&self, position: &[f64]) -> Result<ZoneId> {
        self.grid.encode_at(self.level, position)
    }

    fn decode(&self, zone: &ZoneId) -> Result<Zone> {
        let (level, col, row) = self.grid.parse(zone)?;
        self.grid.check_level(level)?;
        Ok(Zone {
            id: zone.clone(),
            level,
            bbox: self.grid.zone_bbox(level, col, row),
        })
    }
}
