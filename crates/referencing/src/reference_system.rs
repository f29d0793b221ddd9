//! Compound reference systems mixing continuous CRS and DGGS components.

use std::fmt;
use std::sync::Arc;

use crate::crs::{same_crs, Crs};
use crate::dggs::DiscreteGlobalGrid;

/// One single component of a compound reference system.
#[derive(Clone)]
pub enum ReferenceComponent {
    /// A continuous CRS with one axis per dimension.
    Crs(Arc<Crs>),
    /// A DGGS occupying a single "zone" dimension.
    Dggs(Arc<dyn DiscreteGlobalGrid>),
}

impl ReferenceComponent {
    pub fn dimension(&self) -> usize {
        match self {
            ReferenceComponent::Crs(crs) => crs.dimension(),
            ReferenceComponent::Dggs(_) => 1,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ReferenceComponent::Crs(crs) => crs.name(),
            ReferenceComponent::Dggs(dggs) => dggs.name(),
        }
    }

    pub fn is_dggs(&self) -> bool {
        matches!(self, ReferenceComponent::Dggs(_))
    }

    pub fn is_horizontal(&self) -> bool {
        match self {
            ReferenceComponent::Crs(crs) => crs.is_horizontal(),
            ReferenceComponent::Dggs(_) => true,
        }
    }

    /// The continuous CRS equivalent: the CRS itself, or the DGGS base CRS.
    pub fn coordinate_crs(&self) -> Arc<Crs> {
        match self {
            ReferenceComponent::Crs(crs) => Arc::clone(crs),
            ReferenceComponent::Dggs(dggs) => dggs.base_crs(),
        }
    }

    pub fn as_dggs(&self) -> Option<&Arc<dyn DiscreteGlobalGrid>> {
        match self {
            ReferenceComponent::Dggs(dggs) => Some(dggs),
            ReferenceComponent::Crs(_) => None,
        }
    }

    pub fn as_crs(&self) -> Option<&Arc<Crs>> {
        match self {
            ReferenceComponent::Crs(crs) => Some(crs),
            ReferenceComponent::Dggs(_) => None,
        }
    }

    /// Identity comparison; DGGS components compare by instance or name.
    pub fn same_as(&self, other: &ReferenceComponent) -> bool {
        match (self, other) {
            (ReferenceComponent::Crs(a), ReferenceComponent::Crs(b)) => same_crs(a, b),
            (ReferenceComponent::Dggs(a), ReferenceComponent::Dggs(b)) => {
                Arc::ptr_eq(a, b) || a.name() == b.name()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for ReferenceComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceComponent::Crs(crs) => write!(f, "Crs({})", crs.name()),
            ReferenceComponent::Dggs(dggs) => write!(f, "Dggs({})", dggs.name()),
        }
    }
}

impl From<Arc<Crs>> for ReferenceComponent {
    fn from(crs: Arc<Crs>) -> Self {
        ReferenceComponent::Crs(crs)
    }
}

/// An ordered list of single reference system components.
#[derive(Clone, Debug)]
pub struct ReferenceSystem {
    components: Vec<ReferenceComponent>,
}

impl ReferenceSystem {
    pub fn new(components: Vec<ReferenceComponent>) -> Self {
        Self { components }
    }

    pub fn single(component: ReferenceComponent) -> Self {
        Self::new(vec![component])
    }

    /// Decompose a continuous CRS into one component per single CRS.
    pub fn from_crs(crs: &Arc<Crs>) -> Self {
        Self::new(crs.components().into_iter().map(ReferenceComponent::Crs).collect())
    }

    pub fn components(&self) -> &[ReferenceComponent] {
        &self.components
    }

    pub fn component(&self, index: usize) -> Option<&ReferenceComponent> {
        self.components.get(index)
    }

    /// Total number of dimensions.
    pub fn dimension(&self) -> usize {
        self.components.iter().map(|c| c.dimension()).sum()
    }

    /// First dimension of the component at `index`.
    pub fn dimension_offset(&self, index: usize) -> usize {
        self.components[..index].iter().map(|c| c.dimension()).sum()
    }

    /// Index of the component equal to `component`.
    pub fn index_of(&self, component: &ReferenceComponent) -> Option<usize> {
        self.components.iter().position(|c| c.same_as(component))
    }

    /// Index of the DGGS component, if any.
    pub fn dggs_index(&self) -> Option<usize> {
        self.components.iter().position(|c| c.is_dggs())
    }

    pub fn dggs_count(&self) -> usize {
        self.components.iter().filter(|c| c.is_dggs()).count()
    }

    /// Concatenate with another reference system.
    pub fn concat(&self, other: &ReferenceSystem) -> ReferenceSystem {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        ReferenceSystem { components }
    }

    /// The continuous CRS equivalent, with DGGS components replaced by their base CRS.
    pub fn coordinate_crs(&self) -> Arc<Crs> {
        let parts: Vec<Arc<Crs>> = self.components.iter().map(|c| c.coordinate_crs()).collect();
        if parts.len() == 1 {
            return Arc::clone(&parts[0]);
        }
        let name = parts
            .iter()
            .map(|c| c.name().to_string())
            .collect::<Vec<_>>()
            .join(" + ");
        Arc::new(Crs::compound(name, parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quad::QuadGrid;

    fn dggs_with_height() -> ReferenceSystem {
        let dggs: Arc<dyn DiscreteGlobalGrid> = Arc::new(QuadGrid::global(4));
        ReferenceSystem::new(vec![
            ReferenceComponent::Dggs(dggs),
            ReferenceComponent::Crs(Arc::new(Crs::vertical("height", 1.0))),
        ])
    }

    #[test]
    fn test_dimensions_and_offsets() {
        let rs = dggs_with_height();
        assert_eq!(rs.dimension(), 2);
        assert_eq!(rs.dimension_offset(1), 1);
        assert_eq!(rs.dggs_index(), Some(0));
        assert_eq!(rs.dggs_count(), 1);
    }

    #[test]
    fn test_coordinate_crs_substitutes_base() {
        let rs = dggs_with_height();
        let crs = rs.coordinate_crs();
        assert_eq!(crs.dimension(), 3);
        assert!(crs.components()[0].is_horizontal());
    }

    #[test]
    fn test_index_of() {
        let rs = dggs_with_height();
        let height = ReferenceComponent::Crs(Arc::new(Crs::vertical("height", 1.0)));
        let time = ReferenceComponent::Crs(Arc::new(Crs::unix_hours()));
        assert_eq!(rs.index_of(&height), Some(1));
        assert_eq!(rs.index_of(&time), None);
    }
}
