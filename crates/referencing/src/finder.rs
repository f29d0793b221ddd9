//! Lookup of coordinate operations between reference systems.

use std::sync::Arc;

use tracing::trace;

use crate::crs::{same_crs, Crs, CrsKind};
use crate::error::{ReferencingError, Result};
use crate::operation::{
    AxisSelection, Concatenated, Identity, LinearOperation, OperationRef, ProjectionDirection,
    ProjectionOperation, Stacked,
};

/// Finds the coordinate operation converting positions from one CRS to another.
pub trait OperationFinder: Send + Sync {
    fn find_operation(&self, source: &Arc<Crs>, target: &Arc<Crs>) -> Result<OperationRef>;
}

/// Operation finder knowing the relations between the CRS kinds of this crate.
///
/// - equal systems: identity
/// - geographic and projected systems: through geographic coordinates
/// - vertical systems: unit conversion
/// - temporal systems: epoch and unit conversion
/// - compound target: one operation per target component, stacked
/// - compound source: the first source component that converts to the target
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultOperationFinder;

impl DefaultOperationFinder {
    pub fn new() -> Self {
        Self
    }

    fn single_operation(&self, source: &Arc<Crs>, target: &Arc<Crs>) -> Result<OperationRef> {
        match (source.kind(), target.kind()) {
            (_, _) if source.is_horizontal() && target.is_horizontal() => {
                let mut steps: Vec<OperationRef> = Vec::with_capacity(2);
                if let CrsKind::Projected(p) = source.kind() {
                    steps.push(Arc::new(ProjectionOperation::new(
                        p.clone(),
                        ProjectionDirection::Inverse,
                    )));
                }
                if let CrsKind::Projected(p) = target.kind() {
                    steps.push(Arc::new(ProjectionOperation::new(
                        p.clone(),
                        ProjectionDirection::Forward,
                    )));
                }
                match steps.len() {
                    0 => Ok(Arc::new(Identity::new(2))),
                    1 => Ok(steps.remove(0)),
                    _ => Ok(Arc::new(Concatenated::new(steps)?)),
                }
            }
            (
                CrsKind::Vertical { unit_meters: from },
                CrsKind::Vertical { unit_meters: to },
            ) => Ok(Arc::new(LinearOperation::new(vec![from / to], vec![0.0]))),
            (
                CrsKind::Temporal {
                    origin: from_origin,
                    unit_seconds: from_unit,
                },
                CrsKind::Temporal {
                    origin: to_origin,
                    unit_seconds: to_unit,
                },
            ) => {
                let shift_seconds = (*from_origin - *to_origin).num_milliseconds() as f64 / 1000.0;
                Ok(Arc::new(LinearOperation::new(
                    vec![from_unit / to_unit],
                    vec![shift_seconds / to_unit],
                )))
            }
            _ => Err(ReferencingError::no_operation(source.name(), target.name())),
        }
    }
}

impl OperationFinder for DefaultOperationFinder {
    fn find_operation(&self, source: &Arc<Crs>, target: &Arc<Crs>) -> Result<OperationRef> {
        if same_crs(source, target) {
            return Ok(Arc::new(Identity::new(source.dimension())));
        }

        if target.is_compound() {
            let parts = target
                .components()
                .iter()
                .map(|component| self.find_operation(source, component))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Arc::new(Stacked::new(source.dimension(), parts)?));
        }

        if source.is_compound() {
            let mut offset = 0;
            for component in source.components() {
                let dimension = component.dimension();
                if let Ok(op) = self.find_operation(&component, target) {
                    let select: OperationRef =
                        Arc::new(AxisSelection::range(source.dimension(), offset, dimension));
                    return Ok(Arc::new(Concatenated::new(vec![select, op])?));
                }
                offset += dimension;
            }
            trace!(source = %source, target = %target, "no source component converts to target");
            return Err(ReferencingError::no_operation(source.name(), target.name()));
        }

        self.single_operation(source, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::crs::Projection;
    use crate::lambert::LambertConformal;

    fn finder() -> DefaultOperationFinder {
        DefaultOperationFinder::new()
    }

    #[test]
    fn test_identity_for_equal_crs() {
        let a = Arc::new(Crs::wgs84());
        let b = Arc::new(Crs::wgs84());
        let op = finder().find_operation(&a, &b).unwrap();
        assert_eq!(op.transform(&[10.0, 20.0]).unwrap(), vec![10.0, 20.0]);
    }

    #[test]
    fn test_projected_to_projected_through_geographic() {
        let mercator = Arc::new(Crs::web_mercator());
        let lambert = Arc::new(Crs::projected(
            "hrrr",
            Projection::LambertConformal(LambertConformal::hrrr()),
        ));
        let geographic = Arc::new(Crs::wgs84());

        let to_lambert = finder().find_operation(&geographic, &lambert).unwrap();
        let merc_to_lambert = finder().find_operation(&mercator, &lambert).unwrap();
        let to_mercator = finder().find_operation(&geographic, &mercator).unwrap();

        let direct = to_lambert.transform(&[-90.0, 35.0]).unwrap();
        let via = merc_to_lambert
            .transform(&to_mercator.transform(&[-90.0, 35.0]).unwrap())
            .unwrap();
        assert!((direct[0] - via[0]).abs() < 1e-3);
        assert!((direct[1] - via[1]).abs() < 1e-3);
    }

    #[test]
    fn test_temporal_epoch_shift() {
        let hours_1970 = Arc::new(Crs::unix_hours());
        let days_2000 = Arc::new(Crs::temporal(
            "days-2000",
            Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
            86400.0,
        ));
        let op = finder().find_operation(&days_2000, &hours_1970).unwrap();
        let out = op.transform(&[1.0]).unwrap();
        // 2000-01-02 is 262_992 hours after 1970-01-01
        assert!((out[0] - 262_992.0).abs() < 1e-6);
    }

    #[test]
    fn test_vertical_unit_change() {
        let feet = Arc::new(Crs::vertical("feet", 0.3048));
        let meters = Arc::new(Crs::vertical("meters", 1.0));
        let op = finder().find_operation(&feet, &meters).unwrap();
        assert!((op.transform(&[1000.0]).unwrap()[0] - 304.8).abs() < 1e-9);
    }

    #[test]
    fn test_compound_source_selects_component() {
        let horizontal = Arc::new(Crs::wgs84());
        let vertical = Arc::new(Crs::vertical("height", 1.0));
        let compound = Arc::new(Crs::compound("3d", vec![horizontal, vertical.clone()]));

        let op = finder().find_operation(&compound, &vertical).unwrap();
        assert_eq!(op.transform(&[5.0, 6.0, 7.0]).unwrap(), vec![7.0]);
    }

    #[test]
    fn test_compound_target_stacks_components() {
        let horizontal = Arc::new(Crs::wgs84());
        let vertical = Arc::new(Crs::vertical("height", 1.0));
        let source = Arc::new(Crs::compound("hv", vec![horizontal.clone(), vertical.clone()]));
        let target = Arc::new(Crs::compound("vh", vec![vertical, horizontal]));

        let op = finder().find_operation(&source, &target).unwrap();
        assert_eq!(op.transform(&[1.0, 2.0, 3.0]).unwrap(), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_unrelated_systems_report_no_operation() {
        let vertical = Arc::new(Crs::vertical("height", 1.0));
        let time = Arc::new(Crs::unix_hours());
        let err = finder().find_operation(&vertical, &time).unwrap_err();
        assert!(matches!(err, ReferencingError::NoOperationFound { .. }));
    }
}
