use super::config::AlignmentPolicy;
use super::error::EngineError;
use crate::core::models::frame::Frame;
use crate::core::models::selection::SelectionQuery;
use crate::core::models::topology::Topology;
use crate::core::utils::geometry::superposition;
use std::borrow::Cow;
use std::collections::BTreeSet;
use tracing::debug;

const MIN_ALIGNMENT_POINTS: usize = 3;
const ALIGNMENT_GROUP: &str = "alignment";

/// Superposes frames onto each other over a fixed selection of points.
#[derive(Debug, Clone)]
pub struct AlignmentEngine {
    policy: AlignmentPolicy,
    points: Vec<usize>,
}

impl AlignmentEngine {
    /// Resolves the alignment selection against `topology`.
    ///
    /// # Errors
    ///
    /// When alignment is enabled, fails with [`EngineError::DataIntegrity`] if the
    /// selection contains fewer than three points, since no rotation is determined then.
    pub fn new(
        topology: &Topology,
        policy: AlignmentPolicy,
        components: &[SelectionQuery],
    ) -> Result<Self, EngineError> {
        if !policy.is_enabled() {
            return Ok(Self::disabled());
        }

        let points: Vec<usize> = components
            .iter()
            .flat_map(|query| topology.select(query))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if points.len() < MIN_ALIGNMENT_POINTS {
            return Err(EngineError::data_integrity(
                ALIGNMENT_GROUP,
                &[],
                format!(
                    "alignment selection has {} point(s), at least {MIN_ALIGNMENT_POINTS} are required",
                    points.len()
                ),
            ));
        }
        debug!(points = points.len(), "Alignment selection resolved.");

        Ok(Self { policy, points })
    }

    pub fn disabled() -> Self {
        Self {
            policy: AlignmentPolicy::Disabled,
            points: Vec::new(),
        }
    }

    pub fn policy(&self) -> AlignmentPolicy {
        self.policy
    }

    pub fn points(&self) -> &[usize] {
        &self.points
    }

    /// Returns `target` superposed onto `reference`.
    ///
    /// With alignment disabled the target is returned unchanged and borrowed. Otherwise
    /// the least-squares transform over the alignment points is applied to every body
    /// and flexible point of a copy of the target; neither input is modified.
    pub fn align<'f>(
        &self,
        (target_index, target): (usize, &'f Frame),
        (reference_index, reference): (usize, &Frame),
    ) -> Result<Cow<'f, Frame>, EngineError> {
        if !self.policy.is_enabled() {
            return Ok(Cow::Borrowed(target));
        }

        let frames = [reference_index, target_index];
        let missing = || {
            EngineError::data_integrity(
                ALIGNMENT_GROUP,
                &frames,
                "alignment selection references points missing from a frame",
            )
        };
        let reference_points = reference.gather(&self.points).ok_or_else(missing)?;
        let target_points = target.gather(&self.points).ok_or_else(missing)?;

        let transform = superposition(&reference_points, &target_points).ok_or_else(|| {
            EngineError::data_integrity(
                ALIGNMENT_GROUP,
                &frames,
                "superposition failed for the alignment selection",
            )
        })?;

        Ok(Cow::Owned(target.transformed(&transform)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::selection::ResidueRange;
    use crate::core::models::topology::PointInfo;
    use crate::core::utils::geometry::calculate_rmsd;
    use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
    use std::sync::Arc;

    fn topology() -> Arc<Topology> {
        let mut topology = Topology::new();
        for residue in 1..=4 {
            topology.add_point(PointInfo::new("A", 0, 0, ResidueRange::single(residue)));
        }
        topology.add_point(PointInfo::new("B", 0, 0, ResidueRange::single(1)));
        Arc::new(topology)
    }

    fn reference(topology: &Arc<Topology>) -> Frame {
        Frame::new(
            Arc::clone(topology),
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(3.0, 0.0, 0.0),
                Point3::new(0.0, 4.0, 0.0),
                Point3::new(0.0, 0.0, 5.0),
                Point3::new(2.0, 2.0, 2.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn disabled_alignment_borrows_target() {
        let topology = topology();
        let engine = AlignmentEngine::new(&topology, AlignmentPolicy::Disabled, &[]).unwrap();
        let frame = reference(&topology);
        let aligned = engine.align((1, &frame), (0, &frame)).unwrap();
        assert!(matches!(aligned, Cow::Borrowed(_)));
    }

    #[test]
    fn enabled_alignment_requires_three_points() {
        let topology = topology();
        let result = AlignmentEngine::new(
            &topology,
            AlignmentPolicy::Enabled,
            &[SelectionQuery::molecule("B")],
        );
        match result {
            Err(EngineError::DataIntegrity { group, .. }) => assert_eq!(group, "alignment"),
            other => panic!("expected a data integrity error, got {other:?}"),
        }
    }

    #[test]
    fn align_undoes_rigid_motion_of_whole_frame() {
        let topology = topology();
        let engine = AlignmentEngine::new(
            &topology,
            AlignmentPolicy::Enabled,
            &[SelectionQuery::molecule("A")],
        )
        .unwrap();
        let reference = reference(&topology);
        let motion = Isometry3::from_parts(
            Translation3::new(-3.0, 8.0, 1.0),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.7),
        );
        let target = reference.transformed(&motion);

        let aligned = engine.align((1, &target), (0, &reference)).unwrap();

        assert!(calculate_rmsd(reference.positions(), aligned.positions()).unwrap() < 1e-9);
        assert!(calculate_rmsd(reference.positions(), target.positions()).unwrap() > 1.0);
    }
}
