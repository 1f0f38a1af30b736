use super::topology::{Topology, TopologyError};
use nalgebra::{Isometry3, Point3};
use std::sync::Arc;

/// One sampled conformation: a coordinate for every point of its topology plus the pose of
/// every rigid body.
///
/// Frames are values. Nothing mutates a frame held by a store; superposition produces a
/// new frame through [`Frame::transformed`].
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    topology: Arc<Topology>,
    positions: Vec<Point3<f64>>,
    body_poses: Vec<Isometry3<f64>>,
}

impl Frame {
    /// Creates a frame whose rigid bodies all sit at the identity pose.
    pub fn new(
        topology: Arc<Topology>,
        positions: Vec<Point3<f64>>,
    ) -> Result<Self, TopologyError> {
        let body_poses = vec![Isometry3::identity(); topology.rigid_bodies().len()];
        Self::with_body_poses(topology, positions, body_poses)
    }

    pub fn with_body_poses(
        topology: Arc<Topology>,
        positions: Vec<Point3<f64>>,
        body_poses: Vec<Isometry3<f64>>,
    ) -> Result<Self, TopologyError> {
        if positions.len() != topology.len() {
            return Err(TopologyError::CoordinateCountMismatch {
                expected: topology.len(),
                found: positions.len(),
            });
        }
        if body_poses.len() != topology.rigid_bodies().len() {
            return Err(TopologyError::PoseCountMismatch {
                expected: topology.rigid_bodies().len(),
                found: body_poses.len(),
            });
        }
        Ok(Self {
            topology,
            positions,
            body_poses,
        })
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn position(&self, index: usize) -> Option<&Point3<f64>> {
        self.positions.get(index)
    }

    pub fn body_poses(&self) -> &[Isometry3<f64>] {
        &self.body_poses
    }

    /// Collects the coordinates of `indices`, in order.
    ///
    /// Returns `None` if any index lies outside the frame.
    pub fn gather(&self, indices: &[usize]) -> Option<Vec<Point3<f64>>> {
        indices
            .iter()
            .map(|&index| self.positions.get(index).copied())
            .collect()
    }

    /// Returns a copy of this frame moved by `transform`.
    ///
    /// Each rigid body moves as one unit: its pose is composed with the transform and its
    /// members follow. Points that belong to no body are moved individually.
    pub fn transformed(&self, transform: &Isometry3<f64>) -> Frame {
        let mut moved = self.clone();
        moved.apply(transform);
        moved
    }

    fn apply(&mut self, transform: &Isometry3<f64>) {
        for (body, pose) in self
            .topology
            .rigid_bodies()
            .iter()
            .zip(self.body_poses.iter_mut())
        {
            *pose = transform * *pose;
            for &member in body.members() {
                self.positions[member] = transform * self.positions[member];
            }
        }

        for index in self.topology.flexible_points() {
            self.positions[index] = transform * self.positions[index];
        }
    }
}
