use super::selection::{ResidueRange, SelectionQuery};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Point index {index} is out of range for a topology of {len} point(s)")]
    PointOutOfRange { index: usize, len: usize },

    #[error("Point {point} already belongs to rigid body '{body}'")]
    PointAlreadyInBody { point: usize, body: String },

    #[error("Rigid body '{name}' has no members")]
    EmptyRigidBody { name: String },

    #[error("Frame provides {found} coordinate(s), but the topology defines {expected} point(s)")]
    CoordinateCountMismatch { expected: usize, found: usize },

    #[error("Frame provides {found} rigid-body pose(s), but the topology defines {expected} body(ies)")]
    PoseCountMismatch { expected: usize, found: usize },
}

/// Metadata of one point (atom or coarse-grained bead) in the represented assembly.
///
/// The point's coordinates live in each [`Frame`](super::frame::Frame); the topology only
/// records what the point is and where it belongs.
#[derive(Debug, Clone, PartialEq)]
pub struct PointInfo {
    pub molecule: String,     // Molecule (sequence) name shared by all interchangeable copies
    pub copy_index: usize,    // Which copy of the molecule this point belongs to
    pub state_index: usize,   // Multi-state models keep each state's copies apart
    pub residues: ResidueRange, // Residues covered by this point
    pub resolution: u32,      // Representation resolution (residues per bead)
    pub(crate) rigid_body: Option<usize>,
}

impl PointInfo {
    pub fn new(
        molecule: impl Into<String>,
        copy_index: usize,
        state_index: usize,
        residues: ResidueRange,
    ) -> Self {
        Self {
            molecule: molecule.into(),
            copy_index,
            state_index,
            residues,
            resolution: 1,
            rigid_body: None,
        }
    }

    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }

    /// Index of the rigid body that owns this point, if any.
    pub fn rigid_body(&self) -> Option<usize> {
        self.rigid_body
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigidBody {
    pub name: String,
    pub(crate) members: Vec<usize>,
}

impl RigidBody {
    pub fn members(&self) -> &[usize] {
        &self.members
    }
}

/// The static description of every point in the assembly, shared by all frames.
///
/// Points are addressed by their position in the topology; a frame stores one coordinate
/// per point in the same order. Rigid bodies group points that move as a single unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    points: Vec<PointInfo>,
    rigid_bodies: Vec<RigidBody>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a point and returns its index.
    pub fn add_point(&mut self, mut point: PointInfo) -> usize {
        point.rigid_body = None;
        self.points.push(point);
        self.points.len() - 1
    }

    /// Declares a rigid body over existing points and returns the body index.
    ///
    /// # Errors
    ///
    /// Fails if a member index does not exist, if a member already belongs to another
    /// body, or if `members` is empty.
    pub fn add_rigid_body(
        &mut self,
        name: impl Into<String>,
        members: Vec<usize>,
    ) -> Result<usize, TopologyError> {
        let name = name.into();
        if members.is_empty() {
            return Err(TopologyError::EmptyRigidBody { name });
        }
        for &member in &members {
            let point = self
                .points
                .get(member)
                .ok_or(TopologyError::PointOutOfRange {
                    index: member,
                    len: self.points.len(),
                })?;
            if let Some(body) = point.rigid_body {
                return Err(TopologyError::PointAlreadyInBody {
                    point: member,
                    body: self.rigid_bodies[body].name.clone(),
                });
            }
        }

        let body_index = self.rigid_bodies.len();
        for &member in &members {
            self.points[member].rigid_body = Some(body_index);
        }
        self.rigid_bodies.push(RigidBody { name, members });
        Ok(body_index)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> Option<&PointInfo> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[PointInfo] {
        &self.points
    }

    pub fn rigid_bodies(&self) -> &[RigidBody] {
        &self.rigid_bodies
    }

    pub fn rigid_body_of(&self, point: usize) -> Option<&RigidBody> {
        self.points
            .get(point)
            .and_then(|info| info.rigid_body)
            .map(|body| &self.rigid_bodies[body])
    }

    /// Indices of points not owned by any rigid body.
    pub fn flexible_points(&self) -> impl Iterator<Item = usize> + '_ {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, info)| info.rigid_body.is_none())
            .map(|(index, _)| index)
    }

    /// Returns the indices of all points matching `query`, in topology order.
    pub fn select(&self, query: &SelectionQuery) -> Vec<usize> {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, info)| query.matches(info))
            .map(|(index, _)| index)
            .collect()
    }

    /// Distinct molecule names, sorted.
    pub fn molecule_names(&self) -> Vec<&str> {
        self.points
            .iter()
            .map(|info| info.molecule.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct state indices in which `molecule` appears, sorted.
    pub fn states_of(&self, molecule: &str) -> Vec<usize> {
        self.points
            .iter()
            .filter(|info| info.molecule == molecule)
            .map(|info| info.state_index)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct copy indices of `molecule` in `state`, sorted.
    pub fn copy_indices(&self, molecule: &str, state: usize) -> Vec<usize> {
        self.points
            .iter()
            .filter(|info| info.molecule == molecule && info.state_index == state)
            .map(|info| info.copy_index)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
