use super::error::EngineError;
use crate::core::models::frame::Frame;
use crate::core::models::selection::SelectionQuery;
use crate::core::models::topology::Topology;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Identifies a group of interchangeable copies: one molecule in one state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub molecule: String,
    pub state_index: usize,
}

impl GroupKey {
    pub fn new(molecule: impl Into<String>, state_index: usize) -> Self {
        Self {
            molecule: molecule.into(),
            state_index,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/state{}", self.molecule, self.state_index)
    }
}

/// The ordered copy selections of one molecule in one state.
///
/// `copies[c]` lists the selected points of the `c`-th copy (in ascending copy-index
/// order) in topology order. All copies select the same number of points, and the `k`-th
/// point of one copy corresponds to the `k`-th point of every other copy.
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeGroup {
    key: GroupKey,
    copy_indices: Vec<usize>,
    copies: Vec<Vec<usize>>,
    expected_copies: usize,
}

impl MoleculeGroup {
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    pub fn copy_count(&self) -> usize {
        self.copies.len()
    }

    /// Topology copy index of each copy slot.
    pub fn copy_indices(&self) -> &[usize] {
        &self.copy_indices
    }

    pub fn copies(&self) -> &[Vec<usize>] {
        &self.copies
    }

    pub fn copy(&self, slot: usize) -> Option<&[usize]> {
        self.copies.get(slot).map(Vec::as_slice)
    }

    pub fn points_per_copy(&self) -> usize {
        self.copies.first().map_or(0, Vec::len)
    }

    pub fn point_count(&self) -> usize {
        self.copy_count() * self.points_per_copy()
    }

    pub fn is_symmetric(&self) -> bool {
        self.copy_count() > 1
    }
}

/// Per molecule group, the copy selections compared by the distance. Built once per
/// topology and reused for every frame pair.
#[derive(Debug, Clone)]
pub struct SelectionIndex {
    topology: Arc<Topology>,
    groups: Vec<MoleculeGroup>,
}

impl SelectionIndex {
    /// Builds the index over the union of points matched by `components`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DataIntegrity`] if the copies of a group select different
    /// numbers of points, and [`EngineError::InvalidParameter`] if no point is selected.
    pub fn build(
        topology: &Arc<Topology>,
        components: &[SelectionQuery],
    ) -> Result<Self, EngineError> {
        let selected: BTreeSet<usize> = components
            .iter()
            .flat_map(|query| topology.select(query))
            .collect();
        if selected.is_empty() {
            return Err(EngineError::InvalidParameter {
                name: "rmsd_components",
                reason: "the selection matches no point of the topology".to_string(),
            });
        }

        let mut grouped: BTreeMap<GroupKey, BTreeMap<usize, Vec<usize>>> = BTreeMap::new();
        for index in selected {
            let Some(info) = topology.point(index) else {
                continue;
            };
            grouped
                .entry(GroupKey::new(info.molecule.clone(), info.state_index))
                .or_default()
                .entry(info.copy_index)
                .or_default()
                .push(index);
        }

        let mut groups = Vec::with_capacity(grouped.len());
        for (key, copies) in grouped {
            let expected_copies = topology.copy_indices(&key.molecule, key.state_index).len();
            let (copy_indices, copies): (Vec<_>, Vec<_>) = copies.into_iter().unzip();

            if let Some(first) = copies.first()
                && let Some((slot, mismatched)) = copies
                    .iter()
                    .enumerate()
                    .find(|(_, copy)| copy.len() != first.len())
            {
                return Err(EngineError::data_integrity(
                    key.to_string(),
                    &[],
                    format!(
                        "copy {} selects {} point(s), but copy {} selects {}",
                        copy_indices[slot],
                        mismatched.len(),
                        copy_indices[0],
                        first.len()
                    ),
                ));
            }

            if copies.len() < expected_copies {
                warn!(
                    group = %key,
                    selected = copies.len(),
                    total = expected_copies,
                    "Selection covers only part of the copies; unselected copies take no part in the assignment."
                );
            }
            debug!(
                group = %key,
                copies = copies.len(),
                points_per_copy = copies.first().map_or(0, Vec::len),
                "Registered molecule group."
            );

            groups.push(MoleculeGroup {
                key,
                copy_indices,
                copies,
                expected_copies,
            });
        }

        Ok(Self {
            topology: Arc::clone(topology),
            groups,
        })
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    pub fn groups(&self) -> &[MoleculeGroup] {
        &self.groups
    }

    pub fn group(&self, key: &GroupKey) -> Option<&MoleculeGroup> {
        self.groups.iter().find(|group| &group.key == key)
    }

    /// Total number of points compared by the distance.
    pub fn point_count(&self) -> usize {
        self.groups.iter().map(MoleculeGroup::point_count).sum()
    }

    /// Checks that `frame` is consistent with the index: every group must find the same
    /// number of copies in the frame's topology and every selected point must exist.
    pub fn validate_frame(&self, frame_index: usize, frame: &Frame) -> Result<(), EngineError> {
        let same_topology = Arc::ptr_eq(frame.topology(), &self.topology);

        for group in &self.groups {
            if !same_topology {
                let observed = frame
                    .topology()
                    .copy_indices(&group.key.molecule, group.key.state_index)
                    .len();
                if observed != group.expected_copies {
                    return Err(EngineError::data_integrity(
                        group.key.to_string(),
                        &[frame_index],
                        format!(
                            "frame has {observed} copies, expected {}",
                            group.expected_copies
                        ),
                    ));
                }
            }

            let len = frame.positions().len();
            if let Some(&missing) = group.copies.iter().flatten().find(|&&index| index >= len) {
                return Err(EngineError::data_integrity(
                    group.key.to_string(),
                    &[frame_index],
                    format!("selected point {missing} is missing from a frame of {len} point(s)"),
                ));
            }
        }
        Ok(())
    }
}
