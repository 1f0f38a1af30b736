use super::topology::PointInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An inclusive range of residue indices.
///
/// Coarse-grained beads cover several consecutive residues, so every point carries a
/// range rather than a single index; an atomic point simply has `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResidueRange {
    pub start: i32,
    pub end: i32,
}

impl ResidueRange {
    /// Creates a range, swapping the bounds if they are given in reverse order.
    pub fn new(start: i32, end: i32) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn single(residue: i32) -> Self {
        Self {
            start: residue,
            end: residue,
        }
    }

    pub fn contains(&self, residue: i32) -> bool {
        self.start <= residue && residue <= self.end
    }

    pub fn overlaps(&self, other: &ResidueRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> {
        self.start..=self.end
    }
}

impl fmt::Display for ResidueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Explicit selection criteria over the points of a topology.
///
/// Every criterion is optional and `None` means "match all", so
/// `SelectionQuery::default()` selects every point. A point matches when it satisfies all
/// criteria that are set; for residues it is enough that the point's residue range
/// overlaps the requested one.
///
/// An empty selection result is a valid outcome, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionQuery {
    pub molecule: Option<String>,
    pub residues: Option<ResidueRange>,
    pub copy_index: Option<usize>,
    pub state_index: Option<usize>,
    pub resolution: Option<u32>,
}

impl SelectionQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn molecule(name: impl Into<String>) -> Self {
        Self {
            molecule: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_molecule(mut self, name: impl Into<String>) -> Self {
        self.molecule = Some(name.into());
        self
    }

    pub fn with_residues(mut self, range: ResidueRange) -> Self {
        self.residues = Some(range);
        self
    }

    pub fn with_copy(mut self, copy_index: usize) -> Self {
        self.copy_index = Some(copy_index);
        self
    }

    pub fn with_state(mut self, state_index: usize) -> Self {
        self.state_index = Some(state_index);
        self
    }

    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Returns `true` if the point satisfies every criterion that is set.
    pub fn matches(&self, point: &PointInfo) -> bool {
        self.molecule
            .as_deref()
            .is_none_or(|name| name == point.molecule)
            && self
                .residues
                .is_none_or(|range| range.overlaps(&point.residues))
            && self.copy_index.is_none_or(|copy| copy == point.copy_index)
            && self
                .state_index
                .is_none_or(|state| state == point.state_index)
            && self
                .resolution
                .is_none_or(|resolution| resolution == point.resolution)
    }
}
