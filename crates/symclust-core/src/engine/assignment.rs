use super::error::EngineError;
use super::selection_index::{GroupKey, MoleculeGroup, SelectionIndex};
use crate::core::models::frame::Frame;
use crate::core::utils::geometry::squared_deviation_sum;
use nalgebra::Point3;
use std::collections::BTreeMap;
use tracing::trace;

/// Copy correspondence between two frames, one permutation per molecule group.
///
/// For group `g`, `permutation(g)[c]` is the copy slot of the second frame matched to copy
/// slot `c` of the first frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    permutations: BTreeMap<GroupKey, Vec<usize>>,
}

impl Assignment {
    pub fn identity(index: &SelectionIndex) -> Self {
        Self {
            permutations: index
                .groups()
                .iter()
                .map(|group| (group.key().clone(), (0..group.copy_count()).collect()))
                .collect(),
        }
    }

    pub fn permutation(&self, key: &GroupKey) -> Option<&[usize]> {
        self.permutations.get(key).map(Vec::as_slice)
    }

    /// Copy slot of the second frame matched to `slot` of the first frame.
    pub fn target_copy(&self, key: &GroupKey, slot: usize) -> Option<usize> {
        self.permutations.get(key)?.get(slot).copied()
    }

    pub fn groups(&self) -> impl Iterator<Item = (&GroupKey, &[usize])> {
        self.permutations
            .iter()
            .map(|(key, permutation)| (key, permutation.as_slice()))
    }

    pub fn is_identity(&self) -> bool {
        self.permutations.values().all(|permutation| {
            permutation
                .iter()
                .enumerate()
                .all(|(slot, &target)| slot == target)
        })
    }

    /// The same correspondence seen from the second frame.
    pub fn inverse(&self) -> Self {
        Self {
            permutations: self
                .permutations
                .iter()
                .map(|(key, permutation)| {
                    let mut inverse = vec![0; permutation.len()];
                    for (slot, &target) in permutation.iter().enumerate() {
                        inverse[target] = slot;
                    }
                    (key.clone(), inverse)
                })
                .collect(),
        }
    }

    /// The copy selections of `group` in the second frame, reordered so that position
    /// `c` holds the copy matched to copy `c` of the first frame.
    ///
    /// The group itself is left untouched; the relabeling only exists in the returned view.
    pub fn reordered_copies<'g>(&self, group: &'g MoleculeGroup) -> Vec<&'g [usize]> {
        match self.permutation(group.key()) {
            Some(permutation) if permutation.len() == group.copy_count() => permutation
                .iter()
                .map(|&target| group.copies()[target].as_slice())
                .collect(),
            _ => group.copies().iter().map(Vec::as_slice).collect(),
        }
    }
}

/// Distance between two frames together with the assignment that achieves it.
#[derive(Debug, Clone, PartialEq)]
pub struct PairMetric {
    pub distance: f64,
    pub assignment: Assignment,
}

/// Finds, for a pair of frames, the copy permutation of every group that minimizes the
/// total squared deviation, and the resulting RMSD over all indexed points.
pub struct AssignmentSolver<'a> {
    index: &'a SelectionIndex,
}

impl<'a> AssignmentSolver<'a> {
    pub fn new(index: &'a SelectionIndex) -> Self {
        Self { index }
    }

    /// Solves the assignment of `second` onto `first`.
    ///
    /// Each group's permutations are explored in lexicographic order and a branch is
    /// abandoned as soon as its partial sum reaches the best complete sum found so far,
    /// so the first minimizer in enumeration order wins ties.
    pub fn solve(
        &self,
        (first_index, first): (usize, &Frame),
        (second_index, second): (usize, &Frame),
    ) -> Result<PairMetric, EngineError> {
        self.index.validate_frame(first_index, first)?;
        self.index.validate_frame(second_index, second)?;
        let frames = [first_index, second_index];

        let mut total_sum = 0.0;
        let mut permutations = BTreeMap::new();
        for group in self.index.groups() {
            let first_copies = gather_copies(group, first, first_index)?;
            let second_copies = gather_copies(group, second, second_index)?;

            let costs = first_copies
                .iter()
                .map(|a| {
                    second_copies
                        .iter()
                        .map(|b| squared_deviation_sum(a, b).unwrap_or(f64::NAN))
                        .collect()
                })
                .collect::<Vec<Vec<f64>>>();

            let (permutation, sum) = best_permutation(&costs).ok_or_else(|| {
                EngineError::data_integrity(
                    group.key().to_string(),
                    &frames,
                    "no finite copy assignment exists; coordinates may be non-finite",
                )
            })?;

            trace!(group = %group.key(), ?permutation, sum, "Resolved copy assignment.");
            total_sum += sum;
            permutations.insert(group.key().clone(), permutation);
        }

        let point_count = self.index.point_count();
        if point_count == 0 {
            return Err(EngineError::EmptyComparison {
                context: format!("frames {first_index} and {second_index}"),
            });
        }

        Ok(PairMetric {
            distance: (total_sum / point_count as f64).sqrt(),
            assignment: Assignment { permutations },
        })
    }
}

fn gather_copies(
    group: &MoleculeGroup,
    frame: &Frame,
    frame_index: usize,
) -> Result<Vec<Vec<Point3<f64>>>, EngineError> {
    group
        .copies()
        .iter()
        .map(|copy| {
            frame.gather(copy).ok_or_else(|| {
                EngineError::data_integrity(
                    group.key().to_string(),
                    &[frame_index],
                    "copy selection references points missing from the frame",
                )
            })
        })
        .collect()
}

struct PermutationSearch<'c> {
    costs: &'c [Vec<f64>],
    current: Vec<usize>,
    used: Vec<bool>,
    best: Option<(Vec<usize>, f64)>,
}

impl PermutationSearch<'_> {
    fn descend(&mut self, partial: f64) {
        let slot = self.current.len();
        if slot == self.costs.len() {
            if self.best.as_ref().is_none_or(|(_, best)| partial < *best) {
                self.best = Some((self.current.clone(), partial));
            }
            return;
        }

        for target in 0..self.costs.len() {
            if self.used[target] {
                continue;
            }
            let next = partial + self.costs[slot][target];
            if !next.is_finite() || self.best.as_ref().is_some_and(|(_, best)| next >= *best) {
                continue;
            }
            self.used[target] = true;
            self.current.push(target);
            self.descend(next);
            self.current.pop();
            self.used[target] = false;
        }
    }
}

/// Returns the permutation minimizing `Σ costs[c][π(c)]` and its sum.
///
/// `None` if the matrix is not square or no permutation has a finite sum. An empty
/// matrix yields the empty permutation with a zero sum.
fn best_permutation(costs: &[Vec<f64>]) -> Option<(Vec<usize>, f64)> {
    let size = costs.len();
    if costs.iter().any(|row| row.len() != size) {
        return None;
    }
    let mut search = PermutationSearch {
        costs,
        current: Vec::with_capacity(size),
        used: vec![false; size],
        best: None,
    };
    search.descend(0.0);
    search.best
}
