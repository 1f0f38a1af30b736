use super::cache::PairwiseMetricCache;
use super::clustering::ClusterEngine;
use super::config::RmsfRequest;
use super::distance::DistanceSource;
use super::error::EngineError;
use super::selection_index::GroupKey;
use crate::core::models::ensemble::FrameStore;
use crate::core::models::topology::Topology;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

impl<D: DistanceSource> ClusterEngine<D> {
    fn members_of(&self, position: usize) -> Result<Vec<usize>, EngineError> {
        let cluster = self
            .clusters()
            .get(position)
            .ok_or_else(|| EngineError::InvalidParameter {
                name: "cluster",
                reason: format!(
                    "no cluster at position {position} ({} cluster(s))",
                    self.clusters().len()
                ),
            })?;
        Ok(cluster.members().to_vec())
    }

    /// Computes and stores the center of the cluster at `position`: the member whose summed
    /// distance to all other members is smallest (first such member on ties).
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::EmptyComparison`] if the cluster has no members.
    pub fn compute_cluster_center(&mut self, position: usize) -> Result<usize, EngineError> {
        let members = self.members_of(position)?;
        if members.is_empty() {
            return Err(EngineError::EmptyComparison {
                context: format!("center of empty cluster at position {position}"),
            });
        }

        let mut totals = vec![0.0; members.len()];
        for (a, b) in (0..members.len()).tuple_combinations() {
            let distance = self.source_mut().distance(members[a], members[b])?;
            totals[a] += distance;
            totals[b] += distance;
        }

        let mut best = 0;
        for (slot, &total) in totals.iter().enumerate().skip(1) {
            if total < totals[best] {
                best = slot;
            }
        }
        let center = members[best];

        if let Some(cluster) = self.clusters_mut().get_mut(position) {
            cluster.set_center(center);
        }
        debug!(position, center, "Computed cluster center.");
        Ok(center)
    }

    /// The stored center of the cluster at `position`, computing it first if needed.
    pub fn center_of(&mut self, position: usize) -> Result<usize, EngineError> {
        match self.clusters().get(position).and_then(|cluster| cluster.center()) {
            Some(center) => Ok(center),
            None => self.compute_cluster_center(position),
        }
    }

    /// Average distance between the cluster's representatives and its other members.
    ///
    /// The representative is the center if one has been computed, otherwise every member
    /// is. The result is stored on the cluster.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::EmptyComparison`] if no pair of distinct members exists,
    /// as for a singleton. The stored precision is left unset in that case.
    pub fn precision(&mut self, position: usize) -> Result<f64, EngineError> {
        let members = self.members_of(position)?;
        let representatives = match self.clusters().get(position).and_then(|c| c.center()) {
            Some(center) => vec![center],
            None => members.clone(),
        };

        let mut sum = 0.0;
        let mut pairs = 0usize;
        for &representative in &representatives {
            for &member in &members {
                if representative != member {
                    sum += self.source_mut().distance(representative, member)?;
                    pairs += 1;
                }
            }
        }

        let precision = (pairs > 0).then(|| sum / pairs as f64);
        if let Some(cluster) = self.clusters_mut().get_mut(position) {
            cluster.set_precision(precision);
        }
        precision.ok_or_else(|| EngineError::EmptyComparison {
            context: format!("precision of cluster at position {position}"),
        })
    }

    /// Average distance over all cross pairs of two clusters.
    pub fn bipartite_precision(&mut self, first: usize, second: usize) -> Result<f64, EngineError> {
        let first_members = self.members_of(first)?;
        let second_members = self.members_of(second)?;
        if first_members.is_empty() || second_members.is_empty() {
            return Err(EngineError::EmptyComparison {
                context: format!("bipartite precision of clusters {first} and {second}"),
            });
        }

        let mut sum = 0.0;
        for &a in &first_members {
            for &b in &second_members {
                sum += self.source_mut().distance(a, b)?;
            }
        }
        Ok(sum / (first_members.len() * second_members.len()) as f64)
    }
}

impl<S: FrameStore + Sync> ClusterEngine<PairwiseMetricCache<S>> {
    /// Per-residue root mean square fluctuation of one molecule copy within a cluster.
    ///
    /// Every `step`-th member is compared against the representatives (the reference
    /// cluster's center if requested, else this cluster's center if computed, else every
    /// member). Each comparison superposes the member onto the representative and follows
    /// the copy assignment of the pair, so the fluctuation is measured on the matching
    /// copy. Displacements are summed per residue and divided by the number of
    /// comparisons.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::EmptyComparison`] if no comparison is possible, and with
    /// [`EngineError::DataIntegrity`] if the matched copies select different residues.
    pub fn rmsf(
        &mut self,
        position: usize,
        request: &RmsfRequest,
    ) -> Result<BTreeMap<i32, f64>, EngineError> {
        let members = self.members_of(position)?;
        let representatives = match request.reference_cluster {
            Some(reference) => vec![self.center_of(reference)?],
            None => match self.clusters().get(position).and_then(|c| c.center()) {
                Some(center) => vec![center],
                None => members.clone(),
            },
        };

        let topology = Arc::clone(self.source().store().topology());
        let key = GroupKey::new(request.molecule.clone(), request.state_index);
        let reference_points = copy_points(&topology, request, request.copy_index);
        if reference_points.is_empty() {
            warn!(
                molecule = %request.molecule,
                copy = request.copy_index,
                "RMSF selection matches no point."
            );
        }

        let mut sums: BTreeMap<i32, f64> = BTreeMap::new();
        let mut pairs = 0usize;
        for &representative in &representatives {
            for &member in members.iter().step_by(request.step.max(1)) {
                if member == representative {
                    continue;
                }
                let matched_copy = self.matched_copy(representative, member, &key, request)?;
                let member_points = copy_points(&topology, request, matched_copy);
                let same_residues = reference_points.len() == member_points.len()
                    && reference_points
                        .iter()
                        .zip(&member_points)
                        .all(|(a, b)| a.0 == b.0);
                if !same_residues {
                    return Err(EngineError::data_integrity(
                        key.to_string(),
                        &[representative, member],
                        format!(
                            "RMSF selection covers {} residue(s) in copy {} but {} in copy {}",
                            reference_points.len(),
                            request.copy_index,
                            member_points.len(),
                            matched_copy
                        ),
                    ));
                }

                let cache = self.source();
                let reference_frame = cache.frame(representative)?;
                let aligned = cache.aligned_frame(representative, member)?;
                for (&(residue, p0), &(_, p1)) in reference_points.iter().zip(&member_points) {
                    let (Some(a), Some(b)) = (reference_frame.position(p0), aligned.position(p1))
                    else {
                        continue;
                    };
                    *sums.entry(residue).or_insert(0.0) += (a - b).norm();
                }
                pairs += 1;
            }
        }

        if pairs == 0 {
            return Err(EngineError::EmptyComparison {
                context: format!(
                    "RMSF of molecule '{}' in cluster at position {position}",
                    request.molecule
                ),
            });
        }
        for value in sums.values_mut() {
            *value /= pairs as f64;
        }
        Ok(sums)
    }

    /// Topology copy index in `member` matched to `request.copy_index` in `representative`.
    fn matched_copy(
        &mut self,
        representative: usize,
        member: usize,
        key: &GroupKey,
        request: &RmsfRequest,
    ) -> Result<usize, EngineError> {
        let Some(group) = self.source().index().group(key) else {
            return Ok(request.copy_index);
        };
        let copy_indices = group.copy_indices().to_vec();
        let Some(slot) = copy_indices
            .iter()
            .position(|&copy| copy == request.copy_index)
        else {
            return Ok(request.copy_index);
        };

        let assignment = &self.source_mut().get_or_compute(representative, member)?.assignment;
        let matched_slot = if representative < member {
            assignment.target_copy(key, slot)
        } else {
            assignment.inverse().target_copy(key, slot)
        };
        Ok(matched_slot
            .and_then(|matched| copy_indices.get(matched).copied())
            .unwrap_or(request.copy_index))
    }
}

/// Points of one copy selected by `request`, one per residue (first point wins), in
/// topology order, paired with the residue index they represent.
fn copy_points(topology: &Topology, request: &RmsfRequest, copy: usize) -> Vec<(i32, usize)> {
    let query = RmsfRequest {
        copy_index: copy,
        ..request.clone()
    }
    .query();
    topology
        .select(&query)
        .into_iter()
        .filter_map(|index| topology.point(index).map(|info| (info.residues.start, index)))
        .unique_by(|&(residue, _)| residue)
        .collect()
}
