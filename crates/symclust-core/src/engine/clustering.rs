use super::cache::PairwiseMetricCache;
use super::cluster::{Cluster, ClusterSet};
use super::distance::DistanceSource;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::models::ensemble::{FrameRecord, FrameStore};
use itertools::Itertools;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Where the engine stands in its one-shot clustering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusteringStage {
    Unprocessed,
    Aggregated,
    Merged,
    Finalized,
}

/// Incremental two-phase clustering over a [`DistanceSource`].
///
/// [`ClusterEngine::cluster`] grows spheres of radius `cutoff` around seeds taken in
/// ascending index order (aggregation), joins neighbouring spheres that share close
/// members (merge) and numbers the surviving clusters (finalization). The result is a
/// partition of `0..len`.
pub struct ClusterEngine<D> {
    source: D,
    clusters: ClusterSet,
    stage: ClusteringStage,
}

impl<D: DistanceSource> ClusterEngine<D> {
    pub fn new(source: D) -> Self {
        Self {
            source,
            clusters: ClusterSet::new(),
            stage: ClusteringStage::Unprocessed,
        }
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut D {
        &mut self.source
    }

    pub fn clusters(&self) -> &ClusterSet {
        &self.clusters
    }

    pub fn stage(&self) -> ClusteringStage {
        self.stage
    }

    pub fn into_parts(self) -> (D, ClusterSet) {
        (self.source, self.clusters)
    }

    pub(crate) fn clusters_mut(&mut self) -> &mut ClusterSet {
        &mut self.clusters
    }

    pub fn cluster(&mut self, cutoff: f64) -> Result<&ClusterSet, EngineError> {
        self.cluster_with_progress(cutoff, &ProgressReporter::new())
    }

    /// Clusters every item of the source, discarding any previous result.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::InvalidParameter`] for a negative or non-finite cutoff and
    /// propagates any error raised while computing distances.
    #[instrument(skip_all, name = "cluster", fields(cutoff = cutoff))]
    pub fn cluster_with_progress(
        &mut self,
        cutoff: f64,
        reporter: &ProgressReporter,
    ) -> Result<&ClusterSet, EngineError> {
        validate_cutoff(cutoff)?;
        self.clusters = ClusterSet::new();
        self.stage = ClusteringStage::Unprocessed;
        info!(items = self.source.len(), cutoff, "Clustering started.");

        {
            let _phase = reporter.phase("Aggregation");
            self.aggregate(cutoff, reporter)?;
        }
        self.stage = ClusteringStage::Aggregated;
        debug!(clusters = self.clusters.len(), "Aggregation complete.");

        {
            let _phase = reporter.phase("Merging");
            self.merge_aggregates(cutoff)?;
        }
        self.stage = ClusteringStage::Merged;

        self.update_clusters();
        info!(clusters = self.clusters.len(), "Clustering finished.");
        Ok(&self.clusters)
    }

    fn aggregate(&mut self, cutoff: f64, reporter: &ProgressReporter) -> Result<(), EngineError> {
        let mut unprocessed: Vec<usize> = (0..self.source.len()).collect();
        reporter.report(Progress::TaskStart {
            total_steps: unprocessed.len() as u64,
        });

        let silent = ProgressReporter::new();
        while !unprocessed.is_empty() {
            let seed = unprocessed.remove(0);
            let candidates = std::mem::take(&mut unprocessed);

            let pairs: Vec<(usize, usize)> = candidates.iter().map(|&c| (seed, c)).collect();
            self.source.prefetch(&pairs, &silent)?;

            let mut cluster = Cluster::new(seed);
            for candidate in candidates {
                if self.source.distance(seed, candidate)? < cutoff {
                    cluster.push(candidate);
                } else {
                    unprocessed.push(candidate);
                }
            }

            debug!(seed, members = cluster.len(), "Aggregated cluster around seed.");
            for _ in 0..cluster.len() {
                reporter.report(Progress::TaskIncrement);
            }
            self.clusters.push(cluster);
        }

        reporter.report(Progress::TaskFinish);
        Ok(())
    }

    /// Merges aggregates that straddle a boundary.
    ///
    /// Only clusters with more than one member take part. A pair is merged when the seeds
    /// lie within twice the cutoff and some member of the first cluster other than its
    /// seed is within the cutoff of some member of the second. The first seed needs no
    /// check: aggregation already compared it against every member of later clusters.
    fn merge_aggregates(&mut self, cutoff: f64) -> Result<(), EngineError> {
        let candidates: Vec<usize> = self
            .clusters
            .iter()
            .enumerate()
            .filter(|(_, cluster)| cluster.len() > 1)
            .map(|(position, _)| position)
            .collect();

        let mut to_merge = Vec::new();
        for (first, second) in candidates.into_iter().tuple_combinations() {
            let seeds = (
                self.clusters.get(first).and_then(Cluster::seed),
                self.clusters.get(second).and_then(Cluster::seed),
            );
            let (Some(seed_a), Some(seed_b)) = seeds else {
                continue;
            };
            if self.source.distance(seed_a, seed_b)? < 2.0 * cutoff
                && self.have_close_members(first, second, cutoff)?
            {
                debug!(first, second, "Marked clusters for merging.");
                to_merge.push((first, second));
            }
        }

        for &(into, from) in to_merge.iter().rev() {
            self.merge(into, from);
        }
        self.clusters.drop_empty();
        Ok(())
    }

    fn have_close_members(
        &mut self,
        first: usize,
        second: usize,
        cutoff: f64,
    ) -> Result<bool, EngineError> {
        let first_members = self
            .clusters
            .get(first)
            .and_then(|cluster| cluster.members().get(1..))
            .map(<[usize]>::to_vec)
            .unwrap_or_default();
        let second_members = self
            .clusters
            .get(second)
            .map(|cluster| cluster.members().to_vec())
            .unwrap_or_default();

        for &a in &first_members {
            for &b in &second_members {
                if self.source.distance(a, b)? < cutoff {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Absorbs the cluster at position `from` into the cluster at position `into`; the
    /// source cluster is left empty. Returns `false` if the positions are invalid.
    pub fn merge(&mut self, into: usize, from: usize) -> bool {
        self.clusters.merge(into, from)
    }

    /// Replaces the clusters with the groups of an external labelling, one label per item.
    pub fn set_cluster_assignments(
        &mut self,
        labels: &[usize],
    ) -> Result<&ClusterSet, EngineError> {
        self.clusters = ClusterSet::from_assignments(labels, self.source.len())?;
        self.stage = ClusteringStage::Finalized;
        Ok(&self.clusters)
    }

    pub fn save_clusters(&self, path: &Path) -> Result<(), EngineError> {
        self.clusters.save_csv(path)?;
        info!(clusters = self.clusters.len(), path = %path.display(), "Clusters saved.");
        Ok(())
    }

    /// Loads clusters saved by [`ClusterEngine::save_clusters`], replacing the current
    /// ones or, with `append`, adding them after the current ones. Ids are renumbered.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::FrameOutOfRange`] if a loaded member is not an item of
    /// the source; the current clusters are left untouched.
    pub fn load_clusters(
        &mut self,
        path: &Path,
        append: bool,
    ) -> Result<&ClusterSet, EngineError> {
        let loaded = ClusterSet::load_csv(path)?;
        if let Some(index) = loaded.max_member().filter(|&max| max >= self.source.len()) {
            return Err(EngineError::FrameOutOfRange {
                index,
                len: self.source.len(),
            });
        }
        debug!(loaded = loaded.len(), append, "Clusters loaded.");

        if append {
            self.clusters.append(loaded);
        } else {
            self.clusters = loaded;
        }
        self.update_clusters();
        Ok(&self.clusters)
    }

    /// Drops empty clusters and assigns sequential ids `0..M`.
    pub fn update_clusters(&mut self) {
        self.clusters.finalize();
        self.stage = ClusteringStage::Finalized;
    }

    /// Merges clusters whose centers lie within `cutoff` of each other.
    ///
    /// Centers are computed when first needed and recomputed after a cluster grows. Pairs
    /// are visited in order, so a cluster can absorb several later ones.
    #[instrument(skip_all, name = "refine", fields(cutoff = cutoff))]
    pub fn refine(&mut self, cutoff: f64) -> Result<&ClusterSet, EngineError> {
        validate_cutoff(cutoff)?;
        let before = self.clusters.len();

        for (first, second) in (0..self.clusters.len()).tuple_combinations() {
            let both_present = [first, second]
                .iter()
                .all(|&position| self.clusters.get(position).is_some_and(|c| !c.is_empty()));
            if !both_present {
                continue;
            }
            let center_a = self.center_of(first)?;
            let center_b = self.center_of(second)?;
            if self.source.distance(center_a, center_b)? <= cutoff {
                debug!(first, second, "Merging clusters with close centers.");
                self.merge(first, second);
            }
        }

        self.update_clusters();
        info!(
            before,
            after = self.clusters.len(),
            "Refinement finished."
        );
        Ok(&self.clusters)
    }
}

impl<S: FrameStore + Sync> ClusterEngine<PairwiseMetricCache<S>> {
    /// Frame data of every member of the cluster at `position`, in member order.
    pub fn cluster_data(&self, position: usize) -> Result<Vec<FrameRecord>, EngineError> {
        let store = self.source.store();
        let cluster = self
            .clusters
            .get(position)
            .ok_or_else(|| EngineError::InvalidParameter {
                name: "cluster",
                reason: format!("no cluster at position {position}"),
            })?;
        cluster
            .members()
            .iter()
            .map(|&member| {
                FrameRecord::extract(store, member).ok_or(EngineError::FrameOutOfRange {
                    index: member,
                    len: store.len(),
                })
            })
            .collect()
    }
}

fn validate_cutoff(cutoff: f64) -> Result<(), EngineError> {
    if cutoff.is_finite() && cutoff >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidParameter {
            name: "cutoff",
            reason: format!("must be a finite, non-negative distance, got {cutoff}"),
        })
    }
}
