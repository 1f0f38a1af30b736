use crate::core::io::matrix::DistanceMatrix;
use crate::core::models::ensemble::{Ensemble, FrameRecord, FrameStore};
use crate::engine::cache::PairwiseMetricCache;
use crate::engine::clustering::ClusterEngine;
use crate::engine::config::ClusteringConfig;
use crate::engine::distance::DistanceSource;
use crate::engine::distributed::{Communicator, DistributedCoordinator};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RmsfProfile {
    pub molecule: String,
    pub copy_index: usize,
    pub state_index: usize,
    pub reference_cluster: Option<usize>,
    pub values: BTreeMap<i32, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub id: usize,
    pub size: usize,
    /// Source indices of the members, in discovery order.
    pub members: Vec<usize>,
    pub center: Option<usize>,
    pub precision: Option<f64>,
    pub rmsf: Vec<RmsfProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BipartitePrecision {
    pub first: usize,
    pub second: usize,
    pub precision: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusteringReport {
    pub cutoff: f64,
    pub refinement_cutoff: Option<f64>,
    pub frame_count: usize,
    /// Source index of every analyzed frame, in analysis order.
    pub analyzed_frames: Vec<usize>,
    pub clusters: Vec<ClusterSummary>,
    pub bipartite_precision: Vec<BipartitePrecision>,
    /// Distances between the analyzed frames, in analysis order, when requested.
    #[serde(skip)]
    pub distance_matrix: Option<DistanceMatrix>,
}

impl ClusteringReport {
    /// Cluster id of every analyzed frame, keyed by source index.
    pub fn assignments(&self) -> BTreeMap<usize, usize> {
        self.clusters
            .iter()
            .flat_map(|cluster| cluster.members.iter().map(move |&m| (m, cluster.id)))
            .collect()
    }
}

/// Indices of the frames to analyze, in analysis order.
///
/// The frame window keeps the fraction range `[first, last)` of the store (bounds
/// truncated to whole frames). If a number of best-scoring models is requested, the
/// remaining frames are then ranked by ascending score, ties keeping store order and
/// unscored frames ranking last, and the best ones are kept in rank order.
pub fn select_frames<S: FrameStore + ?Sized>(store: &S, config: &ClusteringConfig) -> Vec<usize> {
    let len = store.len();
    let window = match config.frame_window {
        Some((first, last)) => {
            let start = ((first * len as f64) as usize).min(len);
            let end = ((last * len as f64) as usize).min(len);
            start..end
        }
        None => 0..len,
    };

    let mut selected: Vec<usize> = window.collect();
    if let Some(count) = config.best_scoring_models {
        selected.sort_by(|&a, &b| {
            let score_a = store.score(a).unwrap_or(f64::INFINITY);
            let score_b = store.score(b).unwrap_or(f64::INFINITY);
            score_a.total_cmp(&score_b)
        });
        selected.truncate(count);
    }
    selected
}

/// Clusters the frames of `store` selected by `config`, sharing the extraction work among
/// the workers of `coordinator`.
///
/// Every worker must call this function with the same store contents and configuration.
/// Each extracts its contiguous segment of the selected frames, the segments are gathered
/// on every worker, and the coordinator clusters the assembled ensemble. The coordinator
/// receives `Some(report)`, the other workers `None`.
#[instrument(skip_all, name = "clustering_workflow", fields(rank = coordinator.rank()))]
pub fn run<S, C>(
    store: &S,
    config: &ClusteringConfig,
    coordinator: &DistributedCoordinator<C>,
    reporter: &ProgressReporter,
) -> Result<Option<ClusteringReport>, EngineError>
where
    S: FrameStore + ?Sized,
    C: Communicator,
{
    // === Phase 0: Frame selection and distributed extraction ===
    reporter.report(Progress::PhaseStart {
        name: "Frame Extraction",
    });
    let selected = select_frames(store, config);
    info!(
        total = store.len(),
        selected = selected.len(),
        workers = coordinator.size(),
        "Selected frames for clustering."
    );

    let local = coordinator
        .local_chunk(&selected)
        .iter()
        .map(|&index| {
            FrameRecord::extract(store, index).ok_or(EngineError::FrameOutOfRange {
                index,
                len: store.len(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let records = coordinator.gather(local, selected.len())?;
    let ensemble = Ensemble::from_records(Arc::clone(store.topology()), records)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Clustering on the coordinator ===
    coordinator.on_coordinator(|| cluster_store(&ensemble, config, reporter))
}

/// Clusters every frame of `store` and computes the statistics requested by `config`.
#[instrument(skip_all, name = "cluster_store")]
pub fn cluster_store<S: FrameStore + Sync>(
    store: S,
    config: &ClusteringConfig,
    reporter: &ProgressReporter,
) -> Result<ClusteringReport, EngineError> {
    let cache = PairwiseMetricCache::from_config(store, config)?;
    let mut engine = ClusterEngine::new(cache);

    analyze(&mut engine, config, reporter, |engine, position| {
        config
            .rmsf
            .iter()
            .map(|request| {
                let values = engine.rmsf(position, request)?;
                Ok(RmsfProfile {
                    molecule: request.molecule.clone(),
                    copy_index: request.copy_index,
                    state_index: request.state_index,
                    reference_cluster: request.reference_cluster,
                    values,
                })
            })
            .filter(|profile| !matches!(profile, Err(EngineError::EmptyComparison { .. })))
            .collect()
    })
}

/// Clusters the items of a precomputed distance matrix.
///
/// Fluctuation profiles need coordinates and are skipped.
#[instrument(skip_all, name = "cluster_matrix")]
pub fn cluster_matrix(
    matrix: DistanceMatrix,
    config: &ClusteringConfig,
    reporter: &ProgressReporter,
) -> Result<ClusteringReport, EngineError> {
    if !config.rmsf.is_empty() {
        warn!("RMSF requests are ignored when clustering a precomputed distance matrix.");
    }
    let mut engine = ClusterEngine::new(matrix);
    analyze(&mut engine, config, reporter, |_, _| Ok(Vec::new()))
}

fn analyze<D, F>(
    engine: &mut ClusterEngine<D>,
    config: &ClusteringConfig,
    reporter: &ProgressReporter,
    mut rmsf: F,
) -> Result<ClusteringReport, EngineError>
where
    D: DistanceSource,
    F: FnMut(&mut ClusterEngine<D>, usize) -> Result<Vec<RmsfProfile>, EngineError>,
{
    let frame_count = engine.source().len();

    // === Phase 1: Pairwise distances ===
    {
        let _phase = reporter.phase("Pairwise Distances");
        let pairs: Vec<(usize, usize)> = (0..frame_count).tuple_combinations().collect();
        engine.source_mut().prefetch(&pairs, reporter)?;
    }
    let distance_matrix = if config.export_distance_matrix {
        Some(engine.source_mut().collect_matrix()?)
    } else {
        None
    };

    // === Phase 2: Aggregate, merge and finalize ===
    engine.cluster_with_progress(config.cutoff, reporter)?;

    // === Phase 3: Optional refinement by cluster centers ===
    if let Some(refinement_cutoff) = config.refinement_cutoff {
        let _phase = reporter.phase("Refinement");
        engine.refine(refinement_cutoff)?;
    }

    // === Phase 4: Cluster statistics ===
    let _phase = reporter.phase("Statistics");
    let cluster_count = engine.clusters().len();
    reporter.report(Progress::TaskStart {
        total_steps: cluster_count as u64,
    });

    let mut clusters = Vec::with_capacity(cluster_count);
    for position in 0..cluster_count {
        let center = engine.center_of(position)?;
        let precision = match engine.precision(position) {
            Ok(precision) => Some(precision),
            Err(EngineError::EmptyComparison { .. }) => None,
            Err(e) => return Err(e),
        };
        let rmsf = rmsf(engine, position)?;

        let members = engine
            .clusters()
            .get(position)
            .map(|cluster| cluster.members().to_vec())
            .unwrap_or_default();
        clusters.push(ClusterSummary {
            id: position,
            size: members.len(),
            members: members
                .iter()
                .map(|&member| engine.source().source_index(member))
                .collect(),
            center: Some(engine.source().source_index(center)),
            precision,
            rmsf,
        });
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);

    let mut bipartite_precision = Vec::new();
    if config.compute_bipartite {
        for (first, second) in (0..cluster_count).tuple_combinations() {
            bipartite_precision.push(BipartitePrecision {
                first,
                second,
                precision: engine.bipartite_precision(first, second)?,
            });
        }
    }

    info!(
        frames = frame_count,
        clusters = clusters.len(),
        "Clustering analysis complete."
    );

    let analyzed_frames = (0..frame_count)
        .map(|position| engine.source().source_index(position))
        .collect();

    Ok(ClusteringReport {
        cutoff: config.cutoff,
        refinement_cutoff: config.refinement_cutoff,
        frame_count,
        analyzed_frames,
        clusters,
        bipartite_precision,
        distance_matrix,
    })
}
