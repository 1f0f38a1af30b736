mod common;

use common::{dimer, dimer_topology, line, random_ensemble, two_state_ensemble};
use itertools::Itertools;
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::sync::Arc;
use symclust::core::models::ensemble::{Ensemble, FrameStore};
use symclust::core::models::selection::ResidueRange;
use symclust::core::models::topology::{PointInfo, Topology};
use symclust::engine::cache::PairwiseMetricCache;
use symclust::engine::clustering::ClusterEngine;
use symclust::engine::config::{AlignmentPolicy, ClusteringConfigBuilder};
use symclust::engine::distance::DistanceSource;
use symclust::engine::error::EngineError;
use symclust::engine::selection_index::GroupKey;

fn cache_for(ensemble: &Ensemble) -> PairwiseMetricCache<&Ensemble> {
    let config = ClusteringConfigBuilder::new().cutoff(1.0).build().unwrap();
    PairwiseMetricCache::from_config(ensemble, &config).unwrap()
}

#[test]
fn distances_and_cached_entries_are_symmetric() {
    let ensemble = random_ensemble(7, 8);
    let mut cache = cache_for(&ensemble);

    for (i, j) in (0..ensemble.len()).tuple_combinations() {
        let forward = cache.get_or_compute(i, j).unwrap().clone();
        let backward = cache.get_or_compute(j, i).unwrap().clone();
        assert_eq!(forward, backward);
        assert_eq!(cache.distance(i, j).unwrap(), cache.distance(j, i).unwrap());
    }
}

#[test]
fn repeated_lookups_do_not_recompute() {
    let ensemble = two_state_ensemble();
    let mut cache = cache_for(&ensemble);

    let first = cache.get_or_compute(1, 4).unwrap().distance;
    assert_eq!(cache.computations(), 1);
    for _ in 0..5 {
        assert_eq!(cache.get_or_compute(1, 4).unwrap().distance, first);
        assert_eq!(cache.get_or_compute(4, 1).unwrap().distance, first);
    }
    assert_eq!(cache.computations(), 1);
    assert_eq!(cache.cached_pairs(), 1);
}

#[test]
fn unperturbed_copy_has_zero_distance_and_identity_assignment() {
    let mut ensemble = Ensemble::new(dimer_topology());
    ensemble.push(dimer(3.0, 0.5, false)).unwrap();
    ensemble.push(dimer(3.0, 0.5, false)).unwrap();
    let mut cache = cache_for(&ensemble);

    let metric = cache.get_or_compute(0, 1).unwrap();
    assert_eq!(metric.distance, 0.0);
    assert!(metric.assignment.is_identity());
}

#[test]
fn swapped_single_point_copies_are_matched_crosswise() {
    let mut topology = Topology::new();
    topology.add_point(PointInfo::new("A", 0, 0, ResidueRange::single(1)));
    topology.add_point(PointInfo::new("A", 1, 0, ResidueRange::single(1)));
    let mut ensemble = Ensemble::new(Arc::new(topology));
    ensemble
        .push(vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 10.0)])
        .unwrap();
    ensemble
        .push(vec![Point3::new(0.0, 0.0, 10.0), Point3::new(0.0, 0.0, 0.0)])
        .unwrap();
    let mut cache = cache_for(&ensemble);

    let metric = cache.get_or_compute(0, 1).unwrap();
    let key = GroupKey::new("A", 0);
    assert!(metric.distance.abs() < 1e-12);
    assert_eq!(metric.assignment.permutation(&key), Some(&[1, 0][..]));
    assert_eq!(metric.assignment.target_copy(&key, 0), Some(1));
    assert_eq!(metric.assignment.target_copy(&key, 1), Some(0));
}

#[test]
fn clustering_is_a_partition_for_random_cutoffs() {
    let ensemble = random_ensemble(42, 20);
    let mut engine = ClusterEngine::new(cache_for(&ensemble));
    let mut rng = StdRng::seed_from_u64(1234);

    let mut cutoffs: Vec<f64> = (0..12).map(|_| rng.random_range(0.0..12.0)).collect();
    cutoffs.extend([0.0, 1e6]);
    for cutoff in cutoffs {
        let clusters = engine.cluster(cutoff).unwrap();
        assert!(clusters.is_partition_of(20), "cutoff {cutoff} broke the partition");
        for (id, cluster) in clusters.iter().enumerate() {
            assert_eq!(cluster.id(), Some(id));
        }
    }
    assert_eq!(engine.cluster(1e6).unwrap().len(), 1);
    assert_eq!(engine.cluster(0.0).unwrap().len(), 20);
}

#[test]
fn separated_groups_coarsen_as_cutoff_grows() {
    let mut engine = ClusterEngine::new(line(&[0.0, 1.0, 2.0, 100.0, 101.0, 200.0]));
    let expected = [(0.5, 6), (1.5, 4), (2.5, 3), (150.0, 2), (300.0, 1)];

    for (cutoff, count) in expected {
        assert_eq!(engine.cluster(cutoff).unwrap().len(), count, "cutoff {cutoff}");
    }
}

#[test]
fn larger_cutoff_can_leave_a_seed_unmerged() {
    let mut engine = ClusterEngine::new(line(&[0.0, 7.0, 5.0, 9.0, 8.0, 3.0]));

    // Seeds 0 and 1 grow {0, 2, 5} and {1, 3, 4}; members 5 and 1 are close, so the
    // aggregates merge.
    let clusters = engine.cluster(7.0).unwrap();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters.get(0).unwrap().members(), &[0, 2, 5, 1, 3, 4]);

    // Seed 0 now reaches everything but frame 3, which stays a singleton.
    let clusters = engine.cluster(9.0).unwrap();
    let members: Vec<Vec<usize>> = clusters.iter().map(|c| c.members().to_vec()).collect();
    assert_eq!(members, vec![vec![0, 1, 2, 4, 5], vec![3]]);
    assert!(clusters.is_partition_of(6));
}

#[test]
fn cluster_data_follows_external_assignments() {
    let ensemble = two_state_ensemble();
    let mut engine = ClusterEngine::new(cache_for(&ensemble));
    engine.set_cluster_assignments(&[1, 0, 1, 0, 1, 0]).unwrap();

    let data = engine.cluster_data(1).unwrap();

    let indices: Vec<usize> = data.iter().map(|record| record.index).collect();
    assert_eq!(indices, vec![0, 2, 4]);
    assert_eq!(data[1].score, Some(2.0));
    assert_eq!(data[1].positions, ensemble.frame(2).unwrap().positions());
    assert!(matches!(
        engine.cluster_data(2),
        Err(EngineError::InvalidParameter { name: "cluster", .. })
    ));
}

#[test]
fn two_separated_groups_form_two_clusters() {
    let ensemble = two_state_ensemble();
    let mut engine = ClusterEngine::new(cache_for(&ensemble));

    let clusters = engine.cluster(5.0).unwrap();

    let members: BTreeSet<BTreeSet<usize>> = clusters
        .iter()
        .map(|cluster| cluster.members().iter().copied().collect())
        .collect();
    let expected: BTreeSet<BTreeSet<usize>> =
        [[0, 1, 2].into_iter().collect(), [3, 4, 5].into_iter().collect()]
            .into_iter()
            .collect();
    assert_eq!(members, expected);
}

#[test]
fn singleton_precision_is_undefined_rather_than_zero() {
    let ensemble = two_state_ensemble();
    let mut engine = ClusterEngine::new(cache_for(&ensemble));
    engine.cluster(0.0).unwrap();

    for position in 0..engine.clusters().len() {
        assert!(matches!(
            engine.precision(position),
            Err(EngineError::EmptyComparison { .. })
        ));
        assert_eq!(engine.clusters().get(position).unwrap().precision(), None);
    }
}

#[test]
fn alignment_removes_rigid_displacement_of_whole_frames() {
    let mut ensemble = Ensemble::new(dimer_topology());
    let base = dimer(4.0, 1.0, false);
    let rotation = nalgebra::Rotation3::from_euler_angles(0.3, -0.2, 1.1);
    let moved: Vec<_> = base
        .iter()
        .map(|p| rotation * p + nalgebra::Vector3::new(7.0, -3.0, 2.0))
        .collect();
    ensemble.push(base).unwrap();
    ensemble.push(moved).unwrap();

    let raw = cache_for(&ensemble).compute(0, 1).unwrap().distance;
    let config = ClusteringConfigBuilder::new()
        .cutoff(1.0)
        .alignment(AlignmentPolicy::Enabled)
        .build()
        .unwrap();
    let aligned = PairwiseMetricCache::from_config(&ensemble, &config)
        .unwrap()
        .compute(0, 1)
        .unwrap()
        .distance;

    assert!(raw > 1.0);
    assert!(aligned < 1e-6);
}
