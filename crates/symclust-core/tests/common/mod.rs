#![allow(dead_code)]

use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use symclust::core::io::matrix::DistanceMatrix;
use symclust::core::models::ensemble::Ensemble;
use symclust::core::models::selection::ResidueRange;
use symclust::core::models::topology::{PointInfo, Topology};

/// Homodimer of molecule "A": two copies of two residues, one point per residue.
pub fn dimer_topology() -> Arc<Topology> {
    let mut topology = Topology::new();
    for copy in 0..2 {
        for residue in 1..=2 {
            topology.add_point(PointInfo::new("A", copy, 0, ResidueRange::single(residue)));
        }
    }
    Arc::new(topology)
}

fn copy_points(x: f64, y: f64, z: f64) -> [Point3<f64>; 2] {
    [Point3::new(x, y, z), Point3::new(x, y + 3.0, z)]
}

/// Dimer coordinates with the second copy shifted along y by `offset` and the first copy
/// lifted along z by `wobble`. With `swapped` the copies are stored in reverse order.
pub fn dimer(offset: f64, wobble: f64, swapped: bool) -> Vec<Point3<f64>> {
    let first = copy_points(0.0, 0.0, wobble);
    let second = copy_points(10.0, offset, 0.0);
    if swapped {
        [second, first].concat()
    } else {
        [first, second].concat()
    }
}

/// Six frames forming two well separated groups, {0, 1, 2} and {3, 4, 5}, with one frame
/// of each group storing its copies in swapped order.
pub fn two_state_ensemble() -> Ensemble {
    let mut ensemble = Ensemble::new(dimer_topology());
    let frames = [
        dimer(0.0, 0.0, false),
        dimer(0.0, 0.3, true),
        dimer(0.0, -0.4, false),
        dimer(25.0, 0.0, false),
        dimer(25.0, 0.2, true),
        dimer(25.0, -0.3, false),
    ];
    for (score, positions) in frames.into_iter().enumerate() {
        ensemble.push_scored(positions, score as f64).unwrap();
    }
    ensemble
}

pub fn random_ensemble(seed: u64, frames: usize) -> Ensemble {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut ensemble = Ensemble::new(dimer_topology());
    for _ in 0..frames {
        let positions = (0..4)
            .map(|_| {
                Point3::new(
                    rng.random_range(-5.0..5.0),
                    rng.random_range(-5.0..5.0),
                    rng.random_range(-5.0..5.0),
                )
            })
            .collect();
        ensemble.push(positions).unwrap();
    }
    ensemble
}

/// Distance matrix of points on a line.
pub fn line(points: &[f64]) -> DistanceMatrix {
    let mut matrix = DistanceMatrix::new(points.len());
    for (i, a) in points.iter().enumerate() {
        for (j, b) in points.iter().enumerate().skip(i + 1) {
            matrix.set(i, j, (a - b).abs());
        }
    }
    matrix
}
