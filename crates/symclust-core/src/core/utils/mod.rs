//! Geometric helpers shared by the engine: RMSD, centroids and optimal rigid superposition.

pub mod geometry;
