//! # Core Module
//!
//! The foundation layer of symclust: the data structures describing an ensemble of
//! conformational models and the pure geometric routines used to compare them.
//!
//! ## Architecture
//!
//! - **Structural Description** ([`models`]) - Point topology, selection queries, immutable
//!   frames and the indexable frame store
//! - **Geometry** ([`utils`]) - RMSD, centroids and optimal rigid superposition
//! - **Persistence** ([`io`]) - Reading and writing precomputed distance matrices
//!
//! Nothing in this layer keeps state between calls; every frame is an explicit value and
//! every transformation returns a new one.

pub mod io;
pub mod models;
pub mod utils;
