//! # Engine Module
//!
//! This module implements the stateful clustering engine of symclust: everything between
//! an indexable store of frames and a finished partition of those frames into clusters.
//!
//! ## Overview
//!
//! Comparing two frames of a homo-oligomeric assembly requires deciding which copy of a
//! molecule in one frame corresponds to which copy in the other. The engine resolves that
//! correspondence per frame pair, optionally superposes the frames first, memoizes the
//! result, and feeds the resulting distances into a two-phase clustering algorithm.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Cutoffs, alignment policy, component selections and
//!   analysis requests
//! - **Copy Groups** ([`selection_index`]) - Per molecule and state, the ordered point
//!   selections of every interchangeable copy
//! - **Assignment** ([`assignment`]) - Branch-and-bound search for the copy permutation
//!   minimizing the squared deviation of a frame pair
//! - **Alignment** ([`alignment`]) - Least-squares superposition of one frame onto another
//! - **Memoization** ([`cache`]) - Symmetric pairwise cache of distances and assignments
//! - **Distance Sources** ([`distance`]) - The abstraction clustering runs on, implemented
//!   by the live cache and by precomputed matrices
//! - **Clustering** ([`cluster`], [`clustering`]) - Cluster containers and the
//!   aggregate/merge/finalize engine with optional refinement
//! - **Statistics** ([`statistics`]) - Centers, precision, bipartite precision and RMSF
//! - **Distribution** ([`distributed`]) - Contiguous work partitioning, all-gather and
//!   barriers across cooperating workers
//! - **Progress Monitoring** ([`progress`]) - Progress reporting callbacks
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod alignment;
pub mod assignment;
pub mod cache;
pub mod cluster;
pub mod clustering;
pub mod config;
pub mod distance;
pub mod distributed;
pub mod error;
pub mod progress;
pub mod selection_index;
pub mod statistics;
