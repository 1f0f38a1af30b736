//! Persistence of precomputed pairwise distances.
//!
//! Distances between frames are the expensive part of a clustering run, so they can be
//! written to disk once and reused for later runs with different cutoffs.

pub mod matrix;
