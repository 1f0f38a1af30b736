//! # symclust Core Library
//!
//! Symmetry-aware clustering of sampled conformational ensembles of macromolecular
//! assemblies. Frames that carry several interchangeable copies of the same molecule
//! (homo-oligomers) are compared under the copy-to-copy assignment that minimizes their
//! RMSD, so that two structures differing only in copy labelling are recognized as equal.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Topology`, `Frame`, `Ensemble`),
//!   the explicit `SelectionQuery`, geometry primitives (RMSD, Kabsch superposition) and
//!   distance-matrix persistence.
//!
//! - **[`engine`]: The Logic Core.** The stateful layer: the `SelectionIndex` of symmetric
//!   copy groups, the branch-and-bound `AssignmentSolver`, the `AlignmentEngine`, the
//!   memoizing `PairwiseMetricCache`, the aggregate-and-merge `ClusterEngine` with its
//!   derived statistics and cluster import/export, and the distributed coordination
//!   primitives.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures that tie `engine` and `core`
//!   together: select frames, distribute extraction, cluster on the coordinator and return
//!   a serializable report.

pub mod core;
pub mod engine;
pub mod workflows;
