//! # Workflows Module
//!
//! High-level entry points that run a complete clustering analysis of a conformational
//! ensemble.
//!
//! ## Overview
//!
//! A workflow selects the frames to analyze, distributes their extraction across the
//! workers of a [`DistributedCoordinator`](crate::engine::distributed::DistributedCoordinator),
//! clusters the gathered ensemble on the coordinator and returns a serializable report
//! with every cluster's members, center, precision and requested fluctuation profiles.
//!
//! ## Architecture
//!
//! - **Clustering Workflow** ([`cluster`]) - Frame selection, distributed gathering,
//!   clustering, optional refinement and per-cluster statistics, for live frame stores and
//!   for precomputed distance matrices alike.

pub mod cluster;
