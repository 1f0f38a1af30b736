//! # Core Models Module
//!
//! Data structures describing an ensemble of sampled conformations.
//!
//! ## Key Components
//!
//! - [`selection`] - Explicit selection criteria (molecule, residue range, copy, state,
//!   resolution) with "match all" defaults
//! - [`topology`] - Per-point metadata shared by all frames, including rigid-body membership
//! - [`frame`] - One immutable coordinate snapshot bound to its topology
//! - [`ensemble`] - The `FrameStore` abstraction and its in-memory `Ensemble` implementation
//!
//! ## Usage
//!
//! ```ignore
//! use symclust::core::models::{topology::{Topology, PointInfo}, frame::Frame};
//!
//! let mut topology = Topology::new();
//! topology.add_point(PointInfo::new("A", 0, 0, ResidueRange::single(1)));
//! let frame = Frame::new(Arc::new(topology), vec![Point3::origin()])?;
//! ```

pub mod ensemble;
pub mod frame;
pub mod selection;
pub mod topology;
