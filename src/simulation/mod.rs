//! Topology-control and lifetime simulation core.
//!
//! This module provides the complete simulation engine for a battery powered
//! sensor network. It integrates:
//! - Battery-weighted dominating set selection and connectivity repair
//! - Routing tree construction with a leaf fallback rule
//! - Two-phase per-round energy consumption
//! - Connectivity and end-of-life evaluation
//! - The outer search over the role-rotation interval
//!
//! ## Module Organization
//!
//! - `types`: Core data structures (Network, Node, Edge, results)
//! - `geometry`: Distances, centroids and closest pairs
//! - `graph`: petgraph views used for paths, trees and components
//! - `dominating`: Dominating set selector
//! - `routing`: Routing tree builder and `configure_topology`
//! - `energy`: Energy consumption model
//! - `lifetime`: Lifetime / connectivity evaluator
//! - `events`: Progress channel and recorder hooks
//! - `cycle`: Cycle driver
//!
//! ## Public API
//!
//! The main entry point is `CycleDriver::run`. The core performs no I/O; it
//! reports through the hooks of `SimulationContext`.

pub mod cycle;
pub mod dominating;
pub mod energy;
pub mod events;
pub mod geometry;
pub mod graph;
pub mod lifetime;
pub mod routing;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use cycle::{CycleDriver, SimulationError, SimulationOutcome, StopReason};
pub use events::{NullRecorder, ProgressReporter, SimulationContext, SimulationEvent};
pub use types::{CycleResult, Network, Node, NodeId, Point, Role, Route};
