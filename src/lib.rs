//! Lifetime simulator for battery powered wireless sensor networks.
//!
//! The `simulation` module holds the engine; `common` holds its inputs and
//! outputs (configuration, scenes, generator, recorders).

pub mod common;
pub mod simulation;
