//! Collaborators around the simulation core: configuration, network input
//! (scene files and the random generator) and state/statistics output.

pub mod config;
pub mod generator;
pub mod recorder;
pub mod scene;
