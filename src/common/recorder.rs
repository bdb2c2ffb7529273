//! File-backed implementations of the simulation hooks.
//!
//! - `JsonStateRecorder` writes every recorded state as `state_NNNNN.json`
//! - `StatisticsCollector` keeps samples and cycle results in memory and
//!   writes them as a single `statistics.json` at the end of a run

use anyhow::Context;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::scene::Scene;
use crate::simulation::events::{StateRecorder, StateStatistics, StatisticsSink};
use crate::simulation::types::{CycleResult, Network, NodeId, Role, Route};

/// Per-node part of a state snapshot.
#[derive(Debug, Clone, Serialize)]
struct NodeState {
    node_id: NodeId,
    role: Role,
    battery: f64,
    route: Route,
}

/// One recorded network state.
#[derive(Debug, Clone, Serialize)]
struct StateSnapshot<'a> {
    state: usize,
    cycle: usize,
    scene: Scene,
    nodes: Vec<NodeState>,
    dominant_edges: Vec<(NodeId, NodeId)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dominating: Option<&'a std::collections::BTreeSet<NodeId>>,
}

/// Writes each recorded state to its own JSON file.
pub struct JsonStateRecorder {
    directory: PathBuf,
    written: usize,
    failures: usize,
}

impl JsonStateRecorder {
    /// Create the output directory if needed.
    pub fn new(directory: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(directory).with_context(|| format!("Failed to create output directory {}", directory.display()))?;
        Ok(JsonStateRecorder {
            directory: directory.to_path_buf(),
            written: 0,
            failures: 0,
        })
    }

    pub fn state_path(&self, state: usize) -> PathBuf {
        self.directory.join(format!("state_{:05}.json", state))
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    fn write_state(&self, state: usize, cycle: usize, network: &Network) -> anyhow::Result<()> {
        let snapshot = StateSnapshot {
            state,
            cycle,
            scene: Scene::from_network(network),
            nodes: network
                .nodes()
                .iter()
                .map(|node| NodeState {
                    node_id: node.id,
                    role: node.role,
                    battery: node.battery,
                    route: node.route,
                })
                .collect(),
            dominant_edges: network.edges().iter().filter(|edge| edge.dominant).map(|edge| edge.key()).collect(),
            dominating: network.dominating().map(|view| &view.nodes),
        };
        let path = self.state_path(state);
        let data = serde_json::to_string(&snapshot).context("Failed to serialize state")?;
        fs::write(&path, data).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

impl StateRecorder for JsonStateRecorder {
    fn record_state(&mut self, state: usize, cycle: usize, network: &Network) {
        match self.write_state(state, cycle, network) {
            Ok(()) => self.written += 1,
            Err(e) => {
                self.failures += 1;
                log::warn!("Could not record state {}: {:#}", state, e);
            }
        }
    }
}

/// Cycle result as written to the statistics file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleRecord {
    pub cycle: usize,
    pub interval: f64,
    pub lifetime: u64,
}

/// In-memory statistics of a run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct StatisticsCollector {
    pub samples: Vec<StateStatistics>,
    pub results: Vec<CycleRecord>,
}

#[derive(Serialize)]
struct StatisticsReport<'a> {
    generated_at: String,
    samples: &'a [StateStatistics],
    results: &'a [CycleRecord],
}

impl StatisticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples taken during one cycle, in recording order.
    pub fn cycle_samples(&self, cycle: usize) -> impl Iterator<Item = &StateStatistics> {
        self.samples.iter().filter(move |sample| sample.cycle == cycle)
    }

    /// Write samples and results as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let report = StatisticsReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            samples: &self.samples,
            results: &self.results,
        };
        let data = serde_json::to_string_pretty(&report).context("Failed to serialize statistics")?;
        fs::write(path, data).with_context(|| format!("Failed to write statistics {}", path.display()))?;
        log::info!("Wrote {} samples and {} cycle results to {}", self.samples.len(), self.results.len(), path.display());
        Ok(())
    }
}

impl StatisticsSink for StatisticsCollector {
    fn record_statistics(&mut self, sample: StateStatistics) {
        self.samples.push(sample);
    }

    fn record_result(&mut self, cycle: usize, result: CycleResult) {
        self.results.push(CycleRecord {
            cycle,
            interval: result.interval,
            lifetime: result.lifetime,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::events::ProgressReporter;
    use crate::simulation::routing::configure_topology;
    use crate::simulation::test_support::star;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wsn-lifetime-simulator-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn states_are_written_as_numbered_files() {
        let dir = scratch_dir("states");
        let mut recorder = JsonStateRecorder::new(&dir).unwrap();
        let mut network = star(3, 1.0);
        recorder.record_state(0, 0, &network);
        configure_topology(&mut network, &ProgressReporter::disabled());
        recorder.record_state(1, 0, &network);

        assert_eq!(recorder.written(), 2);
        assert_eq!(recorder.failures(), 0);
        let data = fs::read_to_string(dir.join("state_00001.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(value["state"], 1);
        assert_eq!(value["nodes"].as_array().unwrap().len(), 4);
        assert_eq!(value["dominant_edges"].as_array().unwrap().len(), 0);
        assert_eq!(value["dominating"], serde_json::json!([0]));
        assert!(dir.join("state_00000.json").exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unwritable_directory_counts_failures() {
        let dir = scratch_dir("gone");
        let mut recorder = JsonStateRecorder::new(&dir).unwrap();
        fs::remove_dir_all(&dir).unwrap();
        recorder.record_state(0, 0, &star(1, 1.0));
        assert_eq!(recorder.written(), 0);
        assert_eq!(recorder.failures(), 1);
    }

    #[test]
    fn collector_keeps_samples_and_results() {
        let mut collector = StatisticsCollector::new();
        let sample = StateStatistics {
            average_remaining_battery: 0.5,
            connected_nodes: 3,
            cycle: 1,
            simulation_time: 12,
        };
        collector.record_statistics(sample);
        collector.record_result(1, CycleResult { interval: 4.0, lifetime: 20 });
        assert_eq!(collector.cycle_samples(1).count(), 1);
        assert_eq!(collector.cycle_samples(0).count(), 0);

        let dir = scratch_dir("statistics");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("statistics.json");
        collector.write(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["results"][0]["lifetime"], 20);
        assert_eq!(value["samples"][0]["connected_nodes"], 3);
        assert!(value["generated_at"].is_string());
        fs::remove_dir_all(&dir).unwrap();
    }
}
