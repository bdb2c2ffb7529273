//! Connectivity and end-of-life evaluation.

use std::collections::{BTreeSet, HashSet};

use super::graph::WeightedGraph;
use super::types::{Network, NodeId, Route};

/// Outcome of an end-of-life check.
#[derive(Debug, Clone, PartialEq)]
pub struct LifetimeReport {
    pub end_of_life: bool,
    /// Sensors that cannot deliver data to any sink.
    pub disconnected: BTreeSet<NodeId>,
    /// `disconnected / sensors`.
    pub ratio: f64,
}

/// Decide whether the network has reached end-of-life.
///
/// Self-routed and exhausted sensors are always disconnected. With a fixed
/// topology (`interval == 0`) a sensor is connected when its route chain
/// reaches a sink through alive nodes. With role rotation the routes are
/// rebuilt periodically, so a sensor counts as connected while any alive
/// path to a sink exists.
///
/// # Parameters
///
/// * `network` - Network to inspect
/// * `interval` - Current role-rotation interval
/// * `end_of_life_ratio` - Disconnected share that ends the cycle
///
/// # Returns
///
/// The disconnected sensors, their share and whether the threshold is met.
pub fn evaluate_lifetime(network: &Network, interval: f64, end_of_life_ratio: f64) -> LifetimeReport {
    let reachable = if interval > 0.0 {
        Some(WeightedGraph::alive(network).reachable_from(&network.sink_ids()))
    } else {
        None
    };

    let mut memo: Vec<Option<bool>> = vec![None; network.node_count()];
    let mut disconnected = BTreeSet::new();
    for node in network.nodes().iter().filter(|node| !node.is_sink()) {
        let connected = if node.route == Route::Own || !node.is_alive() {
            false
        } else if let Some(reachable) = &reachable {
            reachable.contains(&node.id)
        } else {
            chain_reaches_sink(network, node.id, &mut memo)
        };
        if !connected {
            disconnected.insert(node.id);
        }
    }

    let sensors = network.sensor_count();
    let ratio = if sensors == 0 { 0.0 } else { disconnected.len() as f64 / sensors as f64 };
    LifetimeReport {
        end_of_life: ratio >= end_of_life_ratio,
        disconnected,
        ratio,
    }
}

/// Iterative route-chain walk with memoization.
///
/// Every node met on the walk shares the verdict of the walk. Meeting a dead
/// or self-routed node, an unassigned route or a loop breaks the chain.
fn chain_reaches_sink(network: &Network, start: NodeId, memo: &mut [Option<bool>]) -> bool {
    let mut walked = Vec::new();
    let mut seen = HashSet::new();
    let mut current = start;

    let verdict = loop {
        if let Some(known) = memo[current] {
            break known;
        }
        let node = network.node(current);
        if node.is_sink() {
            break true;
        }
        if !node.is_alive() || !seen.insert(current) {
            break false;
        }
        walked.push(current);
        match node.route {
            Route::Via(next) => current = next,
            Route::Own | Route::Unassigned => break false,
        }
    };

    for id in walked {
        memo[id] = Some(verdict);
    }
    verdict
}
