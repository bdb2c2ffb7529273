//! Battery-aware dominating set selection and connectivity repair.
//!
//! Steps:
//! - restrict the graph to alive nodes (sinks and sensors with energy left)
//! - greedy minimum weighted dominating set, weight = 1 / battery
//! - force every sink into the set
//! - bridge the remaining components with battery-weighted shortest paths

use std::collections::BTreeSet;
use std::time::Instant;

use super::events::{ProgressReporter, SimulationEvent};
use super::geometry::{centroid, closest_pair, distance2};
use super::graph::WeightedGraph;
use super::types::{DominatingView, Network, NodeId, RepairOutcome};

/// Compute the connected dominating structure of the current network.
///
/// # Parameters
///
/// * `network` - Network whose batteries drive the selection
/// * `progress` - Receives a `SubgraphCount` event after each merge
///
/// # Returns
///
/// The selected nodes, the alive edges they induce and the repair outcome.
/// Components that no alive path can reach are left out of the merge and
/// listed in `RepairOutcome::Partial`.
pub fn select_dominating_set(network: &Network, progress: &ProgressReporter) -> DominatingView {
    let alive = network.alive_ids();
    let mut selected = greedy_dominating_set(network, &alive);
    selected.extend(network.sink_ids());

    let alive_graph = WeightedGraph::alive(network);
    let (bridges, unreachable) = repair_connectivity(network, &alive_graph, &mut selected, progress);
    let edges = WeightedGraph::induced(network, &selected).edge_keys();

    log::debug!(
        "Dominating set: {} of {} alive nodes, {} bridges, {} unreachable components",
        selected.len(),
        alive.len(),
        bridges,
        unreachable.len()
    );

    DominatingView {
        nodes: selected,
        edges,
        bridges,
        outcome: if unreachable.is_empty() {
            RepairOutcome::Connected
        } else {
            RepairOutcome::Partial { unreachable }
        },
    }
}

/// Greedy minimum weighted dominating set over `alive`.
///
/// Repeatedly selects the node with the lowest ratio between its weight and
/// the number of not yet dominated nodes in its closed neighbourhood, lowest
/// id first on ties, until every alive node is dominated.
pub fn greedy_dominating_set(network: &Network, alive: &BTreeSet<NodeId>) -> BTreeSet<NodeId> {
    let mut undominated = alive.clone();
    let mut selected = BTreeSet::new();

    while !undominated.is_empty() {
        let mut best: Option<(NodeId, f64)> = None;
        for &candidate in alive {
            if selected.contains(&candidate) {
                continue;
            }
            let newly_dominated = closed_neighbourhood(network, alive, candidate).filter(|id| undominated.contains(id)).count();
            if newly_dominated == 0 {
                continue;
            }
            let cost = network.node(candidate).weight() / newly_dominated as f64;
            if best.is_none_or(|(_, best_cost)| cost < best_cost) {
                best = Some((candidate, cost));
            }
        }

        let Some((chosen, _)) = best else {
            break;
        };
        for id in closed_neighbourhood(network, alive, chosen) {
            undominated.remove(&id);
        }
        selected.insert(chosen);
    }
    selected
}

/// The node itself and its alive neighbours.
fn closed_neighbourhood<'a>(network: &'a Network, alive: &'a BTreeSet<NodeId>, id: NodeId) -> impl Iterator<Item = NodeId> + 'a {
    std::iter::once(id).chain(network.neighbours(id).iter().copied().filter(move |n| alive.contains(n)))
}

/// Merge the components of the induced subgraph on `selected`.
///
/// The first component (sink components first, then by smallest id) is joined
/// with the component whose centroid is nearest, through the shortest alive
/// path between their closest node pair. A component that cannot be reached
/// is excluded for the rest of the pass.
///
/// # Returns
///
/// Number of bridges added and the excluded components.
fn repair_connectivity(
    network: &Network,
    alive_graph: &WeightedGraph,
    selected: &mut BTreeSet<NodeId>,
    progress: &ProgressReporter,
) -> (usize, Vec<Vec<NodeId>>) {
    let position = |id: NodeId| network.node(id).position;
    let sinks: BTreeSet<NodeId> = network.sink_ids().into_iter().collect();
    let mut excluded: BTreeSet<NodeId> = BTreeSet::new();
    let mut unreachable = Vec::new();
    let mut bridges = 0usize;
    let started = Instant::now();

    loop {
        let mut components: Vec<Vec<NodeId>> = WeightedGraph::induced(network, selected)
            .components()
            .into_iter()
            .filter(|component| !component.iter().any(|id| excluded.contains(id)))
            .collect();
        components.sort_by_key(|component| !component.iter().any(|id| sinks.contains(id)));
        if components.len() <= 1 {
            break;
        }

        let first = &components[0];
        let Some(origin) = centroid(first.iter().map(|&id| &network.node(id).position)) else {
            break;
        };
        let mut nearest = 1;
        let mut nearest_d2 = f64::INFINITY;
        for (index, component) in components.iter().enumerate().skip(1) {
            let Some(center) = centroid(component.iter().map(|&id| &network.node(id).position)) else {
                continue;
            };
            let d2 = distance2(&origin, &center);
            if d2 < nearest_d2 {
                nearest = index;
                nearest_d2 = d2;
            }
        }
        let target = &components[nearest];

        let Some((from, to)) = closest_pair(first, target, position) else {
            break;
        };
        match alive_graph.shortest_path(from, to) {
            Some(path) => {
                selected.extend(path);
                bridges += 1;
                let remaining = components.len() - 2;
                let per_merge = started.elapsed().div_f64(bridges as f64);
                progress.emit(SimulationEvent::SubgraphCount {
                    remaining,
                    estimated_remaining: Some(per_merge.mul_f64(remaining as f64)),
                });
            }
            None => {
                log::warn!("No alive path between nodes {} and {}, skipping component of {} nodes", from, to, target.len());
                excluded.extend(target.iter().copied());
                unreachable.push(target.clone());
            }
        }
    }
    (bridges, unreachable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::test_support::{grid, p, star, two_triangles};
    use crate::simulation::types::Node;

    fn is_dominating(network: &Network, view: &DominatingView) -> bool {
        network.alive_ids().iter().all(|&id| view.contains(id) || network.neighbours(id).iter().any(|n| view.contains(*n)))
    }

    fn is_connected(network: &Network, view: &DominatingView) -> bool {
        WeightedGraph::induced(network, &view.nodes).components().len() == 1
    }

    #[test]
    fn star_is_dominated_by_its_sink() {
        let network = star(3, 10.0);
        let view = select_dominating_set(&network, &ProgressReporter::disabled());
        assert_eq!(view.nodes, BTreeSet::from([0]));
        assert!(view.edges.is_empty());
        assert_eq!(view.bridges, 0);
        assert_eq!(view.outcome, RepairOutcome::Connected);
    }

    #[test]
    fn greedy_selection_prefers_high_battery_nodes() {
        // Sink 0 - 1 - {2, 3} where 2 and 3 are only reachable through 1 or 4.
        let nodes = vec![
            Node::sink(0, p(0.0, 0.0)),
            Node::sensor(1, p(1.0, 0.0), 1.0),
            Node::sensor(2, p(2.0, 1.0), 9.0),
            Node::sensor(3, p(2.0, -1.0), 9.0),
            Node::sensor(4, p(2.0, 0.0), 9.0),
        ];
        let network = Network::new(nodes, vec![(0, 1), (1, 2), (1, 3), (1, 4), (4, 2), (4, 3)], 10.0).unwrap();
        let selected = greedy_dominating_set(&network, &network.alive_ids());
        assert_eq!(selected, BTreeSet::from([0, 4]));
    }

    #[test]
    fn two_triangles_are_bridged_through_non_dominating_nodes() {
        let network = two_triangles(10.0);
        let view = select_dominating_set(&network, &ProgressReporter::disabled());
        assert_eq!(view.nodes, BTreeSet::from([0, 2, 3, 6, 7]));
        assert_eq!(view.bridges, 1);
        assert_eq!(view.outcome, RepairOutcome::Connected);
        assert!(is_connected(&network, &view));
        assert!(is_dominating(&network, &view));
    }

    #[test]
    fn grid_view_is_dominating_connected_and_holds_the_sink() {
        let mut network = grid(5, 4, 10.0);
        for id in [3, 7, 11, 16] {
            network.node_mut(id).battery = 2.5;
        }
        let view = select_dominating_set(&network, &ProgressReporter::disabled());
        assert!(view.contains(0));
        assert!(is_dominating(&network, &view));
        assert!(is_connected(&network, &view));
    }

    #[test]
    fn exhausted_sensors_are_ignored() {
        let mut network = star(3, 10.0);
        network.node_mut(2).battery = 0.0;
        let view = select_dominating_set(&network, &ProgressReporter::disabled());
        assert_eq!(view.nodes, BTreeSet::from([0]));

        // Only sinks left alive.
        for id in 1..=3 {
            network.node_mut(id).battery = 0.0;
        }
        let view = select_dominating_set(&network, &ProgressReporter::disabled());
        assert_eq!(view.nodes, BTreeSet::from([0]));
    }

    #[test]
    fn unreachable_component_is_skipped_not_fatal() {
        let nodes = vec![
            Node::sink(0, p(0.0, 0.0)),
            Node::sensor(1, p(1.0, 0.0), 5.0),
            Node::sensor(2, p(10.0, 0.0), 5.0),
            Node::sensor(3, p(11.0, 0.0), 5.0),
        ];
        let network = Network::new(nodes, vec![(0, 1), (2, 3)], 5.0).unwrap();
        let view = select_dominating_set(&network, &ProgressReporter::disabled());
        assert_eq!(view.nodes, BTreeSet::from([0, 2]));
        assert_eq!(view.bridges, 0);
        assert_eq!(view.outcome, RepairOutcome::Partial { unreachable: vec![vec![2]] });
    }

    #[test]
    fn depleted_relay_forces_a_detour() {
        let mut network = two_triangles(10.0);
        network.node_mut(6).battery = 0.0;
        let view = select_dominating_set(&network, &ProgressReporter::disabled());
        assert!(!view.contains(6));
        assert!(matches!(view.outcome, RepairOutcome::Partial { .. }));
    }
}
