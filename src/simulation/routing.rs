//! Routing tree construction over the dominating structure.
//!
//! `configure_topology` is the single entry point used by the cycle driver:
//! it selects the dominating set, spans it with a minimum spanning tree,
//! assigns next hops top-down from every sink and finally routes the
//! remaining nodes through their best dominating neighbour.

use std::collections::{BTreeMap, BTreeSet};

use super::dominating::select_dominating_set;
use super::events::ProgressReporter;
use super::graph::WeightedGraph;
use super::types::{DominatingView, Network, NodeId, Role, Route};

/// Recompute dominating set, routes, roles and dominant edges in place.
///
/// Deterministic for a given battery state, so running it twice on an
/// unmodified network yields the same assignment.
///
/// # Parameters
///
/// * `network` - Network to configure; its previous routes are discarded
/// * `progress` - Forwarded to the dominating set repair
pub fn configure_topology(network: &mut Network, progress: &ProgressReporter) {
    let view = select_dominating_set(network, progress);
    let tree = build_routes(network, &view);

    for id in 0..network.node_count() {
        let in_view = view.contains(id);
        let node = network.node_mut(id);
        node.dominating = in_view;
        if !node.is_sink() {
            node.role = if in_view { Role::Relay } else { Role::Leaf };
        }
    }
    network.mark_dominant_edges(&tree);

    let self_routed = network.nodes().iter().filter(|node| !node.is_sink() && node.route == Route::Own).count();
    log::debug!(
        "Topology configured: {} dominating nodes, {} tree edges, {} self-routed sensors",
        view.nodes.len(),
        tree.len(),
        self_routed
    );
    network.set_dominating(view);
}

/// Assign a route to every node of the network.
///
/// # Returns
///
/// The spanning tree edges of the dominating structure.
pub fn build_routes(network: &mut Network, view: &DominatingView) -> BTreeSet<(NodeId, NodeId)> {
    for id in 0..network.node_count() {
        network.node_mut(id).route = Route::Unassigned;
    }

    let tree = WeightedGraph::induced(network, &view.nodes).minimum_spanning_tree();
    let mut tree_adjacency: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for &(a, b) in &tree {
        tree_adjacency.entry(a).or_default().push(b);
        tree_adjacency.entry(b).or_default().push(a);
    }

    let sinks = network.sink_ids();
    for &sink in &sinks {
        network.node_mut(sink).route = Route::Own;
    }
    for &sink in &sinks {
        let mut stack = vec![sink];
        while let Some(current) = stack.pop() {
            let Some(children) = tree_adjacency.get(&current) else {
                continue;
            };
            for &child in children {
                if network.node(child).route == Route::Unassigned {
                    network.node_mut(child).route = Route::Via(current);
                    stack.push(child);
                }
            }
        }
    }

    assign_fallback_routes(network, view);
    tree
}

/// Route every node the tree traversal did not reach.
///
/// Exhausted sensors route to themselves. A node next to a sink routes there.
/// Otherwise the alive dominating neighbour with the most battery whose own
/// route reaches a sink without coming back through the node is used. Passes
/// repeat while they make progress; whatever is left routes to itself.
fn assign_fallback_routes(network: &mut Network, view: &DominatingView) {
    loop {
        let mut progressed = false;
        for id in 0..network.node_count() {
            if network.node(id).route != Route::Unassigned {
                continue;
            }
            if !network.node(id).is_alive() {
                network.node_mut(id).route = Route::Own;
                continue;
            }

            let neighbours = network.neighbours(id);
            let next_hop = neighbours.iter().copied().find(|&n| network.node(n).is_sink()).or_else(|| {
                let mut best: Option<(NodeId, f64)> = None;
                for &candidate in neighbours {
                    let node = network.node(candidate);
                    if !node.is_alive() || !view.contains(candidate) || !reaches_sink_avoiding(network, candidate, id) {
                        continue;
                    }
                    if best.is_none_or(|(_, battery)| node.battery > battery) {
                        best = Some((candidate, node.battery));
                    }
                }
                best.map(|(candidate, _)| candidate)
            });

            if let Some(next_hop) = next_hop {
                network.node_mut(id).route = Route::Via(next_hop);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    for id in 0..network.node_count() {
        if network.node(id).route == Route::Unassigned {
            log::trace!("Node {} has no viable next hop, routing to itself", id);
            network.node_mut(id).route = Route::Own;
        }
    }
}

/// Whether the route chain from `start` ends at a sink without visiting `avoid`.
///
/// The walk is bounded by the node count, so a routing loop answers `false`.
pub fn reaches_sink_avoiding(network: &Network, start: NodeId, avoid: NodeId) -> bool {
    let mut current = start;
    for _ in 0..=network.node_count() {
        if current == avoid {
            return false;
        }
        let node = network.node(current);
        if node.is_sink() {
            return true;
        }
        match node.route {
            Route::Via(next) => current = next,
            Route::Own | Route::Unassigned => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::test_support::{grid, line, star, two_triangles};

    fn configured(mut network: Network) -> Network {
        configure_topology(&mut network, &ProgressReporter::disabled());
        network
    }

    /// Hops needed to reach a sink, `None` when the chain breaks or loops.
    fn hops_to_sink(network: &Network, start: NodeId) -> Option<usize> {
        let mut current = start;
        for hops in 0..=network.node_count() {
            let node = network.node(current);
            if node.is_sink() {
                return Some(hops);
            }
            current = node.route.next_hop()?;
        }
        None
    }

    fn assert_routes_terminate(network: &Network) {
        for node in network.nodes() {
            if node.is_sink() {
                assert_eq!(node.route, Route::Own);
                continue;
            }
            assert_ne!(node.route, Route::Unassigned, "node {} left unassigned", node.id);
            if node.battery > 0.0 && node.route != Route::Own {
                assert_ne!(node.route, Route::Via(node.id));
                let hops = hops_to_sink(network, node.id);
                assert!(hops.is_some_and(|h| h <= network.node_count()), "node {} never reaches a sink", node.id);
            }
        }
    }

    #[test]
    fn star_leaves_route_straight_to_the_sink() {
        let network = configured(star(3, 10.0));
        assert_eq!(network.node(0).route, Route::Own);
        assert!(network.node(0).dominating);
        for id in 1..=3 {
            assert_eq!(network.node(id).route, Route::Via(0));
            assert_eq!(network.node(id).role, Role::Leaf);
            assert!(!network.node(id).dominating);
        }
        assert!(network.edges().iter().all(|edge| !edge.dominant));
    }

    #[test]
    fn two_triangles_route_along_the_bridge() {
        let network = configured(two_triangles(10.0));
        assert_eq!(network.node(2).route, Route::Via(0));
        assert_eq!(network.node(6).route, Route::Via(2));
        assert_eq!(network.node(7).route, Route::Via(6));
        assert_eq!(network.node(3).route, Route::Via(7));
        assert_eq!(network.node(1).route, Route::Via(0));
        assert_eq!(network.node(4).route, Route::Via(3));
        assert_eq!(network.node(5).route, Route::Via(3));

        for id in [2, 3, 6, 7] {
            assert_eq!(network.node(id).role, Role::Relay);
        }
        let dominant: Vec<(NodeId, NodeId)> = network.edges().iter().filter(|edge| edge.dominant).map(|edge| edge.key()).collect();
        assert_eq!(dominant, vec![(0, 2), (2, 6), (3, 7), (6, 7)]);
        assert_routes_terminate(&network);
    }

    #[test]
    fn line_is_repaired_into_a_single_chain() {
        let network = configured(line(4, 10.0));
        assert_eq!(network.node(1).route, Route::Via(0));
        assert_eq!(network.node(2).route, Route::Via(1));
        assert_eq!(network.node(3).route, Route::Via(2));
        assert_eq!(network.node(4).route, Route::Via(3));
        assert_eq!(hops_to_sink(&network, 4), Some(4));
    }

    #[test]
    fn cut_off_sensors_route_to_themselves() {
        let mut network = line(4, 10.0);
        network.node_mut(2).battery = 0.0;
        let network = configured(network);
        assert_eq!(network.node(1).route, Route::Via(0));
        assert_eq!(network.node(2).route, Route::Own);
        assert_eq!(network.node(3).route, Route::Own);
        assert_eq!(network.node(4).route, Route::Own);
        assert_routes_terminate(&network);
    }

    #[test]
    fn every_route_chain_reaches_a_sink_on_a_grid() {
        let mut network = grid(6, 5, 10.0);
        for id in 1..network.node_count() {
            network.node_mut(id).battery = 1.0 + (id * 7 % 11) as f64;
        }
        network.node_mut(8).battery = 0.0;
        network.node_mut(14).battery = 0.0;
        let network = configured(network);
        assert_routes_terminate(&network);
    }

    #[test]
    fn configuring_twice_is_idempotent() {
        let mut network = grid(5, 5, 10.0);
        for id in 1..network.node_count() {
            network.node_mut(id).battery = 2.0 + (id * 5 % 7) as f64;
        }
        let once = configured(network);
        let twice = configured(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn chain_walk_rejects_loops_and_the_avoided_node() {
        let mut network = line(3, 10.0);
        network.node_mut(1).route = Route::Via(0);
        network.node_mut(2).route = Route::Via(1);
        network.node_mut(3).route = Route::Via(2);
        assert!(reaches_sink_avoiding(&network, 3, 99));
        assert!(!reaches_sink_avoiding(&network, 3, 1));

        network.node_mut(1).route = Route::Via(2);
        assert!(!reaches_sink_avoiding(&network, 3, 99));
    }
}
