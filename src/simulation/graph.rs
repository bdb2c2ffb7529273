//! Weighted graph views over a `Network`, backed by petgraph.
//!
//! The engine only ever needs undirected views restricted to a node subset
//! (the alive nodes, or the dominating set). Edge weights are the sum of the
//! two endpoint weights, so paths through low-battery sensors are expensive.

use petgraph::algo::{astar, min_spanning_tree};
use petgraph::data::Element;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::{Bfs, EdgeRef};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::types::{Network, NodeId, edge_key};

/// `NodeIndexMap` stores the `NodeIndex` of every network node present in a view.
pub type NodeIndexMap = HashMap<NodeId, NodeIndex>;

/// Undirected, battery-weighted subgraph of a network.
pub struct WeightedGraph {
    graph: UnGraph<NodeId, f64>,
    indices: NodeIndexMap,
}

impl WeightedGraph {
    /// View over sinks and sensors with remaining energy.
    pub fn alive(network: &Network) -> Self {
        Self::induced(network, &network.alive_ids())
    }

    /// View over `nodes` and every network edge joining two of them.
    pub fn induced(network: &Network, nodes: &BTreeSet<NodeId>) -> Self {
        let mut graph = UnGraph::with_capacity(nodes.len(), 0);
        let mut indices = NodeIndexMap::with_capacity(nodes.len());
        for &id in nodes {
            indices.insert(id, graph.add_node(id));
        }
        for edge in network.edges() {
            if let (Some(&a), Some(&b)) = (indices.get(&edge.a), indices.get(&edge.b)) {
                graph.add_edge(a, b, network.edge_weight(edge.a, edge.b));
            }
        }
        WeightedGraph { graph, indices }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.indices.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Edges of the view as normalized `(min, max)` pairs.
    pub fn edge_keys(&self) -> BTreeSet<(NodeId, NodeId)> {
        self.graph.edge_references().map(|e| edge_key(self.graph[e.source()], self.graph[e.target()])).collect()
    }

    /// Lowest-weight path between two nodes of the view, endpoints included.
    pub fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        let start = *self.indices.get(&from)?;
        let goal = *self.indices.get(&to)?;
        let (_, path) = astar(&self.graph, start, |n| n == goal, |e| *e.weight(), |_| 0.0)?;
        Some(path.into_iter().map(|index| self.graph[index]).collect())
    }

    /// Every node connected to at least one of `sources`.
    pub fn reachable_from(&self, sources: &[NodeId]) -> BTreeSet<NodeId> {
        let mut reached = BTreeSet::new();
        for source in sources {
            let Some(&start) = self.indices.get(source) else {
                continue;
            };
            if reached.contains(source) {
                continue;
            }
            let mut bfs = Bfs::new(&self.graph, start);
            while let Some(index) = bfs.next(&self.graph) {
                reached.insert(self.graph[index]);
            }
        }
        reached
    }

    /// Connected components, each sorted, ordered by their smallest id.
    pub fn components(&self) -> Vec<Vec<NodeId>> {
        let mut union_find = UnionFind::<usize>::new(self.graph.node_count());
        for edge in self.graph.edge_references() {
            union_find.union(edge.source().index(), edge.target().index());
        }
        let mut groups: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
        for (index, label) in union_find.into_labeling().into_iter().enumerate() {
            groups.entry(label).or_default().push(self.graph[NodeIndex::new(index)]);
        }
        let mut components: Vec<Vec<NodeId>> = groups
            .into_values()
            .map(|mut ids| {
                ids.sort_unstable();
                ids
            })
            .collect();
        components.sort_by_key(|ids| ids[0]);
        components
    }

    /// Minimum spanning forest of the view as normalized edge pairs.
    pub fn minimum_spanning_tree(&self) -> BTreeSet<(NodeId, NodeId)> {
        min_spanning_tree(&self.graph)
            .filter_map(|element| match element {
                Element::Edge { source, target, .. } => {
                    Some(edge_key(self.graph[NodeIndex::new(source)], self.graph[NodeIndex::new(target)]))
                }
                Element::Node { .. } => None,
            })
            .collect()
    }
}
