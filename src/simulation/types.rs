//! Core data structures for the lifetime simulation.
//!
//! Contains:
//! - `Node`, `Edge` and the owning `Network` graph
//! - `Role` and `Route` closed enums
//! - `DominatingView` attached to a network for the current cycle
//! - `CycleResult` and `SimulationClock` used by the cycle driver
//! - `NetworkError` raised when a network is built from malformed input

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Stable node identifier, contiguous from `0` to `node_count - 1`.
pub type NodeId = usize;

/// Battery sentinel carried by sinks, meaning "unlimited energy".
pub const SINK_BATTERY: f64 = -1.0;

/// Minimum number of nodes a network must contain (one sink and one sensor).
pub const MIN_NODES: usize = 2;

/// Simple 2D point in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// Semantic role of a node in the current topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Terminates every route, never consumes energy.
    Sink,
    /// Selected into the dominating set, forwards traffic of its neighbours.
    Relay,
    /// Only sends its own harvested data.
    Leaf,
}

/// Next-hop assignment of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Routing has not run yet for this node.
    Unassigned,
    /// Routes to itself: the root of a tree for sinks, "unreachable" for sensors.
    Own,
    /// Forwards data to the given neighbour.
    Via(NodeId),
}

impl Route {
    /// Next hop of the route, if it leaves the node.
    pub fn next_hop(&self) -> Option<NodeId> {
        match self {
            Route::Via(id) => Some(*id),
            Route::Unassigned | Route::Own => None,
        }
    }
}

/// A sensor or sink of the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub position: Point,
    pub role: Role,
    /// Membership of the current dominating set, kept apart from `role`.
    pub dominating: bool,
    /// Remaining energy. Sinks carry `SINK_BATTERY`.
    pub battery: f64,
    pub route: Route,
}

impl Node {
    /// Create a sink node with unlimited energy.
    pub fn sink(id: NodeId, position: Point) -> Self {
        Node {
            id,
            position,
            role: Role::Sink,
            dominating: false,
            battery: SINK_BATTERY,
            route: Route::Unassigned,
        }
    }

    /// Create a battery powered sensor.
    pub fn sensor(id: NodeId, position: Point, battery: f64) -> Self {
        Node {
            id,
            position,
            role: Role::Leaf,
            dominating: false,
            battery,
            route: Route::Unassigned,
        }
    }

    pub fn is_sink(&self) -> bool {
        self.role == Role::Sink
    }

    /// Sinks are always alive; sensors while they still hold energy.
    pub fn is_alive(&self) -> bool {
        self.is_sink() || self.battery > 0.0
    }

    /// Dominating weight: inverse of the remaining battery, zero for sinks.
    ///
    /// Exhausted sensors weigh `1.0` so that path searches over a stale
    /// snapshot never divide by zero.
    pub fn weight(&self) -> f64 {
        if self.is_sink() {
            0.0
        } else if self.battery <= 0.0 {
            1.0
        } else {
            1.0 / self.battery
        }
    }
}

/// Undirected communication link, stored with `a < b`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub a: NodeId,
    pub b: NodeId,
    /// True while the edge belongs to the routing tree of the dominating set.
    pub dominant: bool,
}

impl Edge {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        Edge { a, b, dominant: false }
    }

    pub fn key(&self) -> (NodeId, NodeId) {
        (self.a, self.b)
    }

    /// The endpoint opposite to `id`.
    pub fn other(&self, id: NodeId) -> NodeId {
        if self.a == id { self.b } else { self.a }
    }
}

/// Normalize an unordered pair to `(min, max)`.
pub fn edge_key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Repair status of a dominating view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RepairOutcome {
    /// Every candidate component was merged into one.
    Connected,
    /// Some components could not be bridged with any alive path.
    Partial { unreachable: Vec<Vec<NodeId>> },
}

/// Dominating subgraph attached to a network for the current cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DominatingView {
    /// Selected nodes, sinks included.
    pub nodes: BTreeSet<NodeId>,
    /// Alive edges induced by `nodes`.
    pub edges: BTreeSet<(NodeId, NodeId)>,
    /// Number of shortest-path bridges added by the repair pass.
    pub bridges: usize,
    pub outcome: RepairOutcome,
}

impl DominatingView {
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }
}

/// Error type for rejected network inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    TooFewNodes(usize),
    DuplicateNode(NodeId),
    NonContiguousIds(NodeId),
    NoSink,
    NoSensor,
    InvalidPosition(NodeId),
    InvalidBattery(NodeId),
    InvalidMaxBattery(f64),
    UnknownEndpoint(NodeId, NodeId),
    SelfLoop(NodeId),
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::TooFewNodes(count) => write!(f, "Network needs at least {} nodes, got {}", MIN_NODES, count),
            NetworkError::DuplicateNode(id) => write!(f, "Duplicate node id {}", id),
            NetworkError::NonContiguousIds(id) => write!(f, "Node ids must be contiguous from 0, missing {}", id),
            NetworkError::NoSink => write!(f, "Network has no sink"),
            NetworkError::NoSensor => write!(f, "Network has no sensor"),
            NetworkError::InvalidPosition(id) => write!(f, "Node {} has a non-finite position", id),
            NetworkError::InvalidBattery(id) => write!(f, "Sensor {} has a negative or non-finite battery", id),
            NetworkError::InvalidMaxBattery(value) => write!(f, "Maximum battery must be positive, got {}", value),
            NetworkError::UnknownEndpoint(a, b) => write!(f, "Edge ({}, {}) references an unknown node", a, b),
            NetworkError::SelfLoop(id) => write!(f, "Edge ({}, {}) is a self loop", id, id),
        }
    }
}

impl std::error::Error for NetworkError {}

/// The sensor network graph owned by one simulation cycle.
///
/// Built only through [`Network::new`], which validates the input. Node
/// positions and the edge set are immutable afterwards; batteries, routes,
/// roles and dominance flags are mutated in place by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    #[serde(skip)]
    adjacency: Vec<Vec<NodeId>>,
    #[serde(skip)]
    edge_index: HashMap<(NodeId, NodeId), usize>,
    max_battery: f64,
    dominating: Option<DominatingView>,
}

impl Network {
    /// Build a validated network.
    ///
    /// # Parameters
    ///
    /// * `nodes` - All nodes, in any order; ids must cover `0..nodes.len()`
    /// * `edges` - Unordered node pairs; duplicates are merged
    /// * `max_battery` - Capacity of a fully charged sensor
    ///
    /// # Returns
    ///
    /// The network with every route unassigned, or the first validation error.
    pub fn new(mut nodes: Vec<Node>, edges: impl IntoIterator<Item = (NodeId, NodeId)>, max_battery: f64) -> Result<Self, NetworkError> {
        if nodes.len() < MIN_NODES {
            return Err(NetworkError::TooFewNodes(nodes.len()));
        }
        if !max_battery.is_finite() || max_battery <= 0.0 {
            return Err(NetworkError::InvalidMaxBattery(max_battery));
        }

        nodes.sort_by_key(|node| node.id);
        for (index, node) in nodes.iter().enumerate() {
            if node.id < index {
                return Err(NetworkError::DuplicateNode(node.id));
            }
            if node.id > index {
                return Err(NetworkError::NonContiguousIds(index));
            }
            if !node.position.x.is_finite() || !node.position.y.is_finite() {
                return Err(NetworkError::InvalidPosition(node.id));
            }
            if !node.is_sink() && (!node.battery.is_finite() || node.battery < 0.0) {
                return Err(NetworkError::InvalidBattery(node.id));
            }
        }
        if !nodes.iter().any(Node::is_sink) {
            return Err(NetworkError::NoSink);
        }
        if nodes.iter().all(Node::is_sink) {
            return Err(NetworkError::NoSensor);
        }

        for node in nodes.iter_mut() {
            node.route = Route::Unassigned;
            node.dominating = false;
            if node.is_sink() {
                node.battery = SINK_BATTERY;
            } else {
                node.role = Role::Leaf;
            }
        }

        let count = nodes.len();
        let mut unique = BTreeSet::new();
        for (a, b) in edges {
            if a >= count || b >= count {
                return Err(NetworkError::UnknownEndpoint(a, b));
            }
            if a == b {
                return Err(NetworkError::SelfLoop(a));
            }
            unique.insert(edge_key(a, b));
        }

        let mut network = Network {
            nodes,
            edges: unique.into_iter().map(|(a, b)| Edge::new(a, b)).collect(),
            adjacency: Vec::new(),
            edge_index: HashMap::new(),
            max_battery,
            dominating: None,
        };
        network.rebuild_index();
        Ok(network)
    }

    /// Recompute adjacency lists and the edge lookup table from `edges`.
    ///
    /// Needed after deserializing a network snapshot.
    pub fn rebuild_index(&mut self) {
        self.adjacency = vec![Vec::new(); self.nodes.len()];
        self.edge_index.clear();
        for (index, edge) in self.edges.iter().enumerate() {
            self.adjacency[edge.a].push(edge.b);
            self.adjacency[edge.b].push(edge.a);
            self.edge_index.insert(edge.key(), index);
        }
        for neighbours in self.adjacency.iter_mut() {
            neighbours.sort_unstable();
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of non-sink nodes.
    pub fn sensor_count(&self) -> usize {
        self.nodes.iter().filter(|node| !node.is_sink()).count()
    }

    pub fn max_battery(&self) -> f64 {
        self.max_battery
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Neighbours of `id` in ascending order.
    pub fn neighbours(&self, id: NodeId) -> &[NodeId] {
        &self.adjacency[id]
    }

    pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.edge_index.contains_key(&edge_key(a, b))
    }

    pub fn sink_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().filter(|node| node.is_sink()).map(|node| node.id).collect()
    }

    /// Ids of sinks and of sensors with remaining energy.
    pub fn alive_ids(&self) -> BTreeSet<NodeId> {
        self.nodes.iter().filter(|node| node.is_alive()).map(|node| node.id).collect()
    }

    /// Weight of the edge `(a, b)` used by shortest paths and spanning trees.
    pub fn edge_weight(&self, a: NodeId, b: NodeId) -> f64 {
        self.nodes[a].weight() + self.nodes[b].weight()
    }

    pub fn dominating(&self) -> Option<&DominatingView> {
        self.dominating.as_ref()
    }

    pub fn set_dominating(&mut self, view: DominatingView) {
        self.dominating = Some(view);
    }

    /// Flag exactly the edges contained in `tree` as dominant.
    pub fn mark_dominant_edges(&mut self, tree: &BTreeSet<(NodeId, NodeId)>) {
        for edge in self.edges.iter_mut() {
            edge.dominant = tree.contains(&edge.key());
        }
    }

    /// Sum of the remaining battery over every sensor.
    pub fn total_sensor_battery(&self) -> f64 {
        self.nodes.iter().filter(|node| !node.is_sink()).map(|node| node.battery).sum()
    }
}

/// Outcome of one full-depletion cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleResult {
    /// Role-rotation interval in rounds; `0.0` keeps the topology fixed.
    pub interval: f64,
    /// Rounds survived before end-of-life.
    pub lifetime: u64,
}

/// Round counters of a simulation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationClock {
    /// Rounds elapsed in the current cycle, reset when a cycle starts.
    pub duration_of_life: u64,
    /// Rounds elapsed across all cycles, never reset.
    pub simulation_time: u64,
}

impl SimulationClock {
    pub fn advance(&mut self, rounds: u64) {
        self.duration_of_life += rounds;
        self.simulation_time += rounds;
    }

    pub fn start_cycle(&mut self) {
        self.duration_of_life = 0;
    }
}
