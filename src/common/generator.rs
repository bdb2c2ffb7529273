//! Random network generation.
//!
//! Positions are drawn with a free-area subdivision: each new node is placed
//! uniformly inside the largest free rectangle, and that rectangle is split
//! into the eight rectangles surrounding a `min_distance` box around the
//! node. Nodes closer than `max_distance` are linked. Disconnected parts are
//! then translated toward the largest component until the graph is connected.

use petgraph::unionfind::UnionFind;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::simulation::geometry::{centroid, distance, distance2, nearest_to};
use crate::simulation::types::{Network, NetworkError, Node, NodeId, Point};

/// Error type for generation failures.
#[derive(Debug)]
pub enum GeneratorError {
    InvalidParameters(String),
    NotConnected(usize),
    Network(NetworkError),
}

impl std::fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorError::InvalidParameters(msg) => write!(f, "Invalid generator parameters: {}", msg),
            GeneratorError::NotConnected(components) => write!(f, "Generated graph still has {} components", components),
            GeneratorError::Network(err) => write!(f, "Generated network is invalid: {}", err),
        }
    }
}

impl std::error::Error for GeneratorError {}

/// Parameters of a generated network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GeneratorParameters {
    /// Total number of nodes, sinks included.
    pub node_count: usize,
    /// Side of the square deployment area.
    pub area_size: f64,
    /// Distance kept free along the area border.
    pub margin: f64,
    /// Indicative minimum distance between two nodes.
    pub min_distance: f64,
    /// Communication range.
    pub max_distance: f64,
    /// Starting battery of every sensor.
    pub battery_capacity: f64,
    /// The first `sink_count` ids are sinks.
    pub sink_count: usize,
    /// Seed of the random source; `None` draws one from the OS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for GeneratorParameters {
    fn default() -> Self {
        GeneratorParameters {
            node_count: 50,
            area_size: 100.0,
            margin: 5.0,
            min_distance: 5.0,
            max_distance: 20.0,
            battery_capacity: 10.0,
            sink_count: 1,
            seed: None,
        }
    }
}

impl GeneratorParameters {
    pub fn validate(&self) -> Result<(), GeneratorError> {
        let invalid = |msg: String| Err(GeneratorError::InvalidParameters(msg));
        if self.node_count < 2 {
            return invalid(format!("node count must be at least 2, got {}", self.node_count));
        }
        if self.sink_count == 0 || self.sink_count >= self.node_count {
            return invalid(format!("sink count must be between 1 and {}, got {}", self.node_count - 1, self.sink_count));
        }
        if !(self.area_size >= 10.0) {
            return invalid(format!("area size must be at least 10, got {}", self.area_size));
        }
        if !(self.margin >= 0.0 && self.margin <= self.area_size / 2.0) {
            return invalid(format!("margin must be between 0 and {}, got {}", self.area_size / 2.0, self.margin));
        }
        if !(self.max_distance > 0.0) || !(self.min_distance >= 0.0) || self.min_distance > self.max_distance {
            return invalid(format!(
                "distances must satisfy 0 <= min ({}) <= max ({}), max > 0",
                self.min_distance, self.max_distance
            ));
        }
        if !(self.battery_capacity > 0.0) || !self.battery_capacity.is_finite() {
            return invalid(format!("battery capacity must be positive, got {}", self.battery_capacity));
        }
        Ok(())
    }
}

/// Axis-aligned free rectangle `(low, high)`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Area {
    low: Point,
    high: Point,
}

impl Area {
    fn surface(&self) -> f64 {
        (self.high.x - self.low.x) * (self.high.y - self.low.y)
    }

    fn is_empty(&self) -> bool {
        self.high.x - self.low.x <= 0.0 || self.high.y - self.low.y <= 0.0
    }
}

/// Generate a connected network with the random source named by `params.seed`.
pub fn generate(params: &GeneratorParameters) -> Result<Network, GeneratorError> {
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    generate_network(params, &mut rng)
}

/// Generate a connected network.
///
/// # Parameters
///
/// * `params` - Validated generation parameters
/// * `rng` - Randomness source; a seeded `StdRng` gives reproducible networks
///
/// # Returns
///
/// The network, or an error when the parameters are invalid or the graph
/// could not be connected.
pub fn generate_network<R: Rng>(params: &GeneratorParameters, rng: &mut R) -> Result<Network, GeneratorError> {
    params.validate()?;

    let mut positions = place_nodes(params, rng);
    connect_components(&mut positions, params.max_distance)?;
    let edges = threshold_edges(&positions, params.max_distance);

    let nodes = positions
        .iter()
        .enumerate()
        .map(|(id, &position)| {
            if id < params.sink_count {
                Node::sink(id, position)
            } else {
                Node::sensor(id, position, params.battery_capacity)
            }
        })
        .collect();
    let network = Network::new(nodes, edges, params.battery_capacity).map_err(GeneratorError::Network)?;
    log::info!("Generated network with {} nodes and {} edges", network.node_count(), network.edges().len());
    Ok(network)
}

/// Free-area subdivision placement.
fn place_nodes<R: Rng>(params: &GeneratorParameters, rng: &mut R) -> Vec<Point> {
    let whole = Area {
        low: Point::new(params.margin, params.margin),
        high: Point::new(params.area_size - params.margin, params.area_size - params.margin),
    };
    let mut free = vec![whole];
    let mut positions = Vec::with_capacity(params.node_count);

    for _ in 0..params.node_count {
        let largest = free
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (index, area)| match best {
                Some((_, surface)) if area.surface() <= surface => best,
                _ => Some((index, area.surface())),
            })
            .map(|(index, _)| index);

        let Some(index) = largest else {
            // Everything is covered: fall back to the whole area.
            positions.push(Point::new(rng.gen_range(whole.low.x..=whole.high.x), rng.gen_range(whole.low.y..=whole.high.y)));
            continue;
        };
        let area = free.swap_remove(index);
        let position = Point::new(rng.gen_range(area.low.x..=area.high.x), rng.gen_range(area.low.y..=area.high.y));
        positions.push(position);

        let a = area.low;
        let d = area.high;
        let b = Point::new((position.x - params.min_distance).max(a.x), (position.y - params.min_distance).max(a.y));
        let c = Point::new((position.x + params.min_distance).min(d.x), (position.y + params.min_distance).min(d.y));
        let pieces = [
            Area { low: Point::new(a.x, c.y), high: Point::new(b.x, d.y) },
            Area { low: Point::new(b.x, c.y), high: Point::new(c.x, d.y) },
            Area { low: Point::new(c.x, c.y), high: Point::new(d.x, d.y) },
            Area { low: Point::new(a.x, b.y), high: Point::new(b.x, c.y) },
            Area { low: Point::new(c.x, b.y), high: Point::new(d.x, c.y) },
            Area { low: Point::new(a.x, a.y), high: Point::new(b.x, b.y) },
            Area { low: Point::new(b.x, a.y), high: Point::new(c.x, b.y) },
            Area { low: Point::new(c.x, a.y), high: Point::new(d.x, b.y) },
        ];
        free.extend(pieces.into_iter().filter(|piece| !piece.is_empty()));
    }
    positions
}

/// Every pair closer than `max_distance`.
fn threshold_edges(positions: &[Point], max_distance: f64) -> Vec<(NodeId, NodeId)> {
    let range2 = max_distance * max_distance;
    let mut edges = Vec::new();
    for (i, a) in positions.iter().enumerate() {
        for (j, b) in positions.iter().enumerate().skip(i + 1) {
            if distance2(a, b) <= range2 {
                edges.push((i, j));
            }
        }
    }
    edges
}

/// Connected components of the threshold graph, largest first.
fn components(positions: &[Point], max_distance: f64) -> Vec<Vec<NodeId>> {
    let mut union_find = UnionFind::<usize>::new(positions.len());
    for (a, b) in threshold_edges(positions, max_distance) {
        union_find.union(a, b);
    }
    let mut groups: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
    for (id, label) in union_find.into_labeling().into_iter().enumerate() {
        groups.entry(label).or_default().push(id);
    }
    let mut components: Vec<Vec<NodeId>> = groups.into_values().collect();
    components.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));
    components
}

/// Translate components toward the largest one until the graph is connected.
///
/// The component nearest to the centroid of the largest one is moved along
/// the vector joining their closest nodes, stopping half a range short so
/// the moved nodes may also link to other neighbours.
fn connect_components(positions: &mut [Point], max_distance: f64) -> Result<(), GeneratorError> {
    let attempts = positions.len() * 4;
    for _ in 0..attempts {
        let components = components(positions, max_distance);
        if components.len() <= 1 {
            return Ok(());
        }
        log::debug!("Generated graph has {} components, translating the nearest one", components.len());

        let largest = &components[0];
        let Some(center) = centroid(largest.iter().map(|&id| &positions[id])) else {
            break;
        };
        let mut nearest = 1;
        let mut nearest_d2 = f64::INFINITY;
        for (index, component) in components.iter().enumerate().skip(1) {
            if let Some(other) = centroid(component.iter().map(|&id| &positions[id])) {
                let d2 = distance2(&center, &other);
                if d2 < nearest_d2 {
                    nearest = index;
                    nearest_d2 = d2;
                }
            }
        }
        let moved = &components[nearest];

        let lookup = |id: NodeId| positions[id];
        let Some(from) = nearest_to(&center, moved, lookup) else {
            break;
        };
        let Some(to) = nearest_to(&positions[from], largest, lookup) else {
            break;
        };

        let dx = positions[to].x - positions[from].x;
        let dy = positions[to].y - positions[from].y;
        let gap = distance(&positions[from], &positions[to]);
        let keep = max_distance * 0.5;
        if gap <= keep {
            break;
        }
        let factor = (gap - keep) / gap;
        for &id in moved {
            positions[id].x += dx * factor;
            positions[id].y += dy * factor;
        }
    }

    let remaining = components(positions, max_distance).len();
    if remaining > 1 {
        return Err(GeneratorError::NotConnected(remaining));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::graph::WeightedGraph;

    fn params() -> GeneratorParameters {
        GeneratorParameters {
            node_count: 40,
            area_size: 200.0,
            margin: 10.0,
            min_distance: 10.0,
            max_distance: 25.0,
            battery_capacity: 5.0,
            sink_count: 1,
            seed: Some(11),
        }
    }

    #[test]
    fn generated_network_is_connected() {
        let network = generate_network(&params(), &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(network.node_count(), 40);
        assert_eq!(network.sink_ids(), vec![0]);
        assert!(network.nodes().iter().skip(1).all(|node| node.battery == 5.0));
        assert_eq!(WeightedGraph::alive(&network).components().len(), 1);
    }

    #[test]
    fn same_seed_gives_the_same_network() {
        let first = generate_network(&params(), &mut StdRng::seed_from_u64(42)).unwrap();
        let second = generate_network(&params(), &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn seeded_parameters_are_reproducible() {
        assert_eq!(generate(&params()).unwrap(), generate(&params()).unwrap());
    }

    #[test]
    fn placement_stays_inside_the_margins() {
        let params = params();
        let positions = place_nodes(&params, &mut StdRng::seed_from_u64(3));
        assert_eq!(positions.len(), params.node_count);
        for position in positions {
            assert!(position.x >= params.margin && position.x <= params.area_size - params.margin);
            assert!(position.y >= params.margin && position.y <= params.area_size - params.margin);
        }
    }

    #[test]
    fn far_clusters_are_pulled_together() {
        let mut positions = vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(100.0, 0.0), Point::new(105.0, 0.0)];
        connect_components(&mut positions, 10.0).unwrap();
        assert_eq!(components(&positions, 10.0).len(), 1);
        assert!((positions[3].x - positions[2].x - 5.0).abs() < 1e-9);
        assert!((positions[2].x - 10.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let cases = [
            GeneratorParameters { node_count: 1, ..params() },
            GeneratorParameters { sink_count: 40, ..params() },
            GeneratorParameters { area_size: 5.0, ..params() },
            GeneratorParameters { margin: 150.0, ..params() },
            GeneratorParameters { min_distance: 30.0, ..params() },
            GeneratorParameters { battery_capacity: 0.0, ..params() },
        ];
        for case in cases {
            assert!(matches!(generate_network(&case, &mut StdRng::seed_from_u64(1)), Err(GeneratorError::InvalidParameters(_))));
        }
    }
}
