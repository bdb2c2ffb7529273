//! Small hand-built networks shared by the unit tests.

use super::types::{Network, Node, NodeId, Point};

pub fn p(x: f64, y: f64) -> Point {
    Point { x, y }
}

/// Sink `0` in the middle, `leaves` sensors around it, each linked only to the sink.
pub fn star(leaves: usize, battery: f64) -> Network {
    let mut nodes = vec![Node::sink(0, p(0.0, 0.0))];
    let mut edges = Vec::new();
    for id in 1..=leaves {
        let angle = id as f64 * std::f64::consts::TAU / leaves as f64;
        nodes.push(Node::sensor(id, p(angle.cos(), angle.sin()), battery));
        edges.push((0, id));
    }
    Network::new(nodes, edges, battery.max(1.0)).unwrap()
}

/// Sink `0` followed by a chain of sensors `1..=length`.
pub fn line(length: usize, battery: f64) -> Network {
    let mut nodes = vec![Node::sink(0, p(0.0, 0.0))];
    let mut edges = Vec::new();
    for id in 1..=length {
        nodes.push(Node::sensor(id, p(id as f64, 0.0), battery));
        edges.push((id - 1, id));
    }
    Network::new(nodes, edges, battery.max(1.0)).unwrap()
}

/// Triangle `{0 (sink), 1, 2}` and triangle `{3, 4, 5}` joined only through
/// the chain `2 - 6 - 7 - 3`.
pub fn two_triangles(battery: f64) -> Network {
    let nodes = vec![
        Node::sink(0, p(0.0, 0.0)),
        Node::sensor(1, p(0.0, 2.0), battery),
        Node::sensor(2, p(2.0, 1.0), battery),
        Node::sensor(3, p(8.0, 1.0), battery),
        Node::sensor(4, p(10.0, 0.0), battery),
        Node::sensor(5, p(10.0, 2.0), battery),
        Node::sensor(6, p(4.0, 1.0), battery),
        Node::sensor(7, p(6.0, 1.0), battery),
    ];
    let edges = vec![(0, 1), (0, 2), (1, 2), (2, 6), (6, 7), (7, 3), (3, 4), (3, 5), (4, 5)];
    Network::new(nodes, edges, battery.max(1.0)).unwrap()
}

/// `width x height` lattice with the sink at the `(0, 0)` corner.
pub fn grid(width: usize, height: usize, battery: f64) -> Network {
    let id = |x: usize, y: usize| -> NodeId { y * width + x };
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let position = p(x as f64, y as f64);
            if id(x, y) == 0 {
                nodes.push(Node::sink(0, position));
            } else {
                nodes.push(Node::sensor(id(x, y), position, battery));
            }
            if x + 1 < width {
                edges.push((id(x, y), id(x + 1, y)));
            }
            if y + 1 < height {
                edges.push((id(x, y), id(x, y + 1)));
            }
        }
    }
    Network::new(nodes, edges, battery.max(1.0)).unwrap()
}
