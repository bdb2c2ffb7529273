//! Scene loading, parsing, and validation logic.
//!
//! A scene is the JSON description of a sensor network: node positions,
//! kinds and batteries, plus either an explicit edge list or a connection
//! range from which edges are derived. Scenes are the input boundary of the
//! simulator and are validated before a `Network` is built from them.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::simulation::geometry::distance2;
use crate::simulation::types::{Network, Node as NetworkNode, NodeId, Point};

/// Error type for scene loading failures.
#[derive(Debug)]
pub enum SceneLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for SceneLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            SceneLoadError::ParseError(msg) => write!(f, "Failed to parse JSON: {}", msg),
            SceneLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for SceneLoadError {}

/// Kind of a scene node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Sink,
    Sensor,
}

/// Node structure with position and starting battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub node_id: NodeId,
    pub position: Point,
    pub kind: NodeKind,
    /// Starting battery; sensors default to the scene's `max_battery`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,
}

/// Root structure representing the entire scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Capacity of a fully charged sensor.
    pub max_battery: f64,
    /// Two nodes closer than this are linked when `edges` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_range: Option<f64>,
    /// All nodes present in the scene.
    pub nodes: Vec<Node>,
    /// Explicit undirected links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<(NodeId, NodeId)>>,
}

impl Scene {
    /// Snapshot of a network as a scene with an explicit edge list.
    pub fn from_network(network: &Network) -> Self {
        Scene {
            max_battery: network.max_battery(),
            connection_range: None,
            nodes: network
                .nodes()
                .iter()
                .map(|node| Node {
                    node_id: node.id,
                    position: node.position,
                    kind: if node.is_sink() { NodeKind::Sink } else { NodeKind::Sensor },
                    battery: if node.is_sink() { None } else { Some(node.battery) },
                })
                .collect(),
            edges: Some(network.edges().iter().map(|edge| edge.key()).collect()),
        }
    }

    /// Explicit edges, or every pair within `connection_range`.
    pub fn resolved_edges(&self) -> Vec<(NodeId, NodeId)> {
        if let Some(edges) = &self.edges {
            return edges.clone();
        }
        let Some(range) = self.connection_range else {
            return Vec::new();
        };
        let range2 = range * range;
        let mut edges = Vec::new();
        for (i, a) in self.nodes.iter().enumerate() {
            for b in &self.nodes[i + 1..] {
                if distance2(&a.position, &b.position) <= range2 {
                    edges.push((a.node_id, b.node_id));
                }
            }
        }
        edges
    }

    /// Build the simulation network described by the scene.
    pub fn to_network(&self) -> Result<Network, SceneLoadError> {
        let nodes = self
            .nodes
            .iter()
            .map(|node| match node.kind {
                NodeKind::Sink => NetworkNode::sink(node.node_id, node.position),
                NodeKind::Sensor => NetworkNode::sensor(node.node_id, node.position, node.battery.unwrap_or(self.max_battery)),
            })
            .collect();
        Network::new(nodes, self.resolved_edges(), self.max_battery).map_err(|e| SceneLoadError::ValidationError(e.to_string()))
    }
}

/// Load and parse a scene from a file.
///
/// # Parameters
///
/// * `path` - Path to the scene JSON file
///
/// # Returns
///
/// Parsed and validated Scene or an error.
pub fn load_scene(path: &Path) -> Result<Scene, SceneLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))
        .map_err(|e| SceneLoadError::FileReadError(e.to_string()))?;

    let scene = parse_scene(&data)?;
    log::info!("Loaded scene {} with {} nodes", path.display(), scene.nodes.len());
    Ok(scene)
}

/// Parse and validate a scene from JSON text.
pub fn parse_scene(data: &str) -> Result<Scene, SceneLoadError> {
    let scene: Scene = serde_json::from_str(data)
        .context("Invalid JSON format")
        .map_err(|e| SceneLoadError::ParseError(format!("{:#}", e)))?;

    validate_scene(&scene).map_err(SceneLoadError::ValidationError)?;
    Ok(scene)
}

/// Load a scene file straight into a network.
pub fn load_network(path: &Path) -> Result<Network, SceneLoadError> {
    load_scene(path)?.to_network()
}

/// Write a scene as pretty-printed JSON.
pub fn save_scene(scene: &Scene, path: &Path) -> anyhow::Result<()> {
    let data = serde_json::to_string_pretty(scene).context("Failed to serialize scene")?;
    fs::write(path, data).with_context(|| format!("Failed to write scene {}", path.display()))?;
    Ok(())
}

/// Validate scene configuration.
///
/// # Parameters
///
/// * `scene` - The parsed scene to validate
///
/// # Returns
///
/// `Ok(())` if validation passes, `Err(String)` with error description otherwise.
pub fn validate_scene(scene: &Scene) -> Result<(), String> {
    const MAX_NODES: usize = 10000;

    if scene.nodes.len() < 2 {
        return Err("Scene must contain at least a sink and a sensor".to_string());
    }
    if scene.nodes.len() > MAX_NODES {
        return Err(format!("Node count {} exceeds maximum of {}", scene.nodes.len(), MAX_NODES));
    }
    if !scene.max_battery.is_finite() || scene.max_battery <= 0.0 {
        return Err(format!("Invalid max_battery {}, must be positive", scene.max_battery));
    }

    let mut node_ids = HashSet::new();
    for node in &scene.nodes {
        if !node_ids.insert(node.node_id) {
            return Err(format!("Duplicate node_id found: {}", node.node_id));
        }
    }

    for node in &scene.nodes {
        if let Some(battery) = node.battery {
            if node.kind == NodeKind::Sensor && (!battery.is_finite() || battery < 0.0 || battery > scene.max_battery) {
                return Err(format!(
                    "Node {} battery {} outside range (0 to {})",
                    node.node_id, battery, scene.max_battery
                ));
            }
        }
    }

    if !scene.nodes.iter().any(|node| node.kind == NodeKind::Sink) {
        return Err("Scene must contain at least one sink".to_string());
    }

    match (&scene.edges, scene.connection_range) {
        (None, None) => return Err("Scene needs either 'edges' or 'connection_range'".to_string()),
        (None, Some(range)) if !range.is_finite() || range <= 0.0 => {
            return Err(format!("Invalid connection_range {}, must be positive", range));
        }
        _ => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::Route;

    const SCENE: &str = r#"{
        "max_battery": 10.0,
        "connection_range": 1.5,
        "nodes": [
            { "node_id": 0, "position": { "x": 0.0, "y": 0.0 }, "kind": "sink" },
            { "node_id": 1, "position": { "x": 1.0, "y": 0.0 }, "kind": "sensor" },
            { "node_id": 2, "position": { "x": 2.0, "y": 0.0 }, "kind": "sensor", "battery": 4.0 },
            { "node_id": 3, "position": { "x": 9.0, "y": 9.0 }, "kind": "sensor" }
        ]
    }"#;

    #[test]
    fn range_scene_derives_edges_and_default_batteries() {
        let scene = parse_scene(SCENE).unwrap();
        assert_eq!(scene.resolved_edges(), vec![(0, 1), (1, 2)]);

        let network = scene.to_network().unwrap();
        assert_eq!(network.node(1).battery, 10.0);
        assert_eq!(network.node(2).battery, 4.0);
        assert!(network.node(0).is_sink());
        assert!(network.neighbours(3).is_empty());
        assert_eq!(network.node(3).route, Route::Unassigned);
    }

    #[test]
    fn explicit_edges_take_precedence() {
        let mut scene = parse_scene(SCENE).unwrap();
        scene.edges = Some(vec![(0, 3)]);
        assert_eq!(scene.resolved_edges(), vec![(0, 3)]);
    }

    #[test]
    fn scene_snapshot_round_trips_through_a_network() {
        let network = parse_scene(SCENE).unwrap().to_network().unwrap();
        let snapshot = Scene::from_network(&network);
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored = parse_scene(&json).unwrap().to_network().unwrap();
        assert_eq!(restored, network);
    }

    #[test]
    fn invalid_scenes_are_rejected() {
        let no_links = SCENE.replace("\"connection_range\": 1.5,", "");
        assert!(matches!(parse_scene(&no_links), Err(SceneLoadError::ValidationError(_))));

        let duplicate = SCENE.replace("\"node_id\": 3", "\"node_id\": 2");
        assert!(matches!(parse_scene(&duplicate), Err(SceneLoadError::ValidationError(_))));

        let overcharged = SCENE.replace("\"battery\": 4.0", "\"battery\": 40.0");
        assert!(matches!(parse_scene(&overcharged), Err(SceneLoadError::ValidationError(_))));

        let no_sink = SCENE.replace("\"kind\": \"sink\"", "\"kind\": \"sensor\"");
        assert!(matches!(parse_scene(&no_sink), Err(SceneLoadError::ValidationError(_))));

        assert!(matches!(parse_scene("{ not json"), Err(SceneLoadError::ParseError(_))));
    }

    #[test]
    fn non_contiguous_ids_fail_when_building_the_network() {
        let gap = SCENE.replace("\"node_id\": 3", "\"node_id\": 7");
        let scene = parse_scene(&gap).unwrap();
        assert!(matches!(scene.to_network(), Err(SceneLoadError::ValidationError(_))));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let path = std::env::temp_dir().join("wsn-lifetime-simulator-missing-scene.json");
        assert!(matches!(load_scene(&path), Err(SceneLoadError::FileReadError(_))));
    }
}
