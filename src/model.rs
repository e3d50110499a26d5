//! Road network model consumed by the route planner
//!
//! Node coordinates are normalized to the unit square, [`RouteModel::metric_scale`]
//! converts distances in that space to meters.
use std::{fmt::Display, path::Path, time::Instant};

use fs_err::File;
use human_repr::{HumanCount, HumanDuration};
use itertools::Itertools;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::common::{dist, RoadnavError, RoadnavResult};

pub type NodeId = u32;

pub(crate) type KdTree = sif_kdtree::KdTree<GraphPoint, Box<[GraphPoint]>>;

/// Snapshot of a graph node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub x: f32,
    pub y: f32,
}

impl Node {
    pub const fn pos(&self) -> [f32; 2] {
        [self.x, self.y]
    }

    pub fn distp(&self, other: &Self) -> f32 {
        dist(&self.pos(), &other.pos())
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} ({:.4}/{:.4})", self.id, self.x, self.y)
    }
}

/// Graph interface required by [`crate::route::RoutePlanner`]
pub trait RouteModel {
    /// Number of nodes in the graph
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of node `id`
    fn node(&self, id: NodeId) -> Option<Node>;

    /// Symmetric distance between two nodes in native units
    fn distance(&self, a: NodeId, b: NodeId) -> f32;

    /// Closest node to a point given in fractional (0.0-1.0) coordinates
    fn find_closest_node(&self, x: f32, y: f32) -> RoadnavResult<NodeId>;

    /// Neighbors of `id`, discovered on first access.
    ///
    /// Must be idempotent, repeated calls return the same set.
    fn populate_neighbors(&self, id: NodeId) -> &[NodeId];

    /// Conversion factor from native distance units to meters
    fn metric_scale(&self) -> f32;
}

/// Point stored in the KD-Tree used for nearest node queries
#[derive(Debug, Clone, Copy)]
pub(crate) struct GraphPoint {
    id: NodeId,
    pos: [f32; 2],
}

impl sif_kdtree::Object for GraphPoint {
    type Point = [f32; 2];

    fn position(&self) -> &Self::Point {
        &self.pos
    }
}

/// On-disk representation of a [`RoadGraph`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphData {
    pub nodes: Vec<[f32; 2]>,
    #[serde(default)]
    pub ways: Vec<Vec<NodeId>>,
    #[serde(default = "default_metric_scale")]
    pub metric_scale: f32,
}

const fn default_metric_scale() -> f32 {
    1.0
}

/// In-memory road network.
///
/// Roads are stored as ways (ordered node sequences), two nodes are adjacent
/// when they follow each other on some way. Adjacency lists are built lazily
/// the first time a node's neighbors are requested.
#[derive(Deserialize)]
#[serde(try_from = "GraphData")]
pub struct RoadGraph {
    nodes: Vec<Node>,
    ways: Vec<Vec<NodeId>>,
    node_ways: Vec<Vec<usize>>,
    neighbors: Vec<OnceCell<Box<[NodeId]>>>,
    tree: KdTree,
    metric_scale: f32,
}

impl std::fmt::Debug for RoadGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tree = format!("<Tree with {} nodes>", self.tree.len());
        let populated =
            self.neighbors.iter().filter(|n| n.get().is_some()).count();
        f.debug_struct("RoadGraph")
            .field("nodes", &self.nodes.len())
            .field("ways", &self.ways.len())
            .field("populated", &populated)
            .field("tree", &tree)
            .field("metric_scale", &self.metric_scale)
            .finish()
    }
}

impl Serialize for RoadGraph {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        GraphData::from(self).serialize(serializer)
    }
}

impl From<&RoadGraph> for GraphData {
    fn from(graph: &RoadGraph) -> Self {
        Self {
            nodes: graph.nodes.iter().map(Node::pos).collect(),
            ways: graph.ways.clone(),
            metric_scale: graph.metric_scale,
        }
    }
}

impl TryFrom<GraphData> for RoadGraph {
    type Error = RoadnavError;

    fn try_from(data: GraphData) -> RoadnavResult<Self> {
        let GraphData { nodes, ways, metric_scale } = data;
        let nodes = nodes
            .into_iter()
            .enumerate()
            .map(|(id, [x, y])| {
                let id = NodeId::try_from(id).map_err(|e| {
                    RoadnavError::Internal(format!("too many nodes: {e}"))
                })?;
                if !(x.is_finite() && y.is_finite()) {
                    return Err(RoadnavError::InvalidCoordinate { x, y });
                }
                Ok(Node { id, x, y })
            })
            .collect::<RoadnavResult<Vec<Node>>>()?;
        let mut node_ways = vec![Vec::new(); nodes.len()];
        for (way_idx, way) in ways.iter().enumerate() {
            for &node in way {
                let Some(entry) = node_ways.get_mut(node as usize) else {
                    return Err(RoadnavError::InvalidWay { way: way_idx, node });
                };
                if entry.last() != Some(&way_idx) {
                    entry.push(way_idx);
                }
            }
        }
        if !(metric_scale.is_finite() && metric_scale > 0.0) {
            return Err(RoadnavError::Internal(format!(
                "invalid metric scale: {metric_scale}"
            )));
        }
        let points: Box<[GraphPoint]> = nodes
            .iter()
            .map(|n| GraphPoint { id: n.id, pos: n.pos() })
            .collect();
        let neighbors = nodes.iter().map(|_| OnceCell::new()).collect();
        Ok(Self {
            tree: KdTree::new(points),
            neighbors,
            node_ways,
            ways,
            nodes,
            metric_scale,
        })
    }
}

impl RoadGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    /// Load graph from a JSON file (see [`GraphData`])
    pub fn load<P: AsRef<Path>>(path: P) -> RoadnavResult<Self> {
        let path = path.as_ref();
        let t_load = Instant::now();
        info!("Loading {}", path.display());
        let reader = std::io::BufReader::new(File::open(path)?);
        let data: GraphData = serde_json::from_reader(reader)?;
        let graph = Self::try_from(data)?;
        info!(
            "{} nodes, {} ways loaded in {:.2}",
            graph.nodes.len().human_count_bare(),
            graph.ways.len().human_count_bare(),
            t_load.elapsed().human_duration()
        );
        Ok(graph)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn ways(&self) -> &[Vec<NodeId>] {
        &self.ways
    }

    fn discover_neighbors(&self, id: NodeId) -> Box<[NodeId]> {
        let Some(way_ids) = self.node_ways.get(id as usize) else {
            return Box::default();
        };
        way_ids
            .iter()
            .filter_map(|&w| self.ways.get(w))
            .flat_map(|way| {
                way.iter().tuple_windows().filter_map(move |(&a, &b)| {
                    if a == id {
                        Some(b)
                    } else if b == id {
                        Some(a)
                    } else {
                        None
                    }
                })
            })
            .filter(|&n| n != id)
            .sorted_unstable()
            .dedup()
            .collect()
    }
}

impl RouteModel for RoadGraph {
    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, id: NodeId) -> Option<Node> {
        self.nodes.get(id as usize).copied()
    }

    /// Unknown node ids are infinitely far away
    fn distance(&self, a: NodeId, b: NodeId) -> f32 {
        match (self.nodes.get(a as usize), self.nodes.get(b as usize)) {
            (Some(a), Some(b)) => a.distp(b),
            _ => f32::INFINITY,
        }
    }

    fn find_closest_node(&self, x: f32, y: f32) -> RoadnavResult<NodeId> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(RoadnavError::InvalidCoordinate { x, y });
        }
        let point = self.tree.nearest(&[x, y]).ok_or(RoadnavError::EmptyGraph)?;
        let d = dist(&point.pos, &[x, y]);
        if d > 0.1 {
            let d = (d * self.metric_scale).human_count("m");
            warn!("Closest node to {x}/{y} is {d} away");
        }
        Ok(point.id)
    }

    fn populate_neighbors(&self, id: NodeId) -> &[NodeId] {
        match self.neighbors.get(id as usize) {
            Some(cell) => cell.get_or_init(|| self.discover_neighbors(id)),
            None => &[],
        }
    }

    fn metric_scale(&self) -> f32 {
        self.metric_scale
    }
}

/// Incremental [`RoadGraph`] construction
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    data: GraphData,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self {
            data: GraphData {
                metric_scale: default_metric_scale(),
                ..Default::default()
            },
        }
    }
}

impl GraphBuilder {
    pub fn add_node(&mut self, x: f32, y: f32) -> NodeId {
        self.data.nodes.push([x, y]);
        NodeId::try_from(self.data.nodes.len() - 1).unwrap_or(NodeId::MAX)
    }

    pub fn add_way(&mut self, nodes: &[NodeId]) -> &mut Self {
        self.data.ways.push(nodes.to_vec());
        self
    }

    pub fn metric_scale(&mut self, scale: f32) -> &mut Self {
        self.data.metric_scale = scale;
        self
    }

    pub fn build(&self) -> RoadnavResult<RoadGraph> {
        RoadGraph::try_from(self.data.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cross() -> RoadnavResult<RoadGraph> {
        // 1
        // |
        // 0--2--3
        // |
        // 4
        let mut b = RoadGraph::builder();
        let n0 = b.add_node(0.5, 0.5);
        let n1 = b.add_node(0.5, 0.8);
        let n2 = b.add_node(0.7, 0.5);
        let n3 = b.add_node(0.9, 0.5);
        let n4 = b.add_node(0.5, 0.2);
        b.add_way(&[n1, n0, n4]).add_way(&[n0, n2, n3]).metric_scale(250.0);
        b.build()
    }

    #[test]
    fn neighbors_follow_ways() -> RoadnavResult<()> {
        let g = cross()?;
        assert_eq!(g.populate_neighbors(0), &[1, 2, 4]);
        assert_eq!(g.populate_neighbors(2), &[0, 3]);
        assert_eq!(g.populate_neighbors(3), &[2]);
        assert!(g.populate_neighbors(42).is_empty());
        Ok(())
    }

    #[test]
    fn neighbors_are_populated_once() -> RoadnavResult<()> {
        let g = cross()?;
        assert!(g.neighbors[0].get().is_none());
        let first = g.populate_neighbors(0).as_ptr();
        let second = g.populate_neighbors(0).as_ptr();
        assert_eq!(first, second);
        assert!(g.neighbors[0].get().is_some());
        assert!(g.neighbors[3].get().is_none());
        Ok(())
    }

    #[test]
    fn closed_way_has_no_self_loops() -> RoadnavResult<()> {
        let mut b = RoadGraph::builder();
        let a = b.add_node(0.0, 0.0);
        let c = b.add_node(1.0, 0.0);
        let d = b.add_node(0.0, 1.0);
        b.add_way(&[a, c, d, a]).add_way(&[a, a]);
        let g = b.build()?;
        assert_eq!(g.populate_neighbors(a), &[c, d]);
        Ok(())
    }

    #[test]
    fn closest_node() -> RoadnavResult<()> {
        let g = cross()?;
        assert_eq!(g.find_closest_node(0.52, 0.49)?, 0);
        assert_eq!(g.find_closest_node(1.0, 0.5)?, 3);
        assert_eq!(g.find_closest_node(0.5, 0.0)?, 4);
        assert!(matches!(
            g.find_closest_node(f32::NAN, 0.0),
            Err(RoadnavError::InvalidCoordinate { .. })
        ));
        Ok(())
    }

    #[test]
    fn empty_graph_has_no_closest_node() -> RoadnavResult<()> {
        let g = RoadGraph::builder().build()?;
        assert!(g.is_empty());
        assert!(matches!(
            g.find_closest_node(0.5, 0.5),
            Err(RoadnavError::EmptyGraph)
        ));
        Ok(())
    }

    #[test]
    fn distance_and_scale() -> RoadnavResult<()> {
        let g = cross()?;
        assert!((g.distance(0, 3) - 0.4).abs() < 1e-6);
        assert_eq!(g.distance(0, 3), g.distance(3, 0));
        assert_eq!(g.distance(0, 99), f32::INFINITY);
        assert_eq!(g.metric_scale(), 250.0);
        Ok(())
    }

    #[test]
    fn rejects_unknown_way_nodes() {
        let mut b = RoadGraph::builder();
        let a = b.add_node(0.0, 0.0);
        b.add_way(&[a, 7]);
        assert!(matches!(
            b.build(),
            Err(RoadnavError::InvalidWay { way: 0, node: 7 })
        ));
    }

    #[test]
    fn json_fixture() -> RoadnavResult<()> {
        let g: RoadGraph = serde_json::from_str(
            r#"{"nodes": [[0.0, 0.0], [0.5, 0.0]], "ways": [[0, 1]], "metric_scale": 10.0}"#,
        )?;
        assert_eq!(g.len(), 2);
        assert_eq!(g.populate_neighbors(1), &[0]);
        assert_eq!(g.metric_scale(), 10.0);
        let json = serde_json::to_value(&g)?;
        assert_eq!(json["ways"], serde_json::json!([[0, 1]]));

        let res: Result<RoadGraph, _> =
            serde_json::from_str(r#"{"nodes": [[0.0, 0.0]], "ways": [[0, 3]]}"#);
        assert!(res.is_err());
        Ok(())
    }
}
