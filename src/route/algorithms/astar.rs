use std::time::Duration;

use human_repr::HumanDuration;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::trace;

use crate::{
    common::{MinFHeap, RoadnavError, RoadnavResult},
    model::{NodeId, RouteModel},
    route::{ExpansionPolicy, Route},
};

/// Per-run search annotations of a node, a node is visited once it has an
/// entry in [`AStar::state`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NodeState {
    pub g: f32,
    pub h: f32,
    pub parent: Option<NodeId>,
    pub expanded: bool,
}

impl NodeState {
    pub fn f(&self) -> f32 {
        self.g + self.h
    }
}

/// Counters collected during one search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    /// Nodes taken from the frontier and expanded
    pub expanded: usize,
    /// Nodes that entered the frontier, including the start node
    pub discovered: usize,
    /// Largest frontier size seen
    pub max_frontier: usize,
    pub elapsed: Duration,
}

impl std::fmt::Display for SearchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self { expanded, discovered, max_frontier, elapsed } = self;
        write!(
            f,
            "{expanded} expanded, {discovered} discovered, max. queue size: {max_frontier}, took {}",
            elapsed.human_duration()
        )
    }
}

/// State of a single A* run over a borrowed model
pub(crate) struct AStar<'m, M: RouteModel + ?Sized> {
    model: &'m M,
    goal: NodeId,
    policy: ExpansionPolicy,
    state: FxHashMap<NodeId, NodeState>,
    frontier: MinFHeap<NodeId>,
    stats: SearchStats,
}

impl<'m, M: RouteModel + ?Sized> AStar<'m, M> {
    pub fn new(model: &'m M, goal: NodeId, policy: ExpansionPolicy) -> Self {
        Self {
            model,
            goal,
            policy,
            state: FxHashMap::default(),
            frontier: MinFHeap::new(),
            stats: SearchStats::default(),
        }
    }

    /// Straight-line distance to the goal
    pub fn heuristic(&self, node: NodeId) -> f32 {
        self.model.distance(node, self.goal)
    }

    pub fn state(&self, node: NodeId) -> Option<&NodeState> {
        self.state.get(&node)
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    pub const fn stats(&self) -> &SearchStats {
        &self.stats
    }

    fn discover(&mut self, node: NodeId, state: NodeState) {
        self.frontier.push(state.f(), node);
        self.state.insert(node, state);
        self.stats.max_frontier =
            self.stats.max_frontier.max(self.frontier.len());
    }

    /// Reset and seed the frontier with `start`
    pub fn start(&mut self, start: NodeId) {
        self.state.clear();
        self.frontier.clear();
        self.stats = SearchStats::default();
        let h = self.heuristic(start);
        self.discover(
            start,
            NodeState { g: 0.0, h, parent: None, expanded: false },
        );
        self.stats.discovered = 1;
    }

    /// Add all unvisited neighbors of `current` to the frontier
    pub fn add_neighbors(&mut self, current: NodeId) {
        let Some(&NodeState { g: g_current, .. }) = self.state.get(&current)
        else {
            return;
        };
        let model = self.model;
        let relax = self.policy == ExpansionPolicy::Relax;
        for &nb in model.populate_neighbors(current) {
            let g = g_current + model.distance(current, nb);
            match self.state.get_mut(&nb) {
                None => {
                    let h = self.heuristic(nb);
                    trace!("#{current} -> #{nb}: g={g}, h={h}");
                    self.discover(
                        nb,
                        NodeState { g, h, parent: Some(current), expanded: false },
                    );
                    self.stats.discovered += 1;
                }
                Some(state) if relax && !state.expanded && g < state.g => {
                    trace!("#{current} -> #{nb}: g={} -> {g}", state.g);
                    state.g = g;
                    state.parent = Some(current);
                    let state = *state;
                    self.discover(nb, state);
                }
                Some(_) => {}
            }
        }
    }

    /// Remove and return the frontier node with the lowest `g + h`
    pub fn next_node(&mut self) -> Option<NodeId> {
        while let Some((_, node)) = self.frontier.pop() {
            let Some(state) = self.state.get_mut(&node) else {
                continue;
            };
            // stale entry left behind by relaxation
            if state.expanded {
                continue;
            }
            state.expanded = true;
            self.stats.expanded += 1;
            return Some(node);
        }
        None
    }

    /// Follow parent links from `goal` back to the start
    pub fn construct_final_path(&self, goal: NodeId) -> RoadnavResult<Route> {
        let mut nodes = vec![];
        let mut seen = FxHashSet::default();
        let mut native_distance = 0.0f32;
        let mut current = goal;
        loop {
            if !seen.insert(current) {
                return Err(RoadnavError::Internal(format!(
                    "Found loop during path reconstruction at node #{current}"
                )));
            }
            nodes.push(
                self.model
                    .node(current)
                    .ok_or(RoadnavError::NodeNotFound(current))?,
            );
            match self.state.get(&current).and_then(|s| s.parent) {
                Some(parent) => {
                    native_distance += self.model.distance(current, parent);
                    current = parent;
                }
                None => break,
            }
        }
        nodes.reverse();
        Ok(Route {
            nodes,
            distance: native_distance * self.model.metric_scale(),
            native_distance,
        })
    }

    /// Run until `goal` is expanded or the frontier is exhausted
    #[cfg(test)]
    pub fn run(&mut self, start: NodeId) -> RoadnavResult<Option<Route>> {
        self.start(start);
        while let Some(current) = self.next_node() {
            if current == self.goal {
                return self.construct_final_path(current).map(Some);
            }
            self.add_neighbors(current);
        }
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::RoadGraph;

    // 0 - 1 - 2
    //     |
    //     3
    fn tee() -> RoadnavResult<RoadGraph> {
        let mut b = RoadGraph::builder();
        let n0 = b.add_node(0.0, 0.5);
        let n1 = b.add_node(0.5, 0.5);
        let n2 = b.add_node(1.0, 0.5);
        let n3 = b.add_node(0.5, 0.0);
        b.add_way(&[n0, n1, n2]).add_way(&[n1, n3]);
        b.build()
    }

    #[test]
    fn start_is_seeded() -> RoadnavResult<()> {
        let g = tee()?;
        let mut search = AStar::new(&g, 2, ExpansionPolicy::default());
        search.start(0);
        let state = search.state(0).copied();
        assert_eq!(
            state,
            Some(NodeState { g: 0.0, h: 1.0, parent: None, expanded: false })
        );
        assert_eq!(search.frontier_len(), 1);
        assert_eq!(search.next_node(), Some(0));
        assert_eq!(search.next_node(), None);
        Ok(())
    }

    #[test]
    fn add_neighbors_annotates_unvisited() -> RoadnavResult<()> {
        let g = tee()?;
        let mut search = AStar::new(&g, 2, ExpansionPolicy::default());
        search.start(0);
        assert_eq!(search.next_node(), Some(0));
        search.add_neighbors(0);
        let s1 = search.state(1).copied();
        assert_eq!(
            s1,
            Some(NodeState { g: 0.5, h: 0.5, parent: Some(0), expanded: false })
        );
        assert_eq!(search.next_node(), Some(1));
        search.add_neighbors(1);
        // 0 is already visited and must not be queued again
        assert_eq!(search.frontier_len(), 2);
        assert_eq!(search.state(0).and_then(|s| s.parent), None);
        assert_eq!(search.state(3).and_then(|s| s.parent), Some(1));
        assert_eq!(search.stats().discovered, 4);
        Ok(())
    }

    #[test]
    fn next_node_picks_lowest_f() -> RoadnavResult<()> {
        let g = tee()?;
        let mut search = AStar::new(&g, 2, ExpansionPolicy::default());
        search.start(0);
        search.next_node();
        search.add_neighbors(0);
        search.next_node();
        search.add_neighbors(1);
        // f(2) = 1.0, f(3) = 1.0 + 0.707
        assert_eq!(search.next_node(), Some(2));
        assert_eq!(search.next_node(), Some(3));
        assert_eq!(search.next_node(), None);
        assert_eq!(search.stats().expanded, 4);
        Ok(())
    }

    #[test]
    fn path_length_matches_goal_cost() -> RoadnavResult<()> {
        let g = tee()?;
        for (start, goal) in [(0, 2), (3, 0), (2, 3), (1, 1)] {
            let mut search = AStar::new(&g, goal, ExpansionPolicy::default());
            let route = search.run(start)?.ok_or("no route".to_owned())?;
            let g_goal = search.state(goal).map(|s| s.g).unwrap_or(f32::NAN);
            assert!((route.native_distance - g_goal).abs() < 1e-5);
            assert_eq!(route.nodes.first().map(|n| n.id), Some(start));
            assert_eq!(route.nodes.last().map(|n| n.id), Some(goal));
        }
        Ok(())
    }

    #[test]
    fn relaxation_updates_parent() -> RoadnavResult<()> {
        // A is expanded before B, but S-B-X is shorter than S-A-X
        let mut b = RoadGraph::builder();
        let s = b.add_node(0.0, 0.5);
        let a = b.add_node(0.3, 0.5);
        let bb = b.add_node(0.2, 0.7);
        let x = b.add_node(0.5, 0.8);
        let goal = b.add_node(1.0, 0.5);
        b.add_way(&[s, a, x, goal]).add_way(&[s, bb, x]);
        let g = b.build()?;

        let mut search = AStar::new(&g, goal, ExpansionPolicy::FirstDiscovery);
        let first = search.run(s)?.ok_or("no route".to_owned())?;
        assert_eq!(search.state(x).and_then(|s| s.parent), Some(a));

        let mut search = AStar::new(&g, goal, ExpansionPolicy::Relax);
        let relaxed = search.run(s)?.ok_or("no route".to_owned())?;
        assert_eq!(search.state(x).and_then(|s| s.parent), Some(bb));

        let ids = |r: &Route| r.nodes.iter().map(|n| n.id).collect::<Vec<_>>();
        assert_eq!(ids(&first), vec![s, a, x, goal]);
        assert_eq!(ids(&relaxed), vec![s, bb, x, goal]);
        assert!(relaxed.native_distance < first.native_distance);
        Ok(())
    }
}
