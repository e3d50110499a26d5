//! Route computation between two points of a road network using A* search
use std::time::{Duration, Instant};

use human_repr::{HumanCount, HumanDuration};
use parse_display::Display;
use serde::{Deserialize, Serialize};
use tracing::*;

use crate::{
    common::{RoadnavError, RoadnavResult},
    event::{Callback, Event, RouteState},
    model::{Node, NodeId, RouteModel},
};

mod mode;
pub use mode::*;

mod algorithms;
use algorithms::AStar;
pub use algorithms::SearchStats;

/// Upper bound of the coordinate range accepted by [`RoutePlanner::new`]
pub const INPUT_SCALE: f32 = 100.0;

/// Computed route, ordered from start to goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub nodes: Vec<Node>,
    /// Length in meters
    pub distance: f32,
    /// Length in model units
    pub native_distance: f32,
}

impl Route {
    pub fn start(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn goal(&self) -> Option<&Node> {
        self.nodes.last()
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id).collect()
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[display(style = "snake_case")]
pub enum SearchStatus {
    Ready,
    Searching,
    Found,
    Exhausted,
}

impl SearchStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Found | Self::Exhausted)
    }
}

pub struct RoutePlanner<'m, M: RouteModel + ?Sized> {
    model: &'m M,
    start: NodeId,
    goal: NodeId,
    policy: ExpansionPolicy,
    status: SearchStatus,
    route: Option<Route>,
    stats: Option<SearchStats>,
    pub callback: Option<Callback>,
    pub status_interval: Duration,
}

impl<M: RouteModel + ?Sized> std::fmt::Debug for RoutePlanner<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let model = format!("<Model with {} nodes>", self.model.len());
        let callback = &self.callback.as_ref().map(|_| "<Callback>");
        f.debug_struct("RoutePlanner")
            .field("model", &model)
            .field("start", &self.start)
            .field("goal", &self.goal)
            .field("policy", &self.policy)
            .field("status", &self.status)
            .field("route", &self.route)
            .field("stats", &self.stats)
            .field("callback", &callback)
            .field("status_interval", &self.status_interval)
            .finish()
    }
}

fn resolve<M: RouteModel + ?Sized>(
    model: &M,
    x: f32,
    y: f32,
) -> RoadnavResult<NodeId> {
    if !(x.is_finite() && y.is_finite()) {
        return Err(RoadnavError::InvalidCoordinate { x, y });
    }
    let range = 0.0..=INPUT_SCALE;
    if !(range.contains(&x) && range.contains(&y)) {
        warn!("Coordinate {x}/{y} is outside of the 0-{INPUT_SCALE} range");
    }
    if model.is_empty() {
        return Err(RoadnavError::EmptyGraph);
    }
    model.find_closest_node(x / INPUT_SCALE, y / INPUT_SCALE)
}

impl<'m, M: RouteModel + ?Sized> RoutePlanner<'m, M> {
    /// Create a planner between the nodes closest to the given points,
    /// coordinates range from 0 to [`INPUT_SCALE`]
    pub fn new(
        model: &'m M,
        start_x: f32,
        start_y: f32,
        end_x: f32,
        end_y: f32,
    ) -> RoadnavResult<Self> {
        let start = resolve(model, start_x, start_y)?;
        let goal = resolve(model, end_x, end_y)?;
        Self::from_nodes(model, start, goal)
    }

    pub fn from_nodes(
        model: &'m M,
        start: NodeId,
        goal: NodeId,
    ) -> RoadnavResult<Self> {
        let start_node =
            model.node(start).ok_or(RoadnavError::NodeNotFound(start))?;
        let goal_node =
            model.node(goal).ok_or(RoadnavError::NodeNotFound(goal))?;
        info!("Routing from {start_node} to {goal_node}");
        let default_callback: Callback = Box::new(move |event: &Event| {
            info!("{event}");
            Ok(())
        });
        Ok(Self {
            model,
            start,
            goal,
            policy: ExpansionPolicy::default(),
            status: SearchStatus::Ready,
            route: None,
            stats: None,
            callback: Some(default_callback),
            status_interval: Duration::from_secs_f64(0.5),
        })
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ExpansionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_callback(&mut self, callback: Callback) {
        self.callback = Some(callback);
    }

    pub const fn start(&self) -> NodeId {
        self.start
    }

    pub const fn goal(&self) -> NodeId {
        self.goal
    }

    pub const fn policy(&self) -> ExpansionPolicy {
        self.policy
    }

    pub const fn status(&self) -> SearchStatus {
        self.status
    }

    /// Computed route, `None` until a route was found
    pub const fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// Route length in meters
    pub fn distance(&self) -> Option<f32> {
        self.route.as_ref().map(|r| r.distance)
    }

    pub const fn stats(&self) -> Option<&SearchStats> {
        self.stats.as_ref()
    }

    fn emit(&self, event: &Event) -> RoadnavResult<()> {
        if let Some(callback) = self.callback.as_ref() {
            callback(event)?;
        }
        Ok(())
    }

    fn search_state(
        &self,
        search: &AStar<'_, M>,
        node: NodeId,
        d_rem: f32,
        d_total: f32,
        t_start: Instant,
    ) -> RouteState {
        let prc_done = if d_total > 0.0 {
            ((d_total - d_rem) * 100f32) / d_total
        } else {
            100.0
        };
        let expanded = search.stats().expanded;
        RouteState {
            policy: self.policy,
            from: self.start,
            to: self.goal,
            node,
            expanded,
            queue_size: search.frontier_len(),
            d_rem,
            d_total,
            prc_done,
            rate: (expanded as f64) / t_start.elapsed().as_secs_f64(),
            msg: None,
        }
    }

    /// Run the search, returns the route if one was found.
    ///
    /// Once the search finished calling this again returns the stored
    /// result.
    pub fn run_search(&mut self) -> RoadnavResult<Option<&Route>> {
        if self.status.is_terminal() {
            debug!("Search already finished: {}", self.status);
            return Ok(self.route.as_ref());
        }
        let t_start = Instant::now();
        let mut t_last = Instant::now();
        let mut search = AStar::new(self.model, self.goal, self.policy);
        self.status = SearchStatus::Searching;
        search.start(self.start);
        let d_total = search.heuristic(self.start);
        let mut d_rem = d_total;
        let mut found = None;
        while let Some(current) = search.next_node() {
            if let Some(state) = search.state(current) {
                d_rem = d_rem.min(state.h);
            }
            if t_last.elapsed() >= self.status_interval {
                t_last = Instant::now();
                let state =
                    self.search_state(&search, current, d_rem, d_total, t_start);
                self.emit(&Event::SearchState(state))?;
            }
            if current == self.goal {
                found = Some(search.construct_final_path(current)?);
                break;
            }
            search.add_neighbors(current);
        }
        let mut stats = *search.stats();
        stats.elapsed = t_start.elapsed();
        debug!("Search statistics: {stats}");
        self.stats = Some(stats);
        let msg = if let Some(route) = found {
            let msg = format!(
                "Route found in {}: {} nodes, {}",
                stats.elapsed.human_duration(),
                route.nodes.len(),
                route.distance.human_count("m")
            );
            self.status = SearchStatus::Found;
            self.route = Some(route);
            msg
        } else {
            self.status = SearchStatus::Exhausted;
            format!(
                "No route from #{} to #{}, search space exhausted after {} nodes",
                self.start, self.goal, stats.expanded
            )
        };
        self.emit(&Event::Message(msg))?;
        Ok(self.route.as_ref())
    }
}
