#![allow(clippy::cognitive_complexity, clippy::cast_precision_loss)]
#![deny(clippy::unwrap_in_result, clippy::unwrap_used, clippy::expect_used)]
#![warn(
    rust_2018_idioms,
    rust_2021_compatibility,
    arithmetic_overflow,
    nonstandard_style,
    clippy::disallowed_types,
    clippy::nursery,
    // clippy::pedantic
)]
//! A* route planning over road networks
//!
//! ```no_run
//! use roadnav::{model::RoadGraph, route::RoutePlanner};
//!
//! let graph = RoadGraph::load("map.json")?;
//! let mut planner = RoutePlanner::new(&graph, 10.0, 10.0, 90.0, 90.0)?;
//! if let Some(route) = planner.run_search()? {
//!     println!("Distance: {} meters", route.distance);
//! }
//! # Ok::<(), roadnav::common::RoadnavError>(())
//! ```

pub mod common;
pub mod event;
pub mod model;
pub mod route;

pub use common::{RoadnavError, RoadnavResult};
pub use model::{Node, NodeId, RoadGraph, RouteModel};
pub use route::{ExpansionPolicy, Route, RoutePlanner, SearchStatus};
