mod astar;
pub(crate) use astar::AStar;
pub use astar::SearchStats;
