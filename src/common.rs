//! # Common utlility functions
use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    fmt::Display,
    ops::{Deref, DerefMut},
};

#[cfg(feature = "bin")]
use std::time::Instant;

use color_eyre::eyre;
#[cfg(feature = "bin")]
use human_repr::HumanDuration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
#[cfg(feature = "bin")]
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

use crate::model::NodeId;

/// Log timestamp relative to program start
#[cfg(feature = "bin")]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RelativeTime {
    epoch: Instant,
}

#[cfg(feature = "bin")]
impl Default for RelativeTime {
    fn default() -> Self {
        Self { epoch: Instant::now() }
    }
}

#[cfg(feature = "bin")]
impl FormatTime for RelativeTime {
    fn format_time(&self, w: &mut Writer<'_>) -> core::fmt::Result {
        let duration = format!("{}", self.epoch.elapsed().human_duration());
        write!(w, "{}", duration)
    }
}

/// Min-heap priority queue using f32 as priority
pub struct MinFHeap<T: Ord>(BinaryHeap<(Reverse<F32>, T)>);

impl<T: Ord> MinFHeap<T> {
    /// Create new, empty priority queue
    pub const fn new() -> Self {
        Self(BinaryHeap::new())
    }

    /// push value `item` with priority `w` into queue
    pub fn push(&mut self, w: f32, item: T) {
        self.0.push((Reverse(F32(w)), item));
    }

    /// Remove and return smallest item and priority
    pub fn pop(&mut self) -> Option<(f32, T)> {
        self.0.pop().map(|(Reverse(F32(w)), item)| (w, item))
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl<T: Ord> Default for MinFHeap<T> {
    fn default() -> Self {
        Self(BinaryHeap::new())
    }
}

impl<T: Ord> Deref for MinFHeap<T> {
    type Target = BinaryHeap<(Reverse<F32>, T)>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: Ord> DerefMut for MinFHeap<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T: Ord> Extend<(f32, T)> for MinFHeap<T> {
    fn extend<I: IntoIterator<Item = (f32, T)>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(|(w, v)| (Reverse(F32(w)), v)))
    }
}

/// Roadnav error type
#[derive(Error, Debug)]
pub enum RoadnavError {
    #[error("graph contains no nodes")]
    EmptyGraph,

    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("invalid coordinate {x}/{y}")]
    InvalidCoordinate { x: f32, y: f32 },

    #[error("way {way} references unknown node {node}")]
    InvalidWay { way: usize, node: NodeId },

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error("{0:#}")]
    Other(#[from] eyre::Report),
}

impl std::convert::From<String> for RoadnavError {
    fn from(s: String) -> Self {
        Self::Internal(s)
    }
}

pub type RoadnavResult<T> = Result<T, RoadnavError>;

/// f32 compare wrapper
pub fn fcmp(a: f32, b: f32) -> Ordering {
    match (a, b) {
        (x, y) if x.is_nan() && y.is_nan() => Ordering::Equal,
        (x, _) if x.is_nan() => Ordering::Greater,
        (_, y) if y.is_nan() => Ordering::Less,
        (..) => a.partial_cmp(&b).unwrap_or_else(|| unreachable!()),
    }
}

/// f32 warpper type implementing `Eq` and `Ord`
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct F32(pub f32);

impl Display for F32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl PartialEq for F32 {
    fn eq(&self, other: &Self) -> bool {
        fcmp(self.0, other.0) == std::cmp::Ordering::Equal
    }
}

impl Eq for F32 {}

impl PartialOrd for F32 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for F32 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        fcmp(self.0, other.0)
    }
}

impl Deref for F32 {
    type Target = f32;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for F32 {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[allow(clippy::inline_always)]
pub fn dist2(p1: &[f32; 2], p2: &[f32; 2]) -> f32 {
    p1.iter().zip(p2.iter()).map(|(a, b)| (a - b).powi(2)).sum()
}

#[allow(clippy::inline_always)]
pub fn dist(p1: &[f32; 2], p2: &[f32; 2]) -> f32 {
    dist2(p1, p2).sqrt()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn min_heap_pops_smallest_first() {
        let mut heap = MinFHeap::new();
        heap.extend([(3.0, 'c'), (1.0, 'a'), (2.0, 'b')]);
        heap.push(0.5, 'z');
        let order: Vec<char> =
            std::iter::from_fn(|| heap.pop().map(|(_, v)| v)).collect();
        assert_eq!(order, vec!['z', 'a', 'b', 'c']);
        assert!(heap.is_empty());
    }

    #[test]
    fn nan_sorts_last() {
        let mut vals = vec![F32(f32::NAN), F32(2.0), F32(-1.0)];
        vals.sort();
        assert_eq!(*vals[0], -1.0);
        assert_eq!(*vals[1], 2.0);
        assert!(vals[2].is_nan());
        assert_eq!(F32(f32::NAN), F32(f32::NAN));
    }

    #[test]
    fn euclidean_distance() {
        assert_eq!(dist(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(dist2(&[1.0, 1.0], &[2.0, 3.0]), 5.0);
    }
}
