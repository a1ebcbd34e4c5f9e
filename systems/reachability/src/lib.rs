#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Time-annotated breadth-first reachability search.
//!
//! The search walks outward from an origin one hop at a time, attaching to
//! every tile the best and worst case arrival time, and drops tiles the
//! safety oracle rejects for that arrival window. It is lazy: callers pull
//! as many tiles as they need and the traversal stops there.

use std::collections::VecDeque;

use blastgrid_core::{Direction, Position, TimeBounds, Tuning};
use blastgrid_world::{HazardZone, SafetyOracle};
use tracing::trace;

/// Parameters shared by every node of one search.
#[derive(Clone, Copy, Debug)]
pub struct SearchParams<'h> {
    now: f64,
    start: TimeBounds,
    extra_buffer: f64,
    walkable_only: bool,
    hypothetical: &'h [HazardZone],
    step_min: f64,
    step_max: f64,
}

impl<'h> SearchParams<'h> {
    /// Walkable search starting at `now` with zero start bounds, no dwell
    /// buffer and no hypothetical devices.
    #[must_use]
    pub fn new(now: f64, tuning: &Tuning) -> Self {
        Self {
            now,
            start: TimeBounds::ZERO,
            extra_buffer: 0.0,
            walkable_only: true,
            hypothetical: &[],
            step_min: tuning.step_min_secs,
            step_max: tuning.step_max_secs,
        }
    }

    /// Seeds the origin with `start` bounds, for searches that continue a
    /// path already travelled.
    #[must_use]
    pub fn starting_after(mut self, start: TimeBounds) -> Self {
        self.start = start;
        self
    }

    /// Stretches every safety window by `seconds` of dwell time.
    #[must_use]
    pub fn with_dwell(mut self, seconds: f64) -> Self {
        self.extra_buffer = seconds;
        self
    }

    /// Checks every node against `hypothetical` devices as well.
    #[must_use]
    pub fn with_hypothetical(mut self, hypothetical: &'h [HazardZone]) -> Self {
        self.hypothetical = hypothetical;
        self
    }

    /// Lets the search cross tiles that are not open.
    #[must_use]
    pub fn across_any_terrain(mut self) -> Self {
        self.walkable_only = false;
        self
    }
}

/// A tile reached by the search together with how it was reached.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchNode {
    /// Tile reached.
    pub position: Position,
    /// Number of hops from the origin.
    pub depth: u32,
    /// Arrival time bounds, measured from the search's `now`.
    pub bounds: TimeBounds,
    /// Steps leading from the origin to the tile.
    pub path: Vec<Direction>,
    /// Origin the search started from.
    pub root: Position,
}

/// Lazy breadth-first traversal yielding safe tiles nearest first.
#[derive(Debug)]
pub struct ReachabilitySearch<'a> {
    oracle: SafetyOracle<'a>,
    params: SearchParams<'a>,
    columns: usize,
    visited: Vec<bool>,
    frontier: VecDeque<SearchNode>,
}

impl<'a> ReachabilitySearch<'a> {
    /// Starts a new search at `origin`.
    ///
    /// An origin outside the grid produces an empty search.
    #[must_use]
    pub fn new(oracle: SafetyOracle<'a>, origin: Position, params: SearchParams<'a>) -> Self {
        let grid = oracle.grid();
        let columns = usize::try_from(grid.columns()).unwrap_or(0);
        let rows = usize::try_from(grid.rows()).unwrap_or(0);
        let mut search = Self {
            oracle,
            params,
            columns,
            visited: vec![false; columns * rows],
            frontier: VecDeque::new(),
        };

        if search.mark_visited(origin) {
            search.frontier.push_back(SearchNode {
                position: origin,
                depth: 0,
                bounds: params.start,
                path: Vec::new(),
                root: origin,
            });
        }
        search
    }

    /// Restricts the search to nodes at most `max_depth` hops away.
    pub fn within_depth(self, max_depth: u32) -> impl Iterator<Item = SearchNode> + 'a {
        self.take_while(move |node| node.depth <= max_depth)
    }

    fn expand(&mut self, node: &SearchNode) {
        let grid = self.oracle.grid();
        for direction in Direction::ALL {
            let next = node.position.step(direction);
            let Some(kind) = grid.kind_at(next) else {
                continue;
            };
            if self.params.walkable_only && !kind.is_open() {
                continue;
            }
            if !self.mark_visited(next) {
                continue;
            }

            let mut path = Vec::with_capacity(node.path.len() + 1);
            path.extend_from_slice(&node.path);
            path.push(direction);
            self.frontier.push_back(SearchNode {
                position: next,
                depth: node.depth + 1,
                bounds: node
                    .bounds
                    .advance(self.params.step_min, self.params.step_max),
                path,
                root: node.root,
            });
        }
    }

    /// Marks `position` visited, returning `false` if it was already visited
    /// or lies off the grid.
    fn mark_visited(&mut self, position: Position) -> bool {
        let Some(index) = index(self.columns, position) else {
            return false;
        };
        if !self.oracle.grid().in_bounds(position) {
            return false;
        }
        match self.visited.get_mut(index) {
            Some(slot) if !*slot => {
                *slot = true;
                true
            }
            _ => false,
        }
    }
}

impl Iterator for ReachabilitySearch<'_> {
    type Item = SearchNode;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let node = self.frontier.pop_front()?;
            let window = node
                .bounds
                .interval_from(self.params.now, self.params.extra_buffer);
            if !self
                .oracle
                .is_safe(node.position, Some(window), self.params.hypothetical)
            {
                trace!(position = %node.position, depth = node.depth, "pruned unsafe tile");
                continue;
            }
            self.expand(&node);
            return Some(node);
        }
    }
}

fn index(columns: usize, position: Position) -> Option<usize> {
    let column = usize::try_from(position.x()).ok()?;
    let row = usize::try_from(position.y()).ok()?;
    if column >= columns {
        return None;
    }
    row.checked_mul(columns)?.checked_add(column)
}
