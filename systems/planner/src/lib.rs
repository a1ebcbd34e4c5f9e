#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Placement planner that ranks detonation tiles by blast value, travel
//! time and the quality of the retreat that follows.

mod cycle;
mod scoring;

use blastgrid_core::{Direction, PlanError, Position, TimeBounds, Tuning};
use blastgrid_system_reachability::{ReachabilitySearch, SearchNode, SearchParams};
use blastgrid_world::{HazardZone, SafetyOracle};
use serde::Serialize;
use tracing::{debug, trace};

pub use cycle::{Cycle, Readiness};
pub use scoring::{potential_blast_score, HeatMap};

/// Penalty that pushes placements without a retreat below every placement
/// with one.
pub const NO_RETREAT_PENALTY: f64 = 100_000.0;

const REACH_BONUS: f64 = 1_000.0;

/// Safe path away from a placement.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Retreat {
    /// Steps from the placement to the endpoint.
    pub path: Vec<Direction>,
    /// Tile the agent waits on while the device burns.
    pub endpoint: Position,
    /// Arrival bounds at the endpoint, measured from planning time.
    pub bounds: TimeBounds,
    /// Follow-up value of the endpoint.
    pub followup_score: f64,
}

impl Retreat {
    /// Number of hops from the placement.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// Best placement found by a planning pass.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Candidate {
    /// Steps from the agent to the placement.
    pub approach: Vec<Direction>,
    /// Arrival bounds at the placement, measured from planning time.
    pub approach_bounds: TimeBounds,
    /// Tile the device is placed on.
    pub placement: Position,
    /// Potential blast score of the placement.
    pub blast_score: u32,
    /// Best retreat, or `None` when every retreat is unsafe.
    pub retreat: Option<Retreat>,
    /// Combined score used for ranking.
    pub score: f64,
}

impl Candidate {
    /// Fuse to request when placing the device, if a retreat exists.
    #[must_use]
    pub fn fuse_secs(&self, tuning: &Tuning) -> Option<f64> {
        self.retreat
            .as_ref()
            .map(|retreat| tuning.fuse_for_retreat(retreat.depth()))
    }
}

/// Scores every reachable placement for a single planning pass.
#[derive(Debug)]
pub struct Planner<'a> {
    oracle: SafetyOracle<'a>,
    tuning: &'a Tuning,
    now: f64,
    heat_map: Option<HeatMap>,
}

impl<'a> Planner<'a> {
    /// Creates a planner reading the world through `oracle` at engine time
    /// `now`.
    #[must_use]
    pub fn new(oracle: SafetyOracle<'a>, tuning: &'a Tuning, now: f64) -> Self {
        let heat_map = tuning
            .heat_map_weight
            .map(|weight| HeatMap::new(oracle.grid(), weight));
        Self {
            oracle,
            tuning,
            now,
            heat_map,
        }
    }

    /// Finds the highest scoring placement within `max_depth` hops of
    /// `origin`.
    ///
    /// Placements are visited nearest first and only a strictly better
    /// score replaces the current best, so ties keep the shallowest one.
    /// A candidate without a retreat is still returned; callers decide
    /// whether to act on it.
    pub fn best_move(&self, origin: Position, max_depth: u32) -> Result<Candidate, PlanError> {
        if !self.oracle.grid().in_bounds(origin) {
            return Err(PlanError::OutOfBounds { position: origin });
        }

        let params = SearchParams::new(self.now, self.tuning);
        let mut best: Option<Candidate> = None;
        let mut evaluated = 0_usize;
        for approach in ReachabilitySearch::new(self.oracle, origin, params).within_depth(max_depth)
        {
            evaluated += 1;
            let candidate = self.evaluate(approach);
            trace!(
                placement = %candidate.placement,
                score = candidate.score,
                "scored placement"
            );
            if best
                .as_ref()
                .map_or(true, |current| candidate.score > current.score)
            {
                best = Some(candidate);
            }
        }

        let best = best.ok_or(PlanError::NoCandidates { position: origin })?;
        debug!(
            %origin,
            evaluated,
            placement = %best.placement,
            score = best.score,
            retreat = best.retreat.is_some(),
            "planning pass finished"
        );
        Ok(best)
    }

    fn evaluate(&self, approach: SearchNode) -> Candidate {
        let grid = self.oracle.grid();
        let placement = approach.position;
        let blast_score = potential_blast_score(grid, placement, self.tuning.blast_distance);
        let deadline = self.now + approach.bounds.latest + self.tuning.planning_fuse_secs;
        let imagined = [HazardZone::hypothetical(
            placement,
            deadline,
            grid,
            self.tuning,
        )];

        let base = f64::from(blast_score) * 10.0 - approach.bounds.latest;
        let mut best: Option<(f64, Retreat)> = None;
        for node in self.retreats(&approach, &imagined) {
            let followup_score = self.followup_score(&node, &imagined);
            let bonus = if blast_score > 0 { REACH_BONUS } else { 0.0 };
            let score = (base - f64::from(node.depth) * 3.0) * 100.0 + followup_score + bonus;
            if best.as_ref().map_or(true, |(current, _)| score > *current) {
                best = Some((
                    score,
                    Retreat {
                        path: node.path,
                        endpoint: node.position,
                        bounds: node.bounds,
                        followup_score,
                    },
                ));
            }
        }

        let (score, retreat) = match best {
            Some((score, retreat)) => (score, Some(retreat)),
            None => (base - NO_RETREAT_PENALTY, None),
        };
        Candidate {
            approach: approach.path,
            approach_bounds: approach.bounds,
            placement,
            blast_score,
            retreat,
            score,
        }
    }

    /// Tiles reachable from the placement that stay safe from the imagined
    /// device while the agent waits on them.
    fn retreats(&self, approach: &SearchNode, imagined: &[HazardZone]) -> Vec<SearchNode> {
        let params = SearchParams::new(self.now, self.tuning)
            .starting_after(approach.bounds)
            .with_hypothetical(imagined);
        let dwell = self.tuning.followup_dwell_secs;
        ReachabilitySearch::new(self.oracle, approach.position, params)
            .filter(|node| {
                let window = node.bounds.interval_from(self.now, dwell);
                self.oracle.is_safe(node.position, Some(window), imagined)
            })
            .take(self.tuning.retreat_candidates)
            .collect()
    }

    fn followup_score(&self, endpoint: &SearchNode, imagined: &[HazardZone]) -> f64 {
        let grid = self.oracle.grid();
        let params = SearchParams::new(self.now, self.tuning)
            .starting_after(endpoint.bounds)
            .with_hypothetical(imagined)
            .with_dwell(self.tuning.followup_dwell_secs);
        let reach: u32 = ReachabilitySearch::new(self.oracle, endpoint.position, params)
            .within_depth(self.tuning.followup_depth)
            .map(|node| potential_blast_score(grid, node.position, self.tuning.blast_distance))
            .sum();
        let heat = self
            .heat_map
            .as_ref()
            .map_or(0.0, |map| map.weighted(endpoint.position));
        f64::from(reach) + heat
    }
}
