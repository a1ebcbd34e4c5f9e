//! Named tuning constants shared by the planning and execution systems.

use serde::Deserialize;

/// Empirically tuned constants that drive hazard timing, search and scoring.
///
/// Every field has a default matching the values the agent was tuned with;
/// configuration files only need to name the fields they override.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tuning {
    /// Largest accepted map edge, in tiles.
    pub grid_bound: u32,
    /// Sub-tile units per tile used by position updates.
    pub position_scale: u32,
    /// Maximum number of tiles a blast ray travels.
    pub blast_distance: u32,
    /// Seconds before the deadline at which a hazard becomes dangerous.
    pub danger_lead_secs: f64,
    /// Seconds after the deadline during which a hazard stays dangerous.
    pub danger_tail_secs: f64,
    /// Fastest time needed to cross one edge.
    pub step_min_secs: f64,
    /// Slowest time needed to cross one edge.
    pub step_max_secs: f64,
    /// Maximum approach depth, in hops, considered by the planner.
    pub max_depth: u32,
    /// Number of retreat tiles scored per placement candidate.
    pub retreat_candidates: usize,
    /// Depth of the follow-up search run from a retreat endpoint.
    pub followup_depth: u32,
    /// Seconds the agent is assumed to linger on a retreat endpoint.
    pub followup_dwell_secs: f64,
    /// Fuse assumed for hypothetical devices while planning.
    pub planning_fuse_secs: f64,
    /// Extra fuse added on top of the retreat travel time.
    pub fuse_margin_secs: f64,
    /// Weight of the wall heat map in the follow-up score; `None` disables it.
    pub heat_map_weight: Option<f64>,
    /// Server-side travel time per tile of a motion command.
    pub step_travel_secs: f64,
    /// Pause added after every motion command.
    pub settle_secs: f64,
    /// Wait between safety re-checks when no step is safe.
    pub backoff_secs: f64,
    /// Time budget for a blocked run before the cycle is aborted.
    pub blocked_timeout_secs: f64,
    /// Interval between readiness checks while waiting for fresh data.
    pub consistency_poll_secs: f64,
    /// Time budget for map and position to be re-confirmed.
    pub consistency_timeout_secs: f64,
    /// Pause after a retreat before the next cycle may begin.
    pub cooldown_secs: f64,
}

impl Tuning {
    /// Fuse to request for a device when the retreat takes `retreat_steps`.
    ///
    /// The danger window of the device opens only after the slowest retreat
    /// has arrived, and the fuse is never shorter than the one the planner
    /// assumed when it accepted the retreat.
    #[must_use]
    pub fn fuse_for_retreat(&self, retreat_steps: usize) -> f64 {
        let travel = retreat_steps as f64 * self.step_max_secs;
        (travel + self.danger_lead_secs + self.fuse_margin_secs).max(self.planning_fuse_secs)
    }

    /// Travel time the server needs for a motion command of `steps` tiles.
    #[must_use]
    pub fn travel_secs(&self, steps: u32) -> f64 {
        f64::from(steps) * self.step_travel_secs + self.settle_secs
    }

    /// Pause after the retreat so the blast can burn out.
    #[must_use]
    pub fn post_retreat_secs(&self, retreat_steps: usize) -> f64 {
        retreat_steps as f64 * self.settle_secs + self.fuse_margin_secs + self.cooldown_secs
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            grid_bound: 49,
            position_scale: 10,
            blast_distance: 10,
            danger_lead_secs: 0.3,
            danger_tail_secs: 2.0,
            step_min_secs: 0.1,
            step_max_secs: 0.2,
            max_depth: 15,
            retreat_candidates: 8,
            followup_depth: 3,
            followup_dwell_secs: 2.0,
            planning_fuse_secs: 2.0,
            fuse_margin_secs: 0.1,
            heat_map_weight: None,
            step_travel_secs: 0.15,
            settle_secs: 0.05,
            backoff_secs: 0.1,
            blocked_timeout_secs: 2.0,
            consistency_poll_secs: 0.05,
            consistency_timeout_secs: 2.0,
            cooldown_secs: 2.0,
        }
    }
}
