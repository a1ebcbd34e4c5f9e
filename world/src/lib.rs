#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for the Blastgrid agent.

use std::collections::BTreeSet;

use blastgrid_core::{Event, HazardPhase, HazardTiming, Inbound, Position, Tuning};
use tracing::{debug, info, warn};

mod grid;
mod hazards;
mod safety;

pub use grid::{Grid, Ray};
pub use hazards::{DangerZone, HazardSet, HazardZone};
pub use safety::SafetyOracle;

/// Represents the authoritative view the agent holds of the arena.
#[derive(Debug)]
pub struct World {
    tuning: Tuning,
    grid: Grid,
    hazards: HazardSet,
    position: Option<Position>,
    eliminated: bool,
    unhandled_kinds: BTreeSet<String>,
}

impl World {
    /// Creates an empty world that has not yet seen a map or position.
    #[must_use]
    pub fn new(tuning: Tuning) -> Self {
        Self {
            tuning,
            grid: Grid::default(),
            hazards: HazardSet::new(),
            position: None,
            eliminated: false,
            unhandled_kinds: BTreeSet::new(),
        }
    }

    /// Estimates every stale hazard geometry so planning reads warm caches.
    pub fn prepare_for_planning(&mut self) {
        self.hazards.refresh(&self.grid);
    }

    fn apply_hazard(
        &mut self,
        position: Position,
        timing: HazardTiming,
        phase: HazardPhase,
        now: f64,
        out_events: &mut Vec<Event>,
    ) {
        let deadline = timing.deadline(now);
        match phase {
            HazardPhase::Armed => {
                let zone = HazardZone::new(position, deadline, &self.tuning);
                if self.hazards.arm(zone).is_some() {
                    debug!(%position, deadline, "device re-armed");
                }
                out_events.push(Event::HazardArmed { position, deadline });
            }
            HazardPhase::Igniting { trail_ends } => {
                let tuning = &self.tuning;
                let zone = self
                    .hazards
                    .get_or_insert_with(position, || HazardZone::new(position, deadline, tuning));
                zone.set_deadline(deadline);
                match zone.finalize(&trail_ends, &self.grid) {
                    Ok(()) => {
                        debug!(%position, trails = trail_ends.len(), "device geometry finalized");
                        out_events.push(Event::HazardFinalized { position });
                    }
                    Err(reason) => {
                        warn!(%position, %reason, "ignoring malformed fire trail");
                        out_events.push(Event::HazardTrailRejected { position, reason });
                    }
                }
            }
            HazardPhase::Cleared { destroyed } => {
                let _ = self.hazards.remove(position);
                let mut cleared = Vec::with_capacity(destroyed.len());
                for block in destroyed {
                    match self.grid.clear_block(block) {
                        Ok(true) => {
                            self.hazards.invalidate_near(block);
                            cleared.push(block);
                        }
                        Ok(false) => debug!(%block, "reported destroyed tile was not a block"),
                        Err(error) => warn!(%error, "destroyed block outside the grid"),
                    }
                }
                out_events.push(Event::HazardCleared {
                    position,
                    destroyed: cleared,
                });
            }
        }
    }
}

/// Applies the provided inbound message to the world, mutating state
/// deterministically and recording the resulting notifications.
///
/// `now` is the engine clock reading used to resolve relative fuse timings.
pub fn apply(world: &mut World, inbound: Inbound, now: f64, out_events: &mut Vec<Event>) {
    match inbound {
        Inbound::Map { rows } => match Grid::parse(&rows, world.tuning.grid_bound) {
            Ok(grid) => {
                let columns = grid.columns();
                let rows = grid.rows();
                world.grid = grid;
                world.hazards.invalidate_all();
                debug!(columns, rows, "map replaced");
                out_events.push(Event::MapReplaced { columns, rows });
            }
            Err(reason) => {
                warn!(%reason, "rejected map snapshot");
                out_events.push(Event::MapRejected { reason });
            }
        },
        Inbound::SelfPosition { x, y } => {
            let position = Position::from_sub_tile(x, y, world.tuning.position_scale);
            world.position = Some(position);
            world.eliminated = false;
            out_events.push(Event::PositionConfirmed { position });
        }
        Inbound::Hazard {
            position,
            timing,
            phase,
        } => world.apply_hazard(position, timing, phase, now, out_events),
        Inbound::Eliminated => {
            info!("agent eliminated");
            world.eliminated = true;
            world.position = None;
            out_events.push(Event::Eliminated);
        }
        Inbound::Unhandled { kind } => {
            if world.unhandled_kinds.insert(kind.clone()) {
                warn!(%kind, "no handler for message kind");
                out_events.push(Event::UnhandledMessage { kind });
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use blastgrid_core::{Position, Tuning};

    use super::{Grid, HazardSet, SafetyOracle, World};

    /// Tuning constants the world was created with.
    #[must_use]
    pub fn tuning(world: &World) -> &Tuning {
        &world.tuning
    }

    /// Provides read-only access to the current grid.
    #[must_use]
    pub fn grid(world: &World) -> &Grid {
        &world.grid
    }

    /// Provides read-only access to the live devices.
    #[must_use]
    pub fn hazards(world: &World) -> &HazardSet {
        &world.hazards
    }

    /// Last confirmed tile of the agent, if any.
    #[must_use]
    pub fn position(world: &World) -> Option<Position> {
        world.position
    }

    /// Reports whether the agent has been eliminated since its last
    /// position update.
    #[must_use]
    pub fn is_eliminated(world: &World) -> bool {
        world.eliminated
    }

    /// Captures a safety oracle over the current grid and live devices.
    #[must_use]
    pub fn safety_oracle(world: &World) -> SafetyOracle<'_> {
        SafetyOracle::new(&world.grid, &world.hazards)
    }
}
