//! Plan/execute cycle state machine.

use blastgrid_core::{CycleError, CycleState};
use tracing::debug;

/// Whether the data the planner reads has been confirmed since the last
/// cycle that moved the agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Readiness {
    /// A map snapshot arrived since the last invalidation.
    pub map_confirmed: bool,
    /// A position update arrived since the last invalidation.
    pub position_confirmed: bool,
}

impl Readiness {
    /// Readiness with both map and position confirmed.
    pub const CONFIRMED: Self = Self {
        map_confirmed: true,
        position_confirmed: true,
    };

    /// Reports whether both inputs are confirmed.
    #[must_use]
    pub const fn is_consistent(self) -> bool {
        self.map_confirmed && self.position_confirmed
    }
}

/// Exclusive owner of the cycle state.
///
/// Only one cycle may run at a time; every transition is checked against
/// the order `Idle -> Planning -> Approaching -> Detonating -> Retreating
/// -> Idle`. Planning may also end straight back in `Idle` when the cycle
/// is skipped.
#[derive(Debug, Default)]
pub struct Cycle {
    state: CycleState,
}

impl Cycle {
    /// Creates an idle cycle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    #[must_use]
    pub const fn state(&self) -> CycleState {
        self.state
    }

    /// Enters `Planning`, refusing while another cycle runs or while the
    /// inputs are unconfirmed.
    pub fn begin_planning(&mut self, readiness: Readiness) -> Result<(), CycleError> {
        if self.state != CycleState::Idle {
            return Err(CycleError::Busy { state: self.state });
        }
        if !readiness.is_consistent() {
            return Err(CycleError::Stale);
        }
        self.state = CycleState::Planning;
        debug!("cycle planning");
        Ok(())
    }

    /// Moves to `next` if it directly follows the current phase.
    pub fn advance(&mut self, next: CycleState) -> Result<(), CycleError> {
        use CycleState::{Approaching, Detonating, Idle, Planning, Retreating};

        let legal = matches!(
            (self.state, next),
            (Planning, Approaching | Idle)
                | (Approaching, Detonating)
                | (Detonating, Retreating)
                | (Retreating, Idle)
        );
        if !legal {
            return Err(CycleError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(from = ?self.state, to = ?next, "cycle advanced");
        self.state = next;
        Ok(())
    }

    /// Returns to `Idle` from any phase, yielding the phase that was left.
    pub fn abort(&mut self) -> CycleState {
        let previous = self.state;
        self.state = CycleState::Idle;
        if previous != CycleState::Idle {
            debug!(from = ?previous, "cycle aborted");
        }
        previous
    }
}
