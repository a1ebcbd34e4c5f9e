//! Safety predicate over the live hazard set plus planner hypotheticals.

use blastgrid_core::{Interval, Position};

use crate::{Grid, HazardSet, HazardZone};

/// Answers "is this tile safe during that interval" for one planning pass.
#[derive(Clone, Copy, Debug)]
pub struct SafetyOracle<'a> {
    grid: &'a Grid,
    hazards: &'a HazardSet,
}

impl<'a> SafetyOracle<'a> {
    /// Captures a read-only view over the grid and the live devices.
    #[must_use]
    pub fn new(grid: &'a Grid, hazards: &'a HazardSet) -> Self {
        Self { grid, hazards }
    }

    /// Grid the oracle evaluates blast geometry against.
    #[must_use]
    pub fn grid(&self) -> &'a Grid {
        self.grid
    }

    /// Reports whether `position` is safe from every live and hypothetical
    /// device during `interval`.
    ///
    /// Without an interval every device counts as active.
    #[must_use]
    pub fn is_safe(
        &self,
        position: Position,
        interval: Option<Interval>,
        hypothetical: &[HazardZone],
    ) -> bool {
        self.hazards
            .iter()
            .chain(hypothetical)
            .all(|zone| zone.is_safe_in(position, interval, self.grid))
    }
}
