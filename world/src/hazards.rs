//! Device hazards and their time-bounded blast geometry.

use std::{borrow::Cow, collections::BTreeMap};

use blastgrid_core::{Direction, Interval, Position, TrailError, Tuning};

use crate::Grid;

/// Set of tiles a device's blast covers, grouped into straight rays.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DangerZone {
    rays: Vec<Vec<Position>>,
}

impl DangerZone {
    /// Casts one ray per direction from `origin`, each stopping before the
    /// first wall or block.
    #[must_use]
    pub fn estimate(grid: &Grid, origin: Position, blast_distance: u32) -> Self {
        let rays = Direction::ALL
            .iter()
            .map(|&direction| {
                grid.cast_ray(origin, direction, blast_distance)
                    .into_tiles()
            })
            .collect();
        Self { rays }
    }

    /// Builds the zone from authoritative fire trails, one straight line per
    /// end point. Ends must lie on the grid within `reach` tiles.
    pub fn from_trails(
        grid: &Grid,
        origin: Position,
        trail_ends: &[Position],
        reach: u32,
    ) -> Result<Self, TrailError> {
        let rays = trail_ends
            .iter()
            .map(|&end| trail(grid, origin, end, reach))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rays })
    }

    /// Reports whether the blast reaches `position`.
    #[must_use]
    pub fn covers(&self, position: Position) -> bool {
        self.rays.iter().any(|ray| ray.contains(&position))
    }

    /// Iterates every covered tile.
    pub fn tiles(&self) -> impl Iterator<Item = Position> + '_ {
        self.rays.iter().flatten().copied()
    }
}

fn trail(
    grid: &Grid,
    origin: Position,
    end: Position,
    reach: u32,
) -> Result<Vec<Position>, TrailError> {
    let direction = if origin.x() == end.x() {
        if end.y() < origin.y() {
            Direction::Up
        } else {
            Direction::Down
        }
    } else if origin.y() == end.y() {
        if end.x() < origin.x() {
            Direction::Left
        } else {
            Direction::Right
        }
    } else {
        return Err(TrailError::MalformedTrail {
            device: origin,
            end,
        });
    };

    let length = origin.manhattan_distance(end);
    if length > reach || !grid.in_bounds(end) {
        return Err(TrailError::OutOfReach {
            device: origin,
            end,
            reach,
        });
    }
    Ok((1..=length as i32)
        .map(|step| origin.offset(direction, step))
        .collect())
}

/// Cached-or-stale blast geometry of a single device.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Geometry {
    Stale,
    Estimated(DangerZone),
    Finalized(DangerZone),
}

/// A placed device together with its deadline and danger zone.
#[derive(Clone, Debug, PartialEq)]
pub struct HazardZone {
    position: Position,
    deadline: f64,
    geometry: Geometry,
    blast_distance: u32,
    danger_lead: f64,
    danger_tail: f64,
}

impl HazardZone {
    /// Creates a device whose geometry is estimated on first use.
    #[must_use]
    pub fn new(position: Position, deadline: f64, tuning: &Tuning) -> Self {
        Self {
            position,
            deadline,
            geometry: Geometry::Stale,
            blast_distance: tuning.blast_distance,
            danger_lead: tuning.danger_lead_secs,
            danger_tail: tuning.danger_tail_secs,
        }
    }

    /// Creates a device the planner only imagines, with geometry estimated
    /// up front so read-only safety checks never recompute it.
    #[must_use]
    pub fn hypothetical(position: Position, deadline: f64, grid: &Grid, tuning: &Tuning) -> Self {
        let mut zone = Self::new(position, deadline, tuning);
        let _ = zone.estimate(grid);
        zone
    }

    /// Placement position of the device.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Absolute second at which the device detonates.
    #[must_use]
    pub const fn deadline(&self) -> f64 {
        self.deadline
    }

    /// Moves the detonation deadline, keeping the geometry.
    pub fn set_deadline(&mut self, deadline: f64) {
        self.deadline = deadline;
    }

    /// Reports whether the geometry came from an authoritative fire report.
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        matches!(self.geometry, Geometry::Finalized(_))
    }

    /// Reports whether the geometry must be re-estimated before use.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self.geometry, Geometry::Stale)
    }

    /// Cached geometry, if any.
    #[must_use]
    pub fn zone(&self) -> Option<&DangerZone> {
        match &self.geometry {
            Geometry::Stale => None,
            Geometry::Estimated(zone) | Geometry::Finalized(zone) => Some(zone),
        }
    }

    /// Window during which the device can hurt anything in its zone.
    #[must_use]
    pub fn danger_interval(&self) -> Interval {
        Interval::new(
            self.deadline - self.danger_lead,
            self.deadline + self.danger_tail,
        )
    }

    /// Computes and caches the estimated geometry if it is stale.
    ///
    /// Finalized and already estimated geometry is returned unchanged.
    pub fn estimate(&mut self, grid: &Grid) -> &DangerZone {
        if self.is_stale() {
            self.geometry = Geometry::Estimated(DangerZone::estimate(
                grid,
                self.position,
                self.blast_distance,
            ));
        }
        match &self.geometry {
            Geometry::Estimated(zone) | Geometry::Finalized(zone) => zone,
            Geometry::Stale => unreachable!("geometry estimated above"),
        }
    }

    /// Replaces the geometry with authoritative fire trails.
    ///
    /// Every end point is validated before anything changes, so a malformed
    /// trail leaves the previous geometry in place.
    pub fn finalize(&mut self, trail_ends: &[Position], grid: &Grid) -> Result<(), TrailError> {
        let zone = DangerZone::from_trails(grid, self.position, trail_ends, self.blast_distance)?;
        self.geometry = Geometry::Finalized(zone);
        Ok(())
    }

    /// Drops estimated geometry so the next query recomputes it.
    pub fn invalidate(&mut self) {
        if !self.is_finalized() {
            self.geometry = Geometry::Stale;
        }
    }

    /// Reports whether a blast change at `position` can alter this device's
    /// estimated rays.
    #[must_use]
    pub fn is_affected_by(&self, position: Position) -> bool {
        let aligned = position.x() == self.position.x() || position.y() == self.position.y();
        aligned && self.position.manhattan_distance(position) <= self.blast_distance
    }

    /// Reports whether `position` is the device itself or inside its cached
    /// zone. Stale geometry only covers the device tile.
    #[must_use]
    pub fn contains(&self, position: Position) -> bool {
        position == self.position || self.zone().is_some_and(|zone| zone.covers(position))
    }

    /// Reports whether `interval` overlaps the danger window.
    #[must_use]
    pub fn active_during(&self, interval: Interval) -> bool {
        let window = self.danger_interval();
        !(interval.end() < window.start() || interval.start() > window.end())
    }

    /// Safety of `position` during `interval`, caching the estimate if the
    /// geometry had to be computed.
    pub fn is_safe(&mut self, position: Position, interval: Option<Interval>, grid: &Grid) -> bool {
        if interval.is_some_and(|interval| !self.active_during(interval)) {
            return true;
        }
        let _ = self.estimate(grid);
        !self.contains(position)
    }

    /// Read-only variant of [`HazardZone::is_safe`].
    ///
    /// Stale geometry is estimated for this query only and not cached.
    #[must_use]
    pub fn is_safe_in(&self, position: Position, interval: Option<Interval>, grid: &Grid) -> bool {
        if interval.is_some_and(|interval| !self.active_during(interval)) {
            return true;
        }
        if position == self.position {
            return false;
        }
        let zone = match self.zone() {
            Some(zone) => Cow::Borrowed(zone),
            None => Cow::Owned(DangerZone::estimate(
                grid,
                self.position,
                self.blast_distance,
            )),
        };
        !zone.covers(position)
    }
}

/// Live devices keyed by placement position.
#[derive(Clone, Debug, Default)]
pub struct HazardSet {
    entries: BTreeMap<Position, HazardZone>,
}

impl HazardSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a device, returning the one it replaced at the same position.
    pub fn arm(&mut self, zone: HazardZone) -> Option<HazardZone> {
        self.entries.insert(zone.position(), zone)
    }

    /// Device placed at `position`.
    #[must_use]
    pub fn get(&self, position: Position) -> Option<&HazardZone> {
        self.entries.get(&position)
    }

    /// Mutable access to the device placed at `position`, creating it with
    /// `create` when absent.
    pub fn get_or_insert_with<F>(&mut self, position: Position, create: F) -> &mut HazardZone
    where
        F: FnOnce() -> HazardZone,
    {
        self.entries.entry(position).or_insert_with(create)
    }

    /// Removes the device at `position`.
    pub fn remove(&mut self, position: Position) -> Option<HazardZone> {
        self.entries.remove(&position)
    }

    /// Iterates devices in placement-position order.
    pub fn iter(&self) -> impl Iterator<Item = &HazardZone> {
        self.entries.values()
    }

    /// Number of live devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether no device is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Estimates every stale geometry against `grid`.
    pub fn refresh(&mut self, grid: &Grid) {
        for zone in self.entries.values_mut() {
            let _ = zone.estimate(grid);
        }
    }

    /// Marks every estimated geometry stale.
    pub fn invalidate_all(&mut self) {
        for zone in self.entries.values_mut() {
            zone.invalidate();
        }
    }

    /// Marks stale every device whose rays a change at `position` can reach.
    pub fn invalidate_near(&mut self, position: Position) {
        for zone in self.entries.values_mut() {
            if zone.is_affected_by(position) {
                zone.invalidate();
            }
        }
    }
}
