#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Blastgrid agent.
//!
//! This crate defines the message surface that connects the transport
//! adapters, the authoritative world, and the pure planning systems. The
//! transport delivers [`Inbound`] messages, the world applies them via its
//! `apply` entry point and broadcasts [`Event`] notifications, and the
//! planning/execution systems respond exclusively with [`Command`] values
//! handed to a [`CommandSink`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod tuning;

pub use tuning::Tuning;

/// Location of a single grid tile expressed as column (`x`) and row (`y`).
///
/// Coordinates are signed so that neighbour arithmetic can step off the grid
/// and be rejected by a bounds check instead of wrapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    x: i32,
    y: i32,
}

impl Position {
    /// Creates a new tile position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Zero-based column of the tile.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Zero-based row of the tile.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Returns the neighbouring position one step in `direction`.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        self.offset(direction, 1)
    }

    /// Returns the position `distance` steps away in `direction`.
    #[must_use]
    pub const fn offset(self, direction: Direction, distance: i32) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            x: self.x + dx * distance,
            y: self.y + dy * distance,
        }
    }

    /// Computes the Manhattan distance between two positions.
    #[must_use]
    pub fn manhattan_distance(self, other: Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Converts a sub-tile coordinate pair into the nearest tile.
    ///
    /// A `scale` of zero is treated as one so the conversion never divides by
    /// zero.
    #[must_use]
    pub fn from_sub_tile(x: i64, y: i64, scale: u32) -> Self {
        let scale = f64::from(scale.max(1));
        Self {
            x: (x as f64 / scale).round() as i32,
            y: (y as f64 / scale).round() as i32,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal movement directions understood by the game server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Movement toward decreasing row indices.
    Up,
    /// Movement toward decreasing column indices.
    Left,
    /// Movement toward increasing row indices.
    Down,
    /// Movement toward increasing column indices.
    Right,
}

impl Direction {
    /// All directions in the order every search and ray cast expands them.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Left,
        Direction::Down,
        Direction::Right,
    ];

    /// Column and row delta produced by a single step.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Left => (-1, 0),
            Self::Down => (0, 1),
            Self::Right => (1, 0),
        }
    }

    /// Single-character code used by the arena protocol.
    #[must_use]
    pub const fn wire_code(self) -> char {
        match self {
            Self::Up => 'w',
            Self::Left => 'a',
            Self::Down => 's',
            Self::Right => 'd',
        }
    }
}

/// Kind of terrain occupying a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    /// Walkable floor that blasts pass through.
    Open,
    /// Permanent wall that stops movement and blasts.
    IndestructibleWall,
    /// Block that stops movement and blasts until it is destroyed.
    DestructibleBlock,
}

impl TileKind {
    /// Decodes a single snapshot character.
    ///
    /// `W` is a wall, `M` is a destructible block and every lowercase ASCII
    /// letter is open floor.
    #[must_use]
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'W' => Some(Self::IndestructibleWall),
            'M' => Some(Self::DestructibleBlock),
            c if c.is_ascii_lowercase() => Some(Self::Open),
            _ => None,
        }
    }

    /// Reports whether agents may walk onto the tile.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Best and worst case elapsed seconds needed to reach a tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeBounds {
    /// Earliest possible arrival, in seconds after the search started.
    pub earliest: f64,
    /// Latest possible arrival, in seconds after the search started.
    pub latest: f64,
}

impl TimeBounds {
    /// Bounds of the tile the search starts from.
    pub const ZERO: TimeBounds = TimeBounds {
        earliest: 0.0,
        latest: 0.0,
    };

    /// Creates bounds from explicit arrival times.
    #[must_use]
    pub const fn new(earliest: f64, latest: f64) -> Self {
        Self { earliest, latest }
    }

    /// Bounds after traversing one more edge.
    #[must_use]
    pub fn advance(self, step_min: f64, step_max: f64) -> Self {
        Self {
            earliest: self.earliest + step_min,
            latest: self.latest + step_max,
        }
    }

    /// Absolute interval covered by these bounds when the search began at
    /// `now`, with the upper end stretched by `dwell` seconds.
    #[must_use]
    pub fn interval_from(self, now: f64, dwell: f64) -> Interval {
        Interval::new(now + self.earliest, now + self.latest + dwell)
    }
}

/// Closed interval of absolute engine-clock seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    start: f64,
    end: f64,
}

impl Interval {
    /// Creates an interval, swapping the bounds if they arrive reversed.
    #[must_use]
    pub fn new(start: f64, end: f64) -> Self {
        if end < start {
            Self {
                start: end,
                end: start,
            }
        } else {
            Self { start, end }
        }
    }

    /// First second covered by the interval.
    #[must_use]
    pub const fn start(&self) -> f64 {
        self.start
    }

    /// Last second covered by the interval.
    #[must_use]
    pub const fn end(&self) -> f64 {
        self.end
    }
}

/// Timing information attached to a hazard lifecycle message.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardTiming {
    /// Seconds left on the fuse when the message was received.
    RemainingFuse(f64),
    /// Absolute engine-clock second at which the device detonates.
    Deadline(f64),
}

impl HazardTiming {
    /// Resolves the timing into an absolute deadline.
    #[must_use]
    pub fn deadline(self, now: f64) -> f64 {
        match self {
            Self::RemainingFuse(fuse) => now + fuse,
            Self::Deadline(deadline) => deadline,
        }
    }
}

/// Lifecycle phase reported for a device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HazardPhase {
    /// The device was placed and its fuse is burning.
    Armed,
    /// The device ignited; fire travelled from it to each reported end point.
    Igniting {
        /// End position of every straight fire trail.
        #[serde(default)]
        trail_ends: Vec<Position>,
    },
    /// The fire burned out and the device is gone.
    Cleared {
        /// Blocks the blast destroyed.
        #[serde(default)]
        destroyed: Vec<Position>,
    },
}

/// Messages delivered by the transport collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// Complete map snapshot as newline-delimited rows of tile codes.
    Map {
        /// Raw snapshot text.
        rows: String,
    },
    /// Authoritative position of the agent in sub-tile units.
    SelfPosition {
        /// Horizontal coordinate in sub-tile units.
        x: i64,
        /// Vertical coordinate in sub-tile units.
        y: i64,
    },
    /// Lifecycle update for the device placed at `position`.
    Hazard {
        /// Placement position identifying the device.
        position: Position,
        /// Fuse timing carried by the update.
        timing: HazardTiming,
        /// Lifecycle phase reported by the server.
        phase: HazardPhase,
    },
    /// The agent has been eliminated.
    Eliminated,
    /// A message kind the engine does not understand.
    Unhandled {
        /// Kind reported by the transport.
        kind: String,
    },
}

/// Notifications broadcast by the world after applying inbound messages.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A map snapshot replaced the grid.
    MapReplaced {
        /// Number of columns in the new grid.
        columns: u32,
        /// Number of rows in the new grid.
        rows: u32,
    },
    /// A map snapshot was rejected and the previous grid remains active.
    MapRejected {
        /// Reason the snapshot could not be parsed.
        reason: GridError,
    },
    /// The agent's authoritative position was confirmed.
    PositionConfirmed {
        /// Tile occupied by the agent.
        position: Position,
    },
    /// A device was armed, or re-armed at an occupied position.
    HazardArmed {
        /// Placement position of the device.
        position: Position,
        /// Absolute detonation deadline.
        deadline: f64,
    },
    /// A device's blast geometry became authoritative.
    HazardFinalized {
        /// Placement position of the device.
        position: Position,
    },
    /// An ignite message carried a malformed trail; the estimate was kept.
    HazardTrailRejected {
        /// Placement position of the device.
        position: Position,
        /// Reason the trail was rejected.
        reason: TrailError,
    },
    /// A device burned out and was removed.
    HazardCleared {
        /// Placement position of the device.
        position: Position,
        /// Blocks converted to open floor.
        destroyed: Vec<Position>,
    },
    /// The agent has been eliminated.
    Eliminated,
    /// A message kind was seen for the first time without a handler.
    UnhandledMessage {
        /// Kind reported by the transport.
        kind: String,
    },
}

/// Intents sent to the transport collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Walk `steps` tiles in `direction`.
    Move {
        /// Direction of travel.
        direction: Direction,
        /// Number of tiles to walk; always at least one.
        steps: u32,
    },
    /// Place a device under the agent with the given fuse.
    Detonate {
        /// Fuse duration in seconds.
        fuse_secs: f64,
    },
    /// Ask the server to re-send the agent's position.
    QueryPosition,
    /// Ask the server to re-send the map.
    QueryMap,
}

/// Outcome of one plan/execute cycle.
#[derive(Clone, Debug, PartialEq)]
pub enum CycleReport {
    /// Approach, detonation and retreat all completed.
    Completed {
        /// Tile the device was placed on.
        detonated_at: Position,
        /// Tile the agent retreated to.
        retreated_to: Position,
    },
    /// The cycle ended before any command was sent.
    Skipped(SkipReason),
    /// A motion segment failed part way through the cycle.
    Aborted(AbortReason),
    /// The agent was eliminated while the cycle was running.
    Cancelled,
}

/// Reasons a cycle ends before acting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Another cycle still owns the planner.
    Busy,
    /// Map or position were not confirmed in time.
    StaleData,
    /// The agent's own tile is unsafe, so the search produced nothing.
    NoCandidates,
    /// The best candidate has no safe retreat.
    NoRetreat,
    /// The agent's position lies outside the grid.
    OutOfBounds,
}

/// Reasons a cycle stops part way through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    /// No safe step appeared before the execution timeout.
    Blocked {
        /// Tile the agent was standing on.
        position: Position,
        /// Direction the agent wanted to move in.
        direction: Direction,
    },
}

/// Phase of the plan/execute cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    /// No cycle is running.
    #[default]
    Idle,
    /// The planner is scoring placements.
    Planning,
    /// The agent walks to the chosen placement.
    Approaching,
    /// The detonation command is being sent.
    Detonating,
    /// The agent walks to the retreat endpoint.
    Retreating,
}

/// Receiver for outbound commands and cycle reports.
pub trait CommandSink {
    /// Hands a command to the transport.
    fn send(&self, command: Command);

    /// Reports the outcome of a plan/execute cycle.
    fn report(&self, _report: CycleReport) {}
}

impl<T> CommandSink for &T
where
    T: CommandSink + ?Sized,
{
    fn send(&self, command: Command) {
        (**self).send(command);
    }

    fn report(&self, report: CycleReport) {
        (**self).report(report);
    }
}

/// Errors raised by grid construction and queries.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GridError {
    /// A query addressed a tile outside the grid.
    #[error("position {position} lies outside the {columns}x{rows} grid")]
    OutOfBounds {
        /// Offending position.
        position: Position,
        /// Number of columns in the grid.
        columns: u32,
        /// Number of rows in the grid.
        rows: u32,
    },
    /// The snapshot contained no rows.
    #[error("map snapshot contained no rows")]
    Empty,
    /// A snapshot row had a different length than the first row.
    #[error("row {row} has {found} tiles, expected {expected}")]
    RaggedRow {
        /// Zero-based index of the row.
        row: u32,
        /// Length of the first row.
        expected: u32,
        /// Length of the offending row.
        found: u32,
    },
    /// The snapshot contained an unknown tile code.
    #[error("unknown tile code {code:?} at ({column}, {row})")]
    UnknownTile {
        /// Offending character.
        code: char,
        /// Column of the character.
        column: u32,
        /// Row of the character.
        row: u32,
    },
    /// The snapshot is larger than the configured bound.
    #[error("{columns}x{rows} map exceeds the {bound}x{bound} bound")]
    ExceedsBound {
        /// Number of columns in the snapshot.
        columns: u32,
        /// Number of rows in the snapshot.
        rows: u32,
        /// Configured maximum edge length.
        bound: u32,
    },
}

/// Errors raised while finalizing a device's blast geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TrailError {
    /// A trail end point does not share a row or column with the device.
    #[error("fire trail end {end} is not colinear with the device at {device}")]
    MalformedTrail {
        /// Placement position of the device.
        device: Position,
        /// Reported end point.
        end: Position,
    },
    /// A trail end point lies off the grid or beyond the blast distance.
    #[error("fire trail end {end} is out of reach of the device at {device} (reach {reach})")]
    OutOfReach {
        /// Placement position of the device.
        device: Position,
        /// Reported end point.
        end: Position,
        /// Blast distance the trail may not exceed.
        reach: u32,
    },
}

/// Errors raised by the planner before any candidate exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The agent's position lies outside the grid.
    #[error("origin {position} lies outside the grid")]
    OutOfBounds {
        /// Offending origin.
        position: Position,
    },
    /// The agent's own tile is unsafe, so no placement is reachable.
    #[error("origin {position} is unsafe, no placement is reachable")]
    NoCandidates {
        /// Origin of the search.
        position: Position,
    },
}

impl PlanError {
    /// Reason reported when a cycle is skipped because of this error.
    #[must_use]
    pub const fn skip_reason(self) -> SkipReason {
        match self {
            Self::OutOfBounds { .. } => SkipReason::OutOfBounds,
            Self::NoCandidates { .. } => SkipReason::NoCandidates,
        }
    }
}

/// Errors raised by the cycle state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CycleError {
    /// Planning was requested while another cycle is running.
    #[error("a cycle is already running ({state:?})")]
    Busy {
        /// Phase of the running cycle.
        state: CycleState,
    },
    /// Planning was requested before map and position were confirmed.
    #[error("map or position has not been confirmed")]
    Stale,
    /// The requested transition does not follow the cycle order.
    #[error("illegal cycle transition from {from:?} to {to:?}")]
    IllegalTransition {
        /// Phase the cycle was in.
        from: CycleState,
        /// Phase that was requested.
        to: CycleState,
    },
}

/// Errors raised while walking a path.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum ExecutionError {
    /// No step of the current run became safe before the timeout.
    #[error("blocked at {position} heading {direction:?} for {waited_secs:.2}s")]
    Blocked {
        /// Tile the agent was standing on.
        position: Position,
        /// Direction of the blocked run.
        direction: Direction,
        /// Seconds spent waiting.
        waited_secs: f64,
    },
}

impl ExecutionError {
    /// Reason reported when a cycle aborts because of this error.
    #[must_use]
    pub const fn abort_reason(self) -> AbortReason {
        match self {
            Self::Blocked {
                position,
                direction,
                ..
            } => AbortReason::Blocked {
                position,
                direction,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn offset_follows_direction_deltas() {
        let origin = Position::new(3, 3);
        assert_eq!(origin.step(Direction::Up), Position::new(3, 2));
        assert_eq!(origin.step(Direction::Left), Position::new(2, 3));
        assert_eq!(origin.offset(Direction::Down, 4), Position::new(3, 7));
        assert_eq!(origin.offset(Direction::Right, 2), Position::new(5, 3));
    }

    #[test]
    fn wire_codes_follow_keyboard_layout() {
        let codes: String = Direction::ALL.iter().map(|d| d.wire_code()).collect();
        assert_eq!(codes, "wasd");
    }

    #[test]
    fn sub_tile_positions_round_to_nearest_tile() {
        assert_eq!(Position::from_sub_tile(24, 36, 10), Position::new(2, 4));
        assert_eq!(Position::from_sub_tile(25, 34, 10), Position::new(3, 3));
        assert_eq!(Position::from_sub_tile(7, 7, 0), Position::new(7, 7));
    }

    #[test]
    fn tile_codes_decode_to_kinds() {
        assert_eq!(TileKind::from_code('W'), Some(TileKind::IndestructibleWall));
        assert_eq!(TileKind::from_code('M'), Some(TileKind::DestructibleBlock));
        assert_eq!(TileKind::from_code('g'), Some(TileKind::Open));
        assert_eq!(TileKind::from_code('?'), None);
    }

    #[test]
    fn time_bounds_accumulate_per_edge() {
        let bounds = TimeBounds::ZERO.advance(0.1, 0.2).advance(0.1, 0.2);
        assert!((bounds.earliest - 0.2).abs() < 1e-9);
        assert!((bounds.latest - 0.4).abs() < 1e-9);

        let interval = bounds.interval_from(10.0, 2.0);
        assert!((interval.start() - 10.2).abs() < 1e-9);
        assert!((interval.end() - 12.4).abs() < 1e-9);
    }

    #[test]
    fn reversed_interval_is_normalised() {
        let interval = Interval::new(5.0, 2.0);
        assert_eq!(interval.start(), 2.0);
        assert_eq!(interval.end(), 5.0);
    }

    #[test]
    fn remaining_fuse_resolves_against_now() {
        assert_eq!(HazardTiming::RemainingFuse(1.5).deadline(10.0), 11.5);
        assert_eq!(HazardTiming::Deadline(4.0).deadline(10.0), 4.0);
    }

    #[test]
    fn position_round_trips_through_bincode() {
        assert_round_trip(&Position::new(-2, 48));
        assert_round_trip(&Direction::Right);
        assert_round_trip(&TimeBounds::new(0.3, 0.6));
    }

    #[test]
    fn command_encodes_with_type_tag() {
        let command = Command::Move {
            direction: Direction::Left,
            steps: 3,
        };
        let json = serde_json::to_string(&command).expect("encode");
        assert_eq!(json, r#"{"type":"move","direction":"left","steps":3}"#);
        let restored: Command = serde_json::from_str(&json).expect("decode");
        assert_eq!(restored, command);
    }

    #[test]
    fn inbound_hazard_decodes_from_json() {
        let json = r#"{
            "type": "hazard",
            "position": {"x": 1, "y": 1},
            "timing": {"remaining_fuse": 1.5},
            "phase": {"kind": "cleared", "destroyed": [{"x": 1, "y": 2}]}
        }"#;
        let inbound: Inbound = serde_json::from_str(json).expect("decode");
        assert_eq!(
            inbound,
            Inbound::Hazard {
                position: Position::new(1, 1),
                timing: HazardTiming::RemainingFuse(1.5),
                phase: HazardPhase::Cleared {
                    destroyed: vec![Position::new(1, 2)],
                },
            }
        );
    }

    #[test]
    fn errors_map_to_cycle_reasons() {
        let position = Position::new(1, 2);
        assert_eq!(
            PlanError::NoCandidates { position }.skip_reason(),
            SkipReason::NoCandidates
        );
        let blocked = ExecutionError::Blocked {
            position,
            direction: Direction::Down,
            waited_secs: 2.0,
        };
        assert_eq!(
            blocked.abort_reason(),
            AbortReason::Blocked {
                position,
                direction: Direction::Down
            }
        );
        assert_eq!(
            blocked.to_string(),
            "blocked at (1, 2) heading Down for 2.00s"
        );
    }
}
