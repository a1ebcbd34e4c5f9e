#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Execution supervisor that turns planned paths into motion commands,
//! re-checking every tile just before the agent commits to it.

use std::time::Duration;

use blastgrid_core::{Command, CommandSink, Direction, ExecutionError, Interval, Position, Tuning};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Live view used to re-check tiles while walking.
pub trait SafetyGate {
    /// Current engine time in seconds.
    fn now(&self) -> f64;

    /// Reports whether `position` is safe throughout `interval`.
    fn is_tile_safe(&self, position: Position, interval: Interval) -> bool;
}

/// Consecutive steps in one direction, sent as a single motion command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Run {
    /// Direction of travel.
    pub direction: Direction,
    /// Number of tiles, at least one.
    pub steps: u32,
}

/// Groups consecutive identical directions of `path` into runs.
#[must_use]
pub fn group_runs(path: &[Direction]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for &direction in path {
        match runs.last_mut() {
            Some(run) if run.direction == direction => run.steps += 1,
            _ => runs.push(Run {
                direction,
                steps: 1,
            }),
        }
    }
    runs
}

/// Length of the longest prefix of `run` that is safe to walk from `from`
/// starting at `now`.
///
/// The `k`-th tile entered (counting from zero) is checked for
/// `[now + k * step_min, now + (k + 1) * step_max]`.
#[must_use]
pub fn safe_prefix<G>(gate: &G, from: Position, run: Run, now: f64, tuning: &Tuning) -> u32
where
    G: SafetyGate + ?Sized,
{
    (0..run.steps)
        .take_while(|&index| {
            let tile = from.offset(run.direction, index as i32 + 1);
            let interval = Interval::new(
                now + f64::from(index) * tuning.step_min_secs,
                now + f64::from(index + 1) * tuning.step_max_secs,
            );
            gate.is_tile_safe(tile, interval)
        })
        .count() as u32
}

/// Walks paths one run at a time, shortening runs to their safe prefix and
/// backing off while no step is safe.
#[derive(Debug)]
pub struct Supervisor<'t> {
    tuning: &'t Tuning,
}

impl<'t> Supervisor<'t> {
    /// Creates a supervisor using the timing constants of `tuning`.
    #[must_use]
    pub fn new(tuning: &'t Tuning) -> Self {
        Self { tuning }
    }

    /// Sends motion commands for `path`, starting at `from`, and returns the
    /// tile the agent ends on.
    ///
    /// Each command is followed by a wait for the server-side travel time.
    /// A run that stays blocked for longer than the configured budget fails
    /// with [`ExecutionError::Blocked`].
    pub async fn walk<G, S>(
        &self,
        gate: &G,
        sink: &S,
        from: Position,
        path: &[Direction],
    ) -> Result<Position, ExecutionError>
    where
        G: SafetyGate + ?Sized,
        S: CommandSink + ?Sized,
    {
        let mut position = from;
        for run in group_runs(path) {
            let mut remaining = run.steps;
            let mut blocked_since: Option<Instant> = None;
            while remaining > 0 {
                let pending = Run {
                    direction: run.direction,
                    steps: remaining,
                };
                let steps = safe_prefix(gate, position, pending, gate.now(), self.tuning);
                if steps == 0 {
                    let since = *blocked_since.get_or_insert_with(Instant::now);
                    let waited_secs = since.elapsed().as_secs_f64();
                    if waited_secs >= self.tuning.blocked_timeout_secs {
                        warn!(%position, direction = ?run.direction, waited_secs, "run blocked");
                        return Err(ExecutionError::Blocked {
                            position,
                            direction: run.direction,
                            waited_secs,
                        });
                    }
                    debug!(%position, direction = ?run.direction, "no safe step, backing off");
                    sleep(secs(self.tuning.backoff_secs)).await;
                    continue;
                }

                blocked_since = None;
                if steps < remaining {
                    debug!(%position, planned = remaining, steps, "run shortened to safe prefix");
                }
                sink.send(Command::Move {
                    direction: run.direction,
                    steps,
                });
                sleep(secs(self.tuning.travel_secs(steps))).await;
                position = position.offset(run.direction, steps as i32);
                remaining -= steps;
            }
        }
        Ok(position)
    }
}

/// Converts a non-negative number of seconds into a duration.
#[must_use]
pub fn secs(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO)
}
