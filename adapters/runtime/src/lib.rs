#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Single-threaded agent runtime that interleaves inbound messages with the
//! plan/execute cycle.
//!
//! The world lives in a [`RefCell`] and is only borrowed between suspension
//! points, so inbound messages applied while a cycle waits are visible to the
//! next safety re-check.

use std::cell::{Cell, Ref, RefCell};

use blastgrid_core::{
    Command, CommandSink, CycleError, CycleReport, CycleState, Event, Inbound, Interval, Position,
    SkipReason, Tuning,
};
use blastgrid_system_execution::{secs, SafetyGate, Supervisor};
use blastgrid_system_planner::{Candidate, Cycle, Planner, Readiness};
use blastgrid_world::{self as world, query, World};
use tokio::{
    sync::mpsc::UnboundedReceiver,
    time::{sleep, Instant},
};
use tracing::{debug, info, warn};

/// Engine clock measuring seconds since the agent started.
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    /// Starts the clock at the current instant.
    #[must_use]
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Seconds elapsed since the clock started.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Safety gate backed by the live world.
struct LiveGate<'a> {
    world: &'a RefCell<World>,
    clock: Clock,
}

impl SafetyGate for LiveGate<'_> {
    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn is_tile_safe(&self, position: Position, interval: Interval) -> bool {
        let world = self.world.borrow();
        query::safety_oracle(&world).is_safe(position, Some(interval), &[])
    }
}

/// Autonomous agent driving one arena session.
#[derive(Debug)]
pub struct Agent<S> {
    tuning: Tuning,
    world: RefCell<World>,
    cycle: RefCell<Cycle>,
    readiness: Cell<Readiness>,
    clock: Clock,
    sink: S,
}

impl<S> Agent<S>
where
    S: CommandSink,
{
    /// Creates an agent that sends its commands and reports to `sink`.
    #[must_use]
    pub fn new(tuning: Tuning, sink: S) -> Self {
        Self {
            world: RefCell::new(World::new(tuning.clone())),
            tuning,
            cycle: RefCell::new(Cycle::new()),
            readiness: Cell::new(Readiness::default()),
            clock: Clock::start(),
            sink,
        }
    }

    /// Read-only access to the world between suspension points.
    #[must_use]
    pub fn world(&self) -> Ref<'_, World> {
        self.world.borrow()
    }

    /// Phase of the running cycle.
    #[must_use]
    pub fn cycle_state(&self) -> CycleState {
        self.cycle.borrow().state()
    }

    /// Runs the agent until the inbound stream closes.
    ///
    /// Elimination drops the running cycle at its current suspension point,
    /// resets the cycle to `Idle` and starts over once fresh data arrives.
    pub async fn run(&self, mut inbound: UnboundedReceiver<Inbound>) {
        loop {
            {
                let cycles = self.drive_cycles();
                tokio::pin!(cycles);
                loop {
                    tokio::select! {
                        biased;
                        message = inbound.recv() => match message {
                            Some(message) => {
                                if self.ingest(message) {
                                    break;
                                }
                            }
                            None => {
                                info!("inbound stream closed");
                                return;
                            }
                        },
                        () = &mut cycles => break,
                    }
                }
            }

            let previous = self.cycle.borrow_mut().abort();
            self.readiness.set(Readiness::default());
            if previous != CycleState::Idle {
                info!(?previous, "cycle cancelled");
                self.sink.report(CycleReport::Cancelled);
            }
        }
    }

    /// Applies one inbound message, returning `true` when the agent was
    /// eliminated.
    fn ingest(&self, message: Inbound) -> bool {
        let mut events = Vec::new();
        world::apply(
            &mut self.world.borrow_mut(),
            message,
            self.clock.now(),
            &mut events,
        );

        let mut eliminated = false;
        let mut readiness = self.readiness.get();
        for event in events {
            match event {
                Event::MapReplaced { .. } => readiness.map_confirmed = true,
                Event::PositionConfirmed { .. } => readiness.position_confirmed = true,
                Event::Eliminated => eliminated = true,
                _ => {}
            }
        }
        self.readiness.set(readiness);
        eliminated
    }

    async fn drive_cycles(&self) {
        loop {
            let (report, pause) = match self.run_cycle().await {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(%error, "cycle state machine rejected a transition");
                    let _ = self.cycle.borrow_mut().abort();
                    continue;
                }
            };
            debug!(?report, pause, "cycle finished");
            self.sink.report(report);
            sleep(secs(pause)).await;
        }
    }

    /// Runs one plan/execute cycle, returning its report and the pause to
    /// take before the next one.
    async fn run_cycle(&self) -> Result<(CycleReport, f64), CycleError> {
        let idle = self.tuning.backoff_secs;
        if !self.await_consistency().await {
            return Ok((CycleReport::Skipped(SkipReason::StaleData), idle));
        }
        match self.cycle.borrow_mut().begin_planning(self.readiness.get()) {
            Ok(()) => {}
            Err(CycleError::Busy { .. }) => {
                return Ok((CycleReport::Skipped(SkipReason::Busy), idle));
            }
            Err(CycleError::Stale) => {
                return Ok((CycleReport::Skipped(SkipReason::StaleData), idle));
            }
            Err(error) => return Err(error),
        }

        let (origin, candidate) = match self.plan() {
            Ok(plan) => plan,
            Err(reason) => {
                self.cycle.borrow_mut().advance(CycleState::Idle)?;
                return Ok((CycleReport::Skipped(reason), idle));
            }
        };
        let (Some(fuse_secs), Some(retreat)) =
            (candidate.fuse_secs(&self.tuning), candidate.retreat.as_ref())
        else {
            info!(placement = %candidate.placement, score = candidate.score, "no safe retreat, skipping cycle");
            self.cycle.borrow_mut().advance(CycleState::Idle)?;
            return Ok((CycleReport::Skipped(SkipReason::NoRetreat), idle));
        };

        let outcome = self.execute(origin, &candidate, fuse_secs).await;
        // Whatever happened, the agent may have moved: re-confirm before the
        // next plan.
        self.readiness.set(Readiness::default());
        match outcome? {
            Ok(retreated_to) => Ok((
                CycleReport::Completed {
                    detonated_at: candidate.placement,
                    retreated_to,
                },
                self.tuning.post_retreat_secs(retreat.depth()),
            )),
            Err(report) => Ok((report, idle)),
        }
    }

    fn plan(&self) -> Result<(Position, Candidate), SkipReason> {
        let mut world = self.world.borrow_mut();
        world.prepare_for_planning();
        let Some(origin) = query::position(&world) else {
            return Err(SkipReason::StaleData);
        };
        let planner = Planner::new(
            query::safety_oracle(&world),
            &self.tuning,
            self.clock.now(),
        );
        let candidate = planner
            .best_move(origin, self.tuning.max_depth)
            .map_err(|error| {
                warn!(%error, "planning failed");
                error.skip_reason()
            })?;
        info!(
            %origin,
            placement = %candidate.placement,
            score = candidate.score,
            "planned placement"
        );
        Ok((origin, candidate))
    }

    /// Walks the approach, places the device and retreats.
    ///
    /// The outer result carries state machine errors, the inner one the
    /// report of an aborted walk.
    async fn execute(
        &self,
        origin: Position,
        candidate: &Candidate,
        fuse_secs: f64,
    ) -> Result<Result<Position, CycleReport>, CycleError> {
        let gate = LiveGate {
            world: &self.world,
            clock: self.clock,
        };
        let supervisor = Supervisor::new(&self.tuning);
        let retreat_path = candidate
            .retreat
            .as_ref()
            .map(|retreat| retreat.path.as_slice())
            .unwrap_or_default();

        self.cycle.borrow_mut().advance(CycleState::Approaching)?;
        let placement = match supervisor
            .walk(&gate, &self.sink, origin, &candidate.approach)
            .await
        {
            Ok(placement) => placement,
            Err(error) => {
                let _ = self.cycle.borrow_mut().abort();
                return Ok(Err(CycleReport::Aborted(error.abort_reason())));
            }
        };

        self.cycle.borrow_mut().advance(CycleState::Detonating)?;
        info!(%placement, fuse_secs, "placing device");
        self.sink.send(Command::Detonate { fuse_secs });

        self.cycle.borrow_mut().advance(CycleState::Retreating)?;
        let retreated_to = match supervisor
            .walk(&gate, &self.sink, placement, retreat_path)
            .await
        {
            Ok(position) => position,
            Err(error) => {
                let _ = self.cycle.borrow_mut().abort();
                return Ok(Err(CycleReport::Aborted(error.abort_reason())));
            }
        };

        self.cycle.borrow_mut().advance(CycleState::Idle)?;
        Ok(Ok(retreated_to))
    }

    /// Asks for fresh map and position data and waits until both arrive.
    async fn await_consistency(&self) -> bool {
        let readiness = self.readiness.get();
        if readiness.is_consistent() {
            return true;
        }
        if !readiness.position_confirmed {
            self.sink.send(Command::QueryPosition);
        }
        if !readiness.map_confirmed {
            self.sink.send(Command::QueryMap);
        }

        let deadline = Instant::now() + secs(self.tuning.consistency_timeout_secs);
        while !self.readiness.get().is_consistent() {
            if Instant::now() >= deadline {
                warn!(readiness = ?self.readiness.get(), "map or position not confirmed in time");
                return false;
            }
            sleep(secs(self.tuning.consistency_poll_secs)).await;
        }
        true
    }
}
