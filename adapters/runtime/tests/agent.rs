use std::{
    cell::{Cell, RefCell},
    time::Duration,
};

use blastgrid_core::{
    Command, CommandSink, CycleReport, Direction, Inbound, Position, SkipReason, Tuning,
};
use blastgrid_runtime::Agent;
use blastgrid_world::query;
use tokio::{
    sync::mpsc::{self, UnboundedSender},
    time::timeout,
};

/// Minimal stand-in for the arena server.
struct ArenaDouble {
    map: String,
    position: Cell<Position>,
    responsive: Cell<bool>,
    eliminate_on_move: bool,
    inbound: UnboundedSender<Inbound>,
    commands: RefCell<Vec<Command>>,
    reports: RefCell<Vec<CycleReport>>,
}

impl ArenaDouble {
    fn new(map: &str, position: Position, inbound: UnboundedSender<Inbound>) -> Self {
        Self {
            map: map.to_owned(),
            position: Cell::new(position),
            responsive: Cell::new(true),
            eliminate_on_move: false,
            inbound,
            commands: RefCell::new(Vec::new()),
            reports: RefCell::new(Vec::new()),
        }
    }

    fn deliver(&self, message: Inbound) {
        let _ = self.inbound.send(message);
    }
}

impl CommandSink for ArenaDouble {
    fn send(&self, command: Command) {
        self.commands.borrow_mut().push(command.clone());
        if !self.responsive.get() {
            return;
        }
        match command {
            Command::QueryPosition => {
                let position = self.position.get();
                self.deliver(Inbound::SelfPosition {
                    x: i64::from(position.x()) * 10,
                    y: i64::from(position.y()) * 10,
                });
            }
            Command::QueryMap => self.deliver(Inbound::Map {
                rows: self.map.clone(),
            }),
            Command::Move { direction, steps } => {
                let position = self.position.get().offset(direction, steps as i32);
                self.position.set(position);
                if self.eliminate_on_move {
                    self.responsive.set(false);
                    self.deliver(Inbound::Eliminated);
                }
            }
            Command::Detonate { .. } => {}
        }
    }

    fn report(&self, report: CycleReport) {
        self.reports.borrow_mut().push(report);
    }
}

async fn run_for(
    agent: &Agent<&ArenaDouble>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    secs: f64,
) {
    let _ = timeout(Duration::from_secs_f64(secs), agent.run(inbound)).await;
}

#[tokio::test(start_paused = true)]
async fn open_arena_runs_one_full_cycle() {
    let (sender, receiver) = mpsc::unbounded_channel();
    let arena = ArenaDouble::new(&"ggggg\n".repeat(5), Position::new(2, 2), sender);
    let agent = Agent::new(Tuning::default(), &arena);

    run_for(&agent, receiver, 1.0).await;

    assert_eq!(
        *arena.commands.borrow(),
        vec![
            Command::QueryPosition,
            Command::QueryMap,
            Command::Detonate { fuse_secs: 2.0 },
            Command::Move {
                direction: Direction::Up,
                steps: 1
            },
            Command::Move {
                direction: Direction::Left,
                steps: 1
            },
        ]
    );
    assert_eq!(
        *arena.reports.borrow(),
        vec![CycleReport::Completed {
            detonated_at: Position::new(2, 2),
            retreated_to: Position::new(1, 1),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn next_cycle_reconfirms_after_cooldown() {
    let (sender, receiver) = mpsc::unbounded_channel();
    let arena = ArenaDouble::new(&"ggggg\n".repeat(5), Position::new(2, 2), sender);
    let agent = Agent::new(Tuning::default(), &arena);

    run_for(&agent, receiver, 3.0).await;

    let commands = arena.commands.borrow();
    let queries = commands
        .iter()
        .filter(|command| matches!(command, Command::QueryPosition | Command::QueryMap))
        .count();
    assert_eq!(queries, 4, "both inputs are re-queried after the retreat");
    assert_eq!(commands[5..7], [Command::QueryPosition, Command::QueryMap]);
}

#[tokio::test(start_paused = true)]
async fn elimination_cancels_the_running_cycle() {
    let (sender, receiver) = mpsc::unbounded_channel();
    let mut arena = ArenaDouble::new(&"ggggg\n".repeat(5), Position::new(2, 2), sender);
    arena.eliminate_on_move = true;
    let agent = Agent::new(Tuning::default(), &arena);

    run_for(&agent, receiver, 1.0).await;

    let moves = arena
        .commands
        .borrow()
        .iter()
        .filter(|command| matches!(command, Command::Move { .. }))
        .count();
    assert_eq!(moves, 1, "the retreat stops at the first suspension point");
    assert_eq!(*arena.reports.borrow(), vec![CycleReport::Cancelled]);
    assert!(query::is_eliminated(&agent.world()));
}

#[tokio::test(start_paused = true)]
async fn silent_server_skips_with_stale_data() {
    let (sender, receiver) = mpsc::unbounded_channel();
    let arena = ArenaDouble::new(&"ggggg\n".repeat(5), Position::new(2, 2), sender);
    arena.responsive.set(false);
    let agent = Agent::new(Tuning::default(), &arena);

    run_for(&agent, receiver, 2.5).await;

    assert_eq!(
        *arena.reports.borrow(),
        vec![CycleReport::Skipped(SkipReason::StaleData)]
    );
}

#[tokio::test(start_paused = true)]
async fn corridor_without_retreat_places_nothing() {
    let (sender, receiver) = mpsc::unbounded_channel();
    let arena = ArenaDouble::new(
        "WWWWW\nWWWWW\nggggg\nWWWWW\nWWWWW\n",
        Position::new(2, 2),
        sender,
    );
    let agent = Agent::new(Tuning::default(), &arena);

    run_for(&agent, receiver, 0.5).await;

    assert!(arena
        .commands
        .borrow()
        .iter()
        .all(|command| matches!(command, Command::QueryPosition | Command::QueryMap)));
    assert!(arena
        .reports
        .borrow()
        .iter()
        .all(|report| *report == CycleReport::Skipped(SkipReason::NoRetreat)));
    assert!(!arena.reports.borrow().is_empty());
}
