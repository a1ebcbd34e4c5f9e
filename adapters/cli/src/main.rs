#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for inspecting the Blastgrid planner and replaying
//! recorded arena sessions through the agent runtime.

mod inputs;

use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use blastgrid_core::{
    Command, CommandSink, CycleReport, HazardPhase, HazardTiming, Inbound, Position, Tuning,
};
use blastgrid_runtime::Agent;
use blastgrid_system_planner::{Candidate, Planner};
use blastgrid_world::{self as world, query, World};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::{
    sync::mpsc,
    time::{sleep_until, Instant},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use inputs::{load_tuning, parse_hazards, parse_script, ScriptEntry};

#[derive(Debug, Parser)]
#[command(author, version, about = "Blastgrid tactical planner", long_about = None)]
struct Cli {
    /// TOML file overriding tuning constants.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Plans a single placement for a map snapshot and prints it as JSON.
    Plan {
        /// Map snapshot, one row of tile codes per line.
        #[arg(long)]
        map: PathBuf,
        /// Column of the agent.
        #[arg(long)]
        x: i32,
        /// Row of the agent.
        #[arg(long)]
        y: i32,
        /// JSON array of live devices.
        #[arg(long)]
        hazards: Option<PathBuf>,
    },
    /// Feeds a JSON-lines script to the agent and prints the commands it sends.
    Replay {
        /// Script of timed inbound messages.
        script: PathBuf,
        /// Seconds to keep the agent running.
        #[arg(long, default_value_t = 10.0)]
        duration: f64,
        /// Print commands in the arena protocol's message shape.
        #[arg(long)]
        wire: bool,
    },
}

#[derive(Debug, Serialize)]
struct PlanOutput {
    candidate: Candidate,
    fuse_secs: Option<f64>,
}

/// Outbound message in the arena protocol's shape.
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireMessage {
    Move { direction: char, distance: u32 },
    Bomb { fuse_time: f64 },
    Whoami,
    Map,
}

impl From<&Command> for WireMessage {
    fn from(command: &Command) -> Self {
        match *command {
            Command::Move { direction, steps } => Self::Move {
                direction: direction.wire_code(),
                distance: steps,
            },
            Command::Detonate { fuse_secs } => Self::Bomb {
                fuse_time: fuse_secs,
            },
            Command::QueryPosition => Self::Whoami,
            Command::QueryMap => Self::Map,
        }
    }
}

/// Prints every command as a JSON line and logs cycle reports.
struct StdoutSink {
    wire: bool,
}

impl CommandSink for StdoutSink {
    fn send(&self, command: Command) {
        let line = if self.wire {
            serde_json::to_string(&WireMessage::from(&command))
        } else {
            serde_json::to_string(&command)
        };
        match line {
            Ok(line) => println!("{line}"),
            Err(error) => warn!(%error, "could not encode command"),
        }
    }

    fn report(&self, report: CycleReport) {
        info!(?report, "cycle report");
    }
}

/// Entry point for the Blastgrid command-line interface.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let tuning = load_tuning(cli.config.as_deref())?;
    match cli.command {
        Mode::Plan { map, x, y, hazards } => {
            let rows = fs::read_to_string(&map)
                .with_context(|| format!("reading map {}", map.display()))?;
            let hazards = match hazards {
                Some(path) => parse_hazards(
                    &fs::read_to_string(&path)
                        .with_context(|| format!("reading hazards {}", path.display()))?,
                )?,
                None => Vec::new(),
            };

            let mut world = World::new(tuning);
            let scale = i64::from(query::tuning(&world).position_scale);
            let mut messages = vec![
                Inbound::Map { rows },
                Inbound::SelfPosition {
                    x: i64::from(x) * scale,
                    y: i64::from(y) * scale,
                },
            ];
            messages.extend(hazards.into_iter().map(|hazard| Inbound::Hazard {
                position: hazard.position,
                timing: HazardTiming::RemainingFuse(hazard.fuse_secs),
                phase: HazardPhase::Armed,
            }));
            let mut events = Vec::new();
            for message in messages {
                world::apply(&mut world, message, 0.0, &mut events);
            }
            world.prepare_for_planning();

            let output = plan(&world, Position::new(x, y))?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Mode::Replay {
            script,
            duration,
            wire,
        } => {
            let text = fs::read_to_string(&script)
                .with_context(|| format!("reading script {}", script.display()))?;
            let entries = parse_script(&text)?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .context("building runtime")?;
            runtime.block_on(replay(tuning, entries, duration, StdoutSink { wire }));
        }
    }
    Ok(())
}

fn plan(world: &World, origin: Position) -> Result<PlanOutput> {
    let tuning = query::tuning(world);
    let planner = Planner::new(query::safety_oracle(world), tuning, 0.0);
    let candidate = planner
        .best_move(origin, tuning.max_depth)
        .context("planning failed")?;
    let fuse_secs = candidate.fuse_secs(tuning);
    Ok(PlanOutput {
        candidate,
        fuse_secs,
    })
}

async fn replay(tuning: Tuning, entries: Vec<ScriptEntry>, duration: f64, sink: StdoutSink) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let agent = Agent::new(tuning, sink);
    let start = Instant::now();

    let feed = async move {
        for entry in entries {
            sleep_until(start + seconds(entry.at)).await;
            if sender.send(entry.message).is_err() {
                return;
            }
        }
        sleep_until(start + seconds(duration)).await;
        info!("replay finished");
    };

    let ((), ()) = tokio::join!(agent.run(receiver), feed);
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
