#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a scripted Grid Arena session.

mod session;

use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use grid_arena_core::{
    CellCoord, Command, Direction, Faction, MovementIntent, Outcome, PostMotion,
    ResolutionReport,
};
use grid_arena_system_resolver::{Batch, PullEffect};
use grid_arena_world::{query, ArenaConfig};

use session::{render, Session};

const DEMO_COLUMNS: u32 = 8;
const DEMO_ROWS: u32 = 4;

/// Command-line arguments accepted by the arena demo.
#[derive(Debug, Parser)]
#[command(name = "grid-arena", version, about = "Run a scripted Grid Arena session")]
struct Args {
    /// Optional TOML file overriding the arena configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Raises the default log level to `debug`.
    #[arg(short, long)]
    verbose: bool,
    /// Number of chase ticks simulated after the scripted effects.
    #[arg(long, default_value_t = 8)]
    ticks: u32,
}

/// Entry point for the Grid Arena command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = load_config(args.config.as_ref())?;
    run_demo(config, args.ticks)
}

fn load_config(path: Option<&PathBuf>) -> Result<ArenaConfig> {
    let Some(path) = path else {
        return Ok(ArenaConfig::default());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read arena config at {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid arena config {}", path.display()))
}

fn parse_config(contents: &str) -> Result<ArenaConfig> {
    let config: ArenaConfig =
        toml::from_str(contents).context("failed to parse arena config toml contents")?;
    config.validate()?;
    if config.columns < DEMO_COLUMNS || config.rows < DEMO_ROWS {
        bail!(
            "the demo needs at least a {DEMO_COLUMNS}x{DEMO_ROWS} grid; got {}x{}",
            config.columns,
            config.rows
        );
    }
    Ok(config)
}

fn run_demo(config: ArenaConfig, chase_ticks: u32) -> Result<()> {
    let cracked_duration = config.cracked_duration;
    let step_interval = config.step_duration.saturating_mul(2);
    log::info!("starting {}x{} arena session", config.columns, config.rows);
    let mut session = Session::new(config)?;

    let front = session.spawn(Faction::Hostile, 5, 1)?;
    let middle = session.spawn(Faction::Hostile, 6, 1)?;
    let back = session.spawn(Faction::Hostile, 7, 1)?;
    let loner = session.spawn(Faction::Hostile, 5, 2)?;
    let _ = session.spawn(Faction::Player, 1, 1)?;
    let _ = session.spawn(Faction::Player, 2, 2)?;
    print_grid("arena", &session);

    session.submit(
        Batch::Pull(PullEffect::new(Direction::West)),
        PostMotion::Idle,
    );
    for report in session.settle() {
        print_report("pull west", &report);
    }
    print_grid("after pull", &session);

    let left = query::agent_cell(session.world(), front).context("front hostile vanished")?;
    let right = query::agent_cell(session.world(), middle).context("middle hostile vanished")?;
    let report = session.resolve(&[
        MovementIntent::step(front, left, Direction::East),
        MovementIntent::step(middle, right, Direction::West),
    ]);
    print_report("swap attempt", &report);

    let loner_cell = query::agent_cell(session.world(), loner).context("hostile vanished")?;
    if let Some(behind) = loner_cell.neighbor(Direction::East) {
        let _ = session.apply(Command::BreakCell { cell: behind });
        let report = session.resolve(&[MovementIntent::knockback(
            loner,
            loner_cell,
            Direction::East,
        )]);
        print_report("knockback into broken cell", &report);
    }
    print_grid("after knockback", &session);

    let cracked = CellCoord::new(6, 0);
    let _ = session.apply(Command::CrackCell { cell: cracked });
    print_grid("cracked", &session);
    let _ = session.advance(cracked_duration);
    println!(
        "cell (6, 0) after {:?}: {:?}",
        cracked_duration,
        query::damage_state(session.world(), cracked)?
    );

    for agent in [front, middle, back, loner] {
        let _ = session.apply(Command::SetAutonomous {
            agent,
            autonomous: true,
        });
    }
    for _ in 0..chase_ticks {
        for report in session.advance(step_interval) {
            print_report("chase", &report);
        }
    }
    let _ = session.settle();
    print_grid("after chase", &session);

    for agent in query::agent_view(session.world()).iter() {
        if let Some(position) = query::rendered_position(session.world(), agent.id) {
            println!(
                "agent {} ({:?}) at ({}, {}) drawn at {position}",
                agent.id.get(),
                agent.faction,
                agent.cell.column(),
                agent.cell.row()
            );
        }
    }
    Ok(())
}

fn print_grid(title: &str, session: &Session) {
    println!("-- {title}");
    print!("{}", render(session.world()));
}

fn print_report(title: &str, report: &ResolutionReport) {
    let order: Vec<u32> = report.commit_order().iter().map(|agent| agent.get()).collect();
    println!(
        "{title}: {} of {} accepted, commit order {order:?}{}",
        report.accepted_count(),
        report.outcomes().len(),
        if report.quiescence_timed_out() {
            " (quiescence timed out)"
        } else {
            ""
        }
    );
    for entry in report.outcomes() {
        let agent = entry
            .agent
            .map_or_else(|| "-".to_owned(), |agent| agent.get().to_string());
        match entry.outcome {
            Outcome::Accepted { final_cell } => println!(
                "  agent {agent}: accepted -> ({}, {})",
                final_cell.column(),
                final_cell.row()
            ),
            Outcome::Rejected { reason, fallback } => {
                println!("  agent {agent}: rejected {reason:?}, fallback {fallback:?}");
            }
        }
    }
}
