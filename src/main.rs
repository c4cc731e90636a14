use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;

use traffic_flow::simulation::{ScenarioConfig, SimStats, SimWorld};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScenarioKind {
    /// Vehicles placed at random
    Random,
    /// Fast vehicle stuck behind a slow one
    Platoon,
    /// Fast vehicle with a free lane to overtake
    Overtake,
}

#[derive(Parser)]
#[command(name = "traffic_flow")]
#[command(about = "Headless lane-based traffic simulation")]
struct Cli {
    /// Which scenario to run
    #[arg(long, value_enum, default_value = "random")]
    scenario: ScenarioKind,

    /// Number of parallel lanes (random scenario)
    #[arg(long, default_value = "3")]
    lanes: usize,

    /// Number of vehicles (random scenario)
    #[arg(long, default_value = "12")]
    vehicles: usize,

    /// Number of simulation ticks to run
    #[arg(long, default_value = "100")]
    ticks: u64,

    /// Seed for reproducible vehicle placement
    #[arg(long)]
    seed: Option<u64>,

    /// Lowest target speed handed out (random scenario)
    #[arg(long, default_value = "1.0")]
    min_speed: f64,

    /// Highest target speed handed out (random scenario)
    #[arg(long, default_value = "12.0")]
    max_speed: f64,

    /// Length of road vehicles are spawned on (random scenario)
    #[arg(long, default_value = "200.0")]
    road_length: f64,

    /// Print the world summary every N ticks (0 = only initial and final)
    #[arg(long, default_value = "0")]
    summary_every: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,traffic_flow=info"),
    )
    .init();

    let cli = Cli::parse();
    let mut world = build_world(&cli)?;

    println!("Running lane simulation in headless mode...");
    println!("Ticks: {}", cli.ticks);
    println!();
    println!("Initial state:");
    print!("{}", world.summary());
    println!();

    let stats = run(&mut world, cli.ticks, cli.summary_every)?;

    println!("=== Final State ===");
    print!("{}", world.summary());
    stats.log_summary();
    Ok(())
}

fn build_world(cli: &Cli) -> Result<SimWorld> {
    match cli.scenario {
        ScenarioKind::Random => {
            let config = ScenarioConfig {
                lanes: cli.lanes,
                vehicles: cli.vehicles,
                seed: cli.seed,
                min_speed: cli.min_speed,
                max_speed: cli.max_speed,
                road_length: cli.road_length,
            };
            config.build().context("Failed to build random scenario")
        }
        ScenarioKind::Platoon => Ok(SimWorld::create_blocked_platoon()?.0),
        ScenarioKind::Overtake => Ok(SimWorld::create_overtake()?.0),
    }
}

/// Step the world, printing a summary every `summary_every` ticks
fn run(world: &mut SimWorld, ticks: u64, summary_every: u64) -> Result<SimStats> {
    let mut stats = SimStats::default();
    for _ in 0..ticks {
        let report = world
            .step()
            .with_context(|| format!("Simulation failed at tick {}", world.tick_count()))?;
        stats.record(&report, world);

        if summary_every > 0 && report.tick % summary_every == 0 {
            println!("--- After tick {} ---", report.tick);
            print!("{}", world.summary());
            println!();
        }
    }
    info!("Ran {} ticks", stats.ticks);
    Ok(stats)
}
