use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use holocene::{
    engine::{EngineBuilder, EngineSettings},
    persistence::{load_world, save_world},
    scenario::{Scenario, ScenarioLoader},
    web::{self, WebServerConfig},
    world::World,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Holocene world simulation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a scenario headless and print a summary
    Run(RunArgs),
    /// Run a scenario while streaming tick reports over HTTP
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct ScenarioArgs {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/river_valley.yaml")]
    scenario: PathBuf,

    /// Override tick count (uses scenario default when omitted)
    #[arg(long)]
    ticks: Option<u64>,

    /// Override snapshot interval in ticks
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Resume from a saved world instead of the scenario's founders
    #[arg(long)]
    load: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,

    /// Save the final world to this path
    #[arg(long)]
    save: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,
}

fn prepare(args: &ScenarioArgs) -> Result<(Scenario, World)> {
    let scenario = ScenarioLoader::new(".").load(&args.scenario)?;
    scenario.logging.init_tracing();
    let world = match &args.load {
        Some(path) => load_world(path, &scenario)?,
        None => scenario.build_world()?,
    };
    Ok((scenario, world))
}

fn snapshot_dir(args: &ScenarioArgs) -> PathBuf {
    args.snapshot_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("snapshots"))
}

fn run(args: RunArgs) -> Result<()> {
    let (scenario, mut world) = prepare(&args.scenario)?;
    let ticks = scenario.ticks(args.scenario.ticks);
    let settings = EngineSettings {
        scenario_name: scenario.name.clone(),
        snapshot_interval_ticks: args
            .scenario
            .snapshot_interval
            .unwrap_or(scenario.snapshot_interval_ticks),
        snapshot_dir: snapshot_dir(&args.scenario),
        report_interval_ticks: scenario.logging.report_interval_ticks,
    };

    let mut engine = EngineBuilder::new(settings).with_standard_passes().build();
    engine.run(&mut world, ticks)?;

    if let Some(path) = &args.save {
        save_world(&world, path)?;
    }
    println!(
        "Scenario '{}' completed for {} ticks. Date: {}. Groups: {}. Polities: {}. Final population: {}",
        scenario.name,
        ticks,
        world.current_date(),
        world.group_count(),
        world.polity_count(),
        world.total_population()
    );
    Ok(())
}

#[tokio::main]
async fn serve(args: ServeArgs) -> Result<()> {
    let (scenario, world) = prepare(&args.scenario)?;
    let ticks = scenario.ticks(args.scenario.ticks);
    let snapshot_interval = args
        .scenario
        .snapshot_interval
        .unwrap_or(scenario.snapshot_interval_ticks);
    web::run(WebServerConfig {
        snapshot_dir: snapshot_dir(&args.scenario),
        scenario,
        world: Some(world),
        ticks,
        snapshot_interval,
        host: args.host,
        port: args.port,
    })
    .await
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Command::Run(args) => run(args),
        Command::Serve(args) => serve(args),
    }
}
