use anyhow::{Context, bail};
use clap::Parser;
use env_logger::Builder;
use log::{LevelFilter, debug, info};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use wsn_lifetime_simulator::common::config::SimulationConfig;
use wsn_lifetime_simulator::common::generator::{self, GeneratorParameters};
use wsn_lifetime_simulator::common::recorder::{JsonStateRecorder, StatisticsCollector};
use wsn_lifetime_simulator::common::scene::{self, Scene};
use wsn_lifetime_simulator::simulation::events::{SimulationEventChannel, SimulationEventReceiver};
use wsn_lifetime_simulator::simulation::{CycleDriver, Network, ProgressReporter, SimulationContext, SimulationEvent, SimulationOutcome};

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "wsn-lifetime-simulator", about = "Search the role-rotation interval that maximizes a sensor network lifetime")]
struct Cli {
    /// Scene JSON describing the network.
    #[arg(long, conflicts_with = "generate", required_unless_present = "generate")]
    scene: Option<PathBuf>,

    /// Generate a random network instead of loading a scene.
    #[arg(long)]
    generate: bool,

    #[arg(long, default_value_t = 50)]
    nodes: usize,

    /// Side of the square deployment area.
    #[arg(long, default_value_t = 100.0)]
    size: f64,

    #[arg(long, default_value_t = 5.0)]
    margin: f64,

    #[arg(long, default_value_t = 5.0)]
    min_distance: f64,

    /// Communication range of generated nodes.
    #[arg(long, default_value_t = 20.0)]
    max_distance: f64,

    /// Starting battery of generated sensors.
    #[arg(long, default_value_t = 10.0)]
    battery: f64,

    #[arg(long, default_value_t = 1)]
    sinks: usize,

    #[arg(long)]
    seed: Option<u64>,

    /// TOML simulation settings; defaults apply when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving states, statistics and generated scenes.
    #[arg(long, default_value = "output")]
    output: PathBuf,
}

impl Cli {
    fn generator_parameters(&self) -> GeneratorParameters {
        GeneratorParameters {
            node_count: self.nodes,
            area_size: self.size,
            margin: self.margin,
            min_distance: self.min_distance,
            max_distance: self.max_distance,
            battery_capacity: self.battery,
            sink_count: self.sinks,
            seed: self.seed,
        }
    }
}

fn load_or_generate(cli: &Cli) -> anyhow::Result<Network> {
    if let Some(path) = &cli.scene {
        return scene::load_network(path).with_context(|| format!("Failed to load scene {}", path.display()));
    }

    let network = generator::generate(&cli.generator_parameters()).context("Failed to generate network")?;
    let path = cli.output.join("scene.json");
    scene::save_scene(&Scene::from_network(&network), &path)?;
    info!("Generated scene saved to {}", path.display());
    Ok(network)
}

fn log_event(event: SimulationEvent) {
    match event {
        SimulationEvent::Initialization { cycle, interval } => info!("Cycle {} starting, rotation interval {:.2}", cycle, interval),
        SimulationEvent::SubgraphCount { remaining, estimated_remaining } => {
            debug!("Repair: {} components left (estimated {:?})", remaining, estimated_remaining)
        }
        SimulationEvent::RoundProgress { cycle, percent } => debug!("Cycle {}: {}% disconnected", cycle, percent),
        SimulationEvent::NewState { state, total } => debug!("State {} recorded ({} so far)", state, total),
        SimulationEvent::CycleFinished { cycle, result } => {
            info!("Cycle {} finished: interval {:.2}, lifetime {}", cycle, result.interval, result.lifetime)
        }
        SimulationEvent::SimulationFinished { elapsed } => info!("Simulation finished in {:.2?}", elapsed),
    }
}

fn drain_events(receiver: &SimulationEventReceiver) {
    while let Ok(event) = receiver.try_receive() {
        log_event(event);
    }
}

fn main() -> anyhow::Result<()> {
    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("wsn_lifetime_simulator"), LevelFilter::Debug)
        .parse_env("RUST_LOG")
        .init();

    let cli = Cli::parse();
    info!("Starting up");

    let config = match &cli.config {
        Some(path) => SimulationConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    std::fs::create_dir_all(&cli.output).with_context(|| format!("Failed to create {}", cli.output.display()))?;
    let network = load_or_generate(&cli)?;
    info!("Network has {} nodes ({} sensors), {} edges", network.node_count(), network.sensor_count(), network.edges().len());

    let event_channel: &'static SimulationEventChannel = Box::leak(Box::new(SimulationEventChannel::new()));
    let event_tx = event_channel.sender();
    let event_rx = event_channel.receiver();

    let states_dir = cli.output.join("states");
    let worker = thread::Builder::new()
        .name("simulation-worker".to_string())
        .spawn(move || -> anyhow::Result<(SimulationOutcome, StatisticsCollector)> {
            let mut recorder = JsonStateRecorder::new(&states_dir)?;
            let mut statistics = StatisticsCollector::new();
            let context = SimulationContext::new(config, ProgressReporter::new(event_tx), &mut recorder, &mut statistics);
            let outcome = CycleDriver::new(context).run(&network)?;
            if recorder.failures() > 0 {
                log::warn!("{} states could not be written", recorder.failures());
            }
            Ok((outcome, statistics))
        })
        .context("Failed to spawn simulation thread")?;

    while !worker.is_finished() {
        drain_events(&event_rx);
        thread::sleep(EVENT_POLL_INTERVAL);
    }
    drain_events(&event_rx);

    let (outcome, statistics) = match worker.join() {
        Ok(result) => result?,
        Err(_) => bail!("Simulation thread panicked"),
    };
    statistics.write(&cli.output.join("statistics.json"))?;

    println!("interval\tlifetime");
    for result in &outcome.history {
        println!("{:.2}\t{}", result.interval, result.lifetime);
    }
    println!(
        "Best interval {:.2} with lifetime {} ({:?}, {} states, simulated time {})",
        outcome.best.interval, outcome.best.lifetime, outcome.stop_reason, outcome.states, outcome.simulation_time
    );
    Ok(())
}
