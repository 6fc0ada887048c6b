//! Command-line runner for the Parley simulation.
//!
//! ```text
//! parley-engine [scenario-file] [direction-script]
//! ```
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `PARLEY_CONFIG` (default `parley-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Load the scenario, or generate a random one when none is given
//! 4. Build the simulator and subscribe the tracing observer
//! 5. Run until goals are reached, the step limit hits, or the world stalls
//! 6. Print the run summary as JSON on stdout

mod error;

use std::path::Path;

use parley_core::config::{LogFormat, LoggingConfig, SimulationConfig};
use parley_core::direction::{DirectionSource, HoldPosition, ScriptedDirections};
use parley_core::observer::TracingObserver;
use parley_core::runner;
use parley_core::scenario::Scenario;
use parley_core::simulator::Simulator;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Environment variable naming the config file.
const CONFIG_PATH_ENV: &str = "PARLEY_CONFIG";
/// Config file used when `PARLEY_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "parley-config.yaml";

/// Random world used when no scenario file is given.
const RANDOM_WIDTH: u32 = 10;
const RANDOM_HEIGHT: u32 = 10;
const RANDOM_OBSTACLES: usize = 12;
const RANDOM_AGENTS: u32 = 4;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, scenario, or script loading fails,
/// or if the simulation hits an internal inconsistency.
fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        seed = config.simulation.seed,
        max_steps = config.simulation.max_steps,
        culture = ?config.simulation.culture,
        communication = config.simulation.communication,
        "parley-engine starting"
    );

    let mut args = std::env::args().skip(1);
    let scenario_path = args.next();
    let script = args.next();

    // 3. Load or generate the world.
    let mut rng = SmallRng::seed_from_u64(config.simulation.seed);
    let scenario = match scenario_path.as_deref() {
        Some(path) => {
            info!(path, "Loading scenario");
            Scenario::from_file(Path::new(path))?
        }
        None => {
            info!(
                width = RANDOM_WIDTH,
                height = RANDOM_HEIGHT,
                agents = RANDOM_AGENTS,
                "No scenario given, generating a random world"
            );
            Scenario::random(
                RANDOM_WIDTH,
                RANDOM_HEIGHT,
                RANDOM_OBSTACLES,
                RANDOM_AGENTS,
                &mut rng,
            )?
        }
    };

    let mut directions: Box<dyn DirectionSource> = match script.as_deref() {
        Some(text) => Box::new(ScriptedDirections::parse(text)?),
        None => Box::new(HoldPosition::new()),
    };

    // 4. Build the simulator.
    let max_steps = config.simulation.max_steps;
    let mut sim = Simulator::from_scenario(&scenario, config, rng)?;
    sim.subscribe(Box::new(TracingObserver));

    // 5. Run.
    let result = runner::run_simulation(&mut sim, directions.as_mut(), max_steps)?;
    runner::log_simulation_end(&result);

    // 6. Report.
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Load configuration from `PARLEY_CONFIG`, falling back to defaults when
/// the file does not exist.
fn load_config() -> Result<SimulationConfig, EngineError> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
    let config_path = Path::new(&path);
    if config_path.exists() {
        Ok(SimulationConfig::from_file(config_path)?)
    } else {
        Ok(SimulationConfig::default())
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init(),
    }
}
