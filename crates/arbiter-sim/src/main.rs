//! Arbiter workload simulator entry point.

use std::error::Error;
use std::sync::Arc;

use arbiter_core::config::ArbiterConfig;
use arbiter_core::rng::SeededRng;
use arbiter_ownership::application::resource_manager::ResourceManager;
use arbiter_sim::{SimulationConfig, run_simulation};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Read configuration from environment.
    let arbiter_config = ArbiterConfig::from_env()?;
    let sim_config = SimulationConfig::from_env()?;
    tracing::info!(
        queue_capacity = arbiter_config.queue_capacity,
        replay_on_release = arbiter_config.replay_on_release,
        symphonies = sim_config.symphonies,
        instances = sim_config.instances,
        resources = sim_config.resources,
        rounds = sim_config.rounds,
        seed = sim_config.seed,
        "Starting arbiter simulation"
    );

    let manager = Arc::new(ResourceManager::from_config(arbiter_config));
    let mut rng = SeededRng::new(sim_config.seed);
    let report = run_simulation(manager, &sim_config, &mut rng).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
