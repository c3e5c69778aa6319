//! Simulation entry point.
//!
//! Runs the manager and one demo component per configured participant on a
//! shared in-process broker.
mod demo;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use sim_bootstrap::{LoggingConfig, PlatformConfig, logging};
use sim_messages::{Message, MessageFactory};
use sim_runtime::{
    BusClient, ComponentConfig, ComponentState, ManagerState, MemoryBroker, SimulationComponent,
    SimulationManager, SimulationOutcome,
};
use tracing::{info, warn};

use demo::{DemoProcessor, RESULT_MESSAGE_TYPE};

const DEMO_MAX_DELAY: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = logging::init(&LoggingConfig::from_env())?;
    let PlatformConfig {
        bus,
        component,
        manager,
    } = PlatformConfig::from_env();

    if manager.components.is_empty() {
        warn!("SIMULATION_COMPONENTS is empty, the simulation will stop right away");
    }

    let broker = if bus.login.is_empty() {
        MemoryBroker::new()
    } else {
        MemoryBroker::with_credentials(bus.login.clone(), bus.password.clone())
    };
    let factory = Arc::new(MessageFactory::default());
    factory.register_general(RESULT_MESSAGE_TYPE);

    let monitor = BusClient::connect(&broker, bus.clone(), Arc::clone(&factory)).await?;
    monitor
        .add_listener(["Result.#"], |message, topic| {
            if let Message::General(result) = &message
                && let Some(fields) = result.result()
            {
                info!(
                    %topic,
                    epoch = fields.epoch_number(),
                    source = result.envelope().source_process_id(),
                    "result received"
                );
            }
            std::future::ready(())
        })
        .await?;

    let mut components = Vec::with_capacity(manager.components.len());
    for name in &manager.components {
        let config = ComponentConfig {
            simulation_id: manager.simulation_id.clone(),
            component_name: name.clone(),
            ..component.clone()
        };
        let handle = SimulationComponent::new(config, DemoProcessor::new(name, DEMO_MAX_DELAY))
            .start(&broker, bus.clone(), Arc::clone(&factory))
            .await?;
        components.push(handle);
    }

    let grace = manager.stop_grace_period;
    let handle = SimulationManager::new(manager)
        .start(&broker, bus, Arc::clone(&factory))
        .await?;

    let mut states = handle.subscribe_state();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, stopping the simulation");
            handle.stop().await?;
        }
        _ = states.wait_for(|state| *state == ManagerState::Stopped) => {}
    }
    let outcome = handle.wait().await?;

    for component in components {
        let stopped =
            tokio::time::timeout(grace, component.wait_for_state(ComponentState::is_stopped)).await;
        if !matches!(stopped, Ok(Ok(_))) {
            warn!(component = component.name(), "component did not stop, stopping it");
            if let Err(error) = component.stop().await {
                warn!(component = component.name(), %error, "component stop failed");
            }
        }
    }
    monitor.close().await;

    match outcome {
        SimulationOutcome::Completed { epochs } => {
            info!(epochs, "simulation completed");
            Ok(())
        }
        SimulationOutcome::Failed { reason } => bail!("simulation failed: {reason}"),
    }
}
