//! # lumod — lumo daemon
//!
//! Composition root that wires the hub and every configured behavior.
//!
//! ## Responsibilities
//! - Load configuration (`lumo.toml`, env overrides)
//! - Initialise logging
//! - Build the virtual hub and seed the entities the behaviors refer to
//! - Start every brightness cycler and motion light, skipping broken ones
//! - Feed state changes read from stdin into the hub
//! - Shut everything down on Ctrl-C
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod driver;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use lumo_adapter_virtual::VirtualHub;
use lumo_app::brightness_cycler::{BrightnessCycler, BrightnessCyclerHandle};
use lumo_app::motion_light::{MotionLightController, MotionLightHandle};
use lumo_domain::config::{BrightnessCyclerSettings, MotionLightSettings};
use lumo_domain::entity::EntityState;
use lumo_domain::id::EntityId;

use config::{Config, Instance};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cyclers = valid_instances("brightness cycler", config.brightness_cyclers());
    let lights = valid_instances("motion light", config.motion_lights());

    let hub = Arc::new(build_hub(&config, &cyclers, &lights));

    let mut cycler_handles: Vec<(String, BrightnessCyclerHandle)> = Vec::new();
    for (name, settings) in cyclers {
        match BrightnessCycler::start(Arc::clone(&hub), name.as_str(), settings).await {
            Ok(handle) => cycler_handles.push((name, handle)),
            Err(err) => tracing::error!(%err, %name, "failed to start brightness cycler"),
        }
    }

    let mut light_handles: Vec<(String, MotionLightHandle)> = Vec::new();
    for (name, settings) in lights {
        match MotionLightController::start(Arc::clone(&hub), name.as_str(), settings).await {
            Ok(handle) => light_handles.push((name, handle)),
            Err(err) => tracing::error!(%err, %name, "failed to start motion light"),
        }
    }

    tracing::info!(
        brightness_cyclers = cycler_handles.len(),
        motion_lights = light_handles.len(),
        entities = hub.entity_ids().len(),
        "lumod running, reading entity changes from stdin"
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let driver = tokio::spawn(driver::run(Arc::clone(&hub), stdin));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");
    driver.abort();

    for (name, handle) in cycler_handles {
        if let Err(err) = handle.shutdown().await {
            tracing::error!(%err, %name, "brightness cycler did not stop cleanly");
        }
    }
    for (name, handle) in light_handles {
        if let Err(err) = handle.shutdown().await {
            tracing::error!(%err, %name, "motion light stopped on an error");
        }
    }

    Ok(())
}

/// Keep the instances that parsed; log and drop the rest.
fn valid_instances<S>(kind: &str, instances: Vec<Instance<S>>) -> Vec<(String, S)> {
    instances
        .into_iter()
        .filter_map(|(name, parsed)| match parsed {
            Ok(settings) => Some((name, settings)),
            Err(err) => {
                tracing::error!(%err, %name, kind, "skipping invalid instance");
                None
            }
        })
        .collect()
}

/// Seed every entity a behavior refers to, then apply the explicit initial
/// states from `[virtual.entities]`.
fn build_hub(
    config: &Config,
    cyclers: &[(String, BrightnessCyclerSettings)],
    lights: &[(String, MotionLightSettings)],
) -> VirtualHub {
    let hub = VirtualHub::new();
    let seed = |entity_id: &EntityId, state: EntityState| {
        if !hub.contains(entity_id) {
            hub.add_entity(entity_id.clone(), state);
        }
    };

    for (_, settings) in cyclers {
        seed(&settings.light, EntityState::Off);
        for switch in &settings.switches {
            seed(switch, EntityState::Off);
        }
    }
    for (_, settings) in lights {
        seed(&settings.light, EntityState::Off);
        for entity_id in settings
            .switches
            .iter()
            .chain(&settings.pushbuttons)
            .chain(&settings.motion_sensors)
        {
            seed(entity_id, EntityState::Off);
        }
        if let Some(sensor) = &settings.illumination_sensor {
            seed(sensor, EntityState::Unknown);
        }
    }

    for (entity_id, state) in config.virtual_entities() {
        hub.add_entity(entity_id, state);
    }
    hub
}
