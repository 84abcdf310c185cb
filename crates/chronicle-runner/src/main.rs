//! Service entry point for the Chronicle narrative engine.
//!
//! The runner wires every piece together with explicit construction:
//! `PostgreSQL` stores, the in-process event bus, the arc lifecycle
//! controller with its LLM generation adapter, the event aggregator, and
//! the faction/character/location reactors. Once wired, the process is
//! driven entirely by events: anything published to `world.event.logged`
//! feeds the aggregator, which calls into the lifecycle controller when
//! the trigger condition is met.
//!
//! # Architecture
//!
//! ```text
//! bus (world.event.logged) --> aggregator --> lifecycle --> LLM backend
//!                                   |             |
//!                             flush timer    bus (beat.created, ...)
//!                                                 |
//!                                     faction / character / location reactors
//! ```

mod config;
mod error;
mod generation;
mod llm;
mod parse;
mod prompt;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chrono::Utc;
use chronicle_bus::EventBus;
use chronicle_db::{
    PgCharacterStore, PgFactionStore, PgLocationStore, PgNarrativeStore, PostgresConfig,
    PostgresPool,
};
use chronicle_engine::config::EngineConfig;
use chronicle_engine::{ArcLifecycle, EventAggregator};
use chronicle_reactors::{CharacterReactor, FactionReactor, LocationReactor};
use chronicle_types::{World, WorldId};

use crate::config::RunnerConfig;
use crate::generation::LlmGeneration;
use crate::llm::create_backend;
use crate::prompt::PromptEngine;

/// Application entry point.
///
/// Initializes logging, loads configuration, connects to `PostgreSQL`,
/// wires the bus, engine, and reactors, then waits for shutdown.
///
/// # Errors
///
/// Returns an error if any wiring step fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("chronicle-runner starting");

    // Load configuration: deployment settings from the environment,
    // engine settings from the YAML file.
    let config = RunnerConfig::from_env().context("runner configuration")?;
    let engine_config = load_engine_config(&config.config_path);
    info!(
        world = config.world_name,
        config_path = config.config_path,
        templates_dir = config.templates_dir,
        severe_event_threshold = engine_config.trigger.severe_event_threshold,
        flush_interval_secs = engine_config.trigger.flush_interval_secs,
        "configuration loaded"
    );

    // Connect to PostgreSQL and apply migrations
    let pool = PostgresPool::connect(&PostgresConfig::new(&config.database_url))
        .await
        .context("connecting to PostgreSQL")?;
    pool.run_migrations().await.context("running migrations")?;
    info!("database ready");

    // The shared bus carries every cross-module event
    let bus = Arc::new(EventBus::new(engine_config.bus.limits()));

    // LLM generation adapter
    let prompt_engine = PromptEngine::new(&config.templates_dir)
        .context("loading prompt templates")?;
    let primary = create_backend(&config.primary_backend);
    info!(
        backend = primary.name(),
        model = config.primary_backend.model,
        "primary LLM backend configured"
    );
    let fallback = config.fallback_backend.as_ref().map(|cfg| {
        let backend = create_backend(cfg);
        info!(
            backend = backend.name(),
            model = cfg.model,
            "fallback LLM backend configured"
        );
        backend
    });
    let generation = LlmGeneration::new(prompt_engine, primary, fallback);

    // Lifecycle controller and aggregator
    let narrative_store = PgNarrativeStore::new(pool.pool().clone());
    let lifecycle = Arc::new(
        ArcLifecycle::new(generation, narrative_store.clone(), Arc::clone(&bus))
            .with_recent_event_limit(engine_config.trigger.recent_event_limit),
    );
    let aggregator = Arc::new(EventAggregator::new(
        Arc::clone(&lifecycle),
        engine_config.trigger.severe_event_threshold,
    ));
    aggregator.attach(&bus);
    tokio::spawn(
        Arc::clone(&aggregator).run_flush_timer(engine_config.trigger.flush_interval_secs),
    );

    // Reactive modules
    let factions = Arc::new(FactionReactor::new(
        PgFactionStore::new(pool.pool().clone()),
        Arc::clone(&bus),
    ));
    factions.attach(&bus);
    let characters = Arc::new(CharacterReactor::new(
        PgCharacterStore::new(pool.pool().clone()),
        Arc::clone(&bus),
    ));
    characters.attach(&bus);
    let locations = Arc::new(LocationReactor::new(
        PgLocationStore::new(pool.pool().clone()),
        Arc::clone(&bus),
    ));
    locations.attach(&bus);

    // Make sure the configured world exists
    let world_id = ensure_world(&narrative_store, &config.world_name).await?;
    info!(%world_id, world = config.world_name, "runner wired, waiting for events");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown signal received");
    pool.close().await;

    Ok(())
}

/// Load the engine YAML config, falling back to defaults when the file
/// is absent.
fn load_engine_config(path: &str) -> EngineConfig {
    let path = Path::new(path);
    if path.exists() {
        match EngineConfig::from_file(path) {
            Ok(config) => return config,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "engine config unreadable, using defaults");
            }
        }
    } else {
        warn!(path = %path.display(), "engine config not found, using defaults");
    }
    EngineConfig::default()
}

/// Look up the configured world by name, creating it on first start.
async fn ensure_world(store: &PgNarrativeStore, name: &str) -> anyhow::Result<WorldId> {
    if let Some(world) = store
        .find_world_by_name(name)
        .await
        .context("looking up world")?
    {
        return Ok(world.id);
    }

    let world = World {
        id: WorldId::new(),
        name: name.to_owned(),
        current_arc_id: None,
        created_at: Utc::now(),
    };
    store.insert_world(&world).await.context("creating world")?;
    info!(world_id = %world.id, name, "created world");
    Ok(world.id)
}
