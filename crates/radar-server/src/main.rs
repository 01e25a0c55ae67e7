//! Radar server - seeds the world, runs the conflict loop and logs
//! simulation events until Ctrl-C.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::broadcast;

use radar_core::SimulationEvent;
use radar_server::{logging, Config, RadarService, World, WorldSeed};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    logging::init_tracing(config.log_json)?;

    tracing::info!("Starting radar server (time scale x{})", config.time_scale);

    let now = Utc::now();
    let seed = match &config.seed_path {
        Some(path) => WorldSeed::from_path(path)?,
        None => WorldSeed::demo(now),
    };
    let world = Arc::new(World::new());
    seed.apply(&world, now)?;

    let service = RadarService::new(world, config);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let conflict_loop = service.spawn_conflict_loop(shutdown_tx.subscribe());
    let event_log = tokio::spawn(log_events(service.subscribe_simulation(), shutdown_tx.subscribe()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    service.shutdown();
    let _ = shutdown_tx.send(());
    let _ = tokio::join!(conflict_loop, event_log);

    Ok(())
}

async fn log_events(
    mut events: broadcast::Receiver<SimulationEvent>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            event = events.recv() => match event {
                Ok(SimulationEvent::Completed { flight_id, arrival_airport_id, .. }) => {
                    tracing::info!("Flight {} arrived at {}", flight_id, arrival_airport_id);
                }
                Ok(SimulationEvent::Aborted { flight_id, reason, .. }) => {
                    tracing::warn!("Flight {} aborted: {}", flight_id, reason);
                }
                Ok(SimulationEvent::PositionUpdate(_)) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event log lagged, skipped {} event(s)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
