//! Demo scenario - clearance, departure and a full simulated flight.
//!
//! Seeds the world, requests takeoff clearance for one aircraft, departs it
//! and follows the flight until it lands. With `--opposing`, an aircraft
//! flying the reverse route departs too, so the conflict loop has traffic
//! to report when the two pass each other.
//!
//! Usage:
//!   cargo run -p radar-server --bin demo_scenario -- --aircraft CN-AT02

use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Parser;
use tokio::sync::broadcast;

use radar_core::{ClearanceDecision, FlightPhase, SimulationEvent};
use radar_server::{logging, Config, RadarService, World, WorldSeed};

#[derive(Parser, Debug)]
#[command(author, version, about = "Demo: takeoff clearance and a simulated flight to landing")]
struct Args {
    /// Aircraft to depart
    #[arg(long, default_value = "CN-AT02")]
    aircraft: String,

    /// Arrival airport; defaults to the aircraft's planned arrival
    #[arg(long)]
    to: Option<String>,

    /// Simulated seconds per wall-clock second
    #[arg(long, default_value_t = 200.0)]
    time_scale: f64,

    /// JSON world seed instead of the built-in network
    #[arg(long)]
    seed: Option<std::path::PathBuf>,

    /// Also depart an aircraft flying the reverse route
    #[arg(long, default_value_t = false)]
    opposing: bool,

    /// Emit JSON logs
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

fn print_decision(decision: &ClearanceDecision) {
    println!(
        "[CLEARANCE] {} -> {:?}: {}",
        decision.aircraft_id, decision.outcome, decision.summary
    );
    for check in &decision.checks {
        let mark = if check.passed { "ok  " } else { "FAIL" };
        println!("    {} {:<20} {}", mark, check.name, check.explanation);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_tracing(args.log_json)?;

    let config = Config {
        time_scale: args.time_scale,
        seed_path: args.seed.clone(),
        log_json: args.log_json,
        ..Config::default()
    };
    config.validate()?;

    let now = Utc::now();
    let seed = match &config.seed_path {
        Some(path) => WorldSeed::from_path(path)?,
        None => WorldSeed::demo(now),
    };
    let world = Arc::new(World::new());
    seed.apply(&world, now)?;

    let Some(aircraft) = world.get_aircraft(&args.aircraft) else {
        bail!("unknown aircraft {}", args.aircraft);
    };
    let Some(origin) = aircraft.airport_id.clone() else {
        bail!("aircraft {} has no assigned airport", args.aircraft);
    };
    let destination = match args.to.clone().or_else(|| seed.planned_arrival(&args.aircraft).map(str::to_string)) {
        Some(destination) => destination,
        None => bail!("no destination given for {}", args.aircraft),
    };

    println!("=== RADAR DEMO: {} {} -> {} ===", args.aircraft, origin, destination);
    println!();

    let service = RadarService::new(world.clone(), config);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let conflict_loop = service.spawn_conflict_loop(shutdown_tx.subscribe());
    let mut events = service.subscribe_simulation();
    let mut conflicts = service.subscribe_conflicts();

    let departure = service.depart(&args.aircraft, &destination)?;
    print_decision(&departure.decision);
    let Some(flight) = departure.flight else {
        let _ = shutdown_tx.send(());
        bail!("{} was not cleared for takeoff", args.aircraft);
    };
    println!(
        "[DEPART] {} airborne as {}, {:.1} km, ETA {}",
        args.aircraft,
        flight.flight_id,
        flight.total_distance_km,
        flight.estimated_arrival.format("%H:%M:%S")
    );

    if args.opposing {
        let opposing = world
            .aircraft_at(&destination)
            .into_iter()
            .find(|other| seed.planned_arrival(&other.aircraft_id) == Some(origin.as_str()));
        match opposing {
            Some(other) => {
                let departure = service.depart(&other.aircraft_id, &origin)?;
                print_decision(&departure.decision);
                if let Some(flight) = departure.flight {
                    println!("[DEPART] {} airborne as {}", other.aircraft_id, flight.flight_id);
                }
            }
            None => println!("[DEPART] no aircraft at {} bound for {}", destination, origin),
        }
    }
    println!();

    let mut last_phase = FlightPhase::Climb;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SimulationEvent::PositionUpdate(snapshot)) if snapshot.flight_id == flight.flight_id => {
                    if snapshot.phase != last_phase {
                        println!(
                            "[{:>6.0}s] {} -> {} at ({:.4}, {:.4}) alt {:.0} m, {:.1} km to go",
                            snapshot.elapsed_secs,
                            last_phase,
                            snapshot.phase,
                            snapshot.lat,
                            snapshot.lon,
                            snapshot.altitude_m,
                            snapshot.distance_remaining_km
                        );
                        last_phase = snapshot.phase;
                    }
                }
                Ok(SimulationEvent::Completed { flight_id, arrival_airport_id, completed_at, .. })
                    if flight_id == flight.flight_id =>
                {
                    println!("[LANDED] {} at {} ({})", flight_id, arrival_airport_id, completed_at.format("%H:%M:%S"));
                    break;
                }
                Ok(SimulationEvent::Aborted { flight_id, reason, .. }) if flight_id == flight.flight_id => {
                    println!("[ABORTED] {}: {}", flight_id, reason);
                    break;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
            alerts = conflicts.recv() => {
                if let Ok(alerts) = alerts {
                    for alert in alerts.iter().filter(|alert| alert.involves(&args.aircraft)) {
                        if let Some(advisory) = alert.advisory_for(&args.aircraft) {
                            println!("[CONFLICT] {}", advisory);
                        }
                    }
                }
            }
        }
    }

    if let Some(state) = world.get_aircraft(&args.aircraft) {
        println!(
            "[FINAL] {} {:?} at {}",
            state.aircraft_id,
            state.status,
            state.airport_id.as_deref().unwrap_or("-")
        );
    }

    service.shutdown();
    let _ = shutdown_tx.send(());
    let _ = conflict_loop.await;
    Ok(())
}
