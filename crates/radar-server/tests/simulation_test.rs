//! Flight simulation runtime tests.
//!
//! Simulated flights run under paused tokio time, so a full CMN -> RAK
//! flight completes instantly and deterministically.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Barrier};
use tokio::time::timeout;

use radar_core::{AircraftStatus, FlightPhase, FlightProfile, RadarError, SimulationEvent};
use radar_server::{Config, RadarService, World, WorldSeed};

fn service() -> RadarService {
    let now = Utc::now();
    let world = Arc::new(World::new());
    WorldSeed::demo(now).apply(&world, now).unwrap();
    RadarService::new(world, Config::default())
}

async fn next_event(events: &mut broadcast::Receiver<SimulationEvent>) -> SimulationEvent {
    timeout(Duration::from_secs(600), events.recv())
        .await
        .expect("no simulation event within timeout")
        .expect("event channel closed")
}

#[tokio::test(start_paused = true)]
async fn test_start_puts_aircraft_in_the_air() {
    let service = service();
    let departure_time = Utc::now();

    let flight = service
        .start_simulation("CN-AT02", "CMN", "RAK", departure_time)
        .unwrap();

    assert!(flight.flight_id.starts_with("ATT02"));
    assert_eq!(flight.flight_id.len(), 9);
    let expected_secs = FlightProfile::default().estimated_flight_secs(flight.total_distance_km) as i64;
    assert_eq!((flight.estimated_arrival - departure_time).num_seconds(), expected_secs);

    assert!(service.is_simulation_running("CN-AT02"));
    let aircraft = service.world().get_aircraft("CN-AT02").unwrap();
    assert_eq!(aircraft.status, AircraftStatus::Airborne);
    assert!(aircraft.airport_id.is_none());
    assert_eq!(aircraft.ground_speed_kmh, 250.0);
    assert_eq!(aircraft.altitude_m, 0.0);

    let snapshot = service.simulation_snapshot(&flight.flight_id).unwrap();
    assert_eq!(snapshot.phase, FlightPhase::Climb);
    assert_eq!(snapshot.distance_remaining_km, flight.total_distance_km);

    service.cancel_simulation("CN-AT02");
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_rejected() {
    let service = service();
    service.start_simulation("CN-AT02", "CMN", "RAK", Utc::now()).unwrap();

    let err = service
        .start_simulation("CN-AT02", "CMN", "RBA", Utc::now())
        .unwrap_err();
    assert_eq!(err, RadarError::AlreadyRunning("CN-AT02".to_string()));

    service.cancel_simulation("CN-AT02");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_admit_exactly_one() {
    let service = Arc::new(service());
    let barrier = Arc::new(Barrier::new(8));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            service.start_simulation("CN-AT01", "CMN", "RBA", Utc::now())
        }));
    }

    let mut successes = 0;
    let mut rejections = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(RadarError::AlreadyRunning(id)) => {
                assert_eq!(id, "CN-AT01");
                rejections += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(rejections, 7);
    assert_eq!(service.active_simulations().len(), 1);
    assert!(service.cancel_simulation("CN-AT01"));
}

#[tokio::test(start_paused = true)]
async fn test_flight_runs_to_completion() {
    let service = service();
    let mut events = service.subscribe_simulation();
    let flight = service.start_simulation("CN-AT02", "CMN", "RAK", Utc::now()).unwrap();

    let mut phases = vec![FlightPhase::Climb];
    let mut last_remaining = f64::INFINITY;
    let mut updates = 0;

    loop {
        match next_event(&mut events).await {
            SimulationEvent::PositionUpdate(snapshot) => {
                assert_eq!(snapshot.flight_id, flight.flight_id);
                assert!(snapshot.distance_remaining_km <= last_remaining);
                last_remaining = snapshot.distance_remaining_km;
                if phases.last() != Some(&snapshot.phase) {
                    phases.push(snapshot.phase);
                }
                updates += 1;
            }
            SimulationEvent::Completed {
                flight_id,
                arrival_airport_id,
                ..
            } => {
                assert_eq!(flight_id, flight.flight_id);
                assert_eq!(arrival_airport_id, "RAK");
                break;
            }
            SimulationEvent::Aborted { reason, .. } => panic!("flight aborted: {reason}"),
        }
    }

    assert_eq!(
        phases,
        vec![
            FlightPhase::Climb,
            FlightPhase::Cruise,
            FlightPhase::Descent,
            FlightPhase::Complete
        ]
    );
    assert!(updates > 200);
    assert!(!service.is_simulation_running("CN-AT02"));
    assert!(matches!(
        service.simulation_snapshot(&flight.flight_id),
        Err(RadarError::FlightNotFound(_))
    ));

    let aircraft = service.world().get_aircraft("CN-AT02").unwrap();
    let rak = service.world().get_airport("RAK").unwrap();
    assert_eq!(aircraft.status, AircraftStatus::OnGround);
    assert_eq!(aircraft.airport_id.as_deref(), Some("RAK"));
    assert_eq!(aircraft.position, Some(rak.position()));
    assert_eq!(aircraft.altitude_m, 0.0);
    assert_eq!(aircraft.ground_speed_kmh, 0.0);

    // The aircraft can fly again once landed
    let next = service.start_simulation("CN-AT02", "RAK", "CMN", Utc::now()).unwrap();
    assert_ne!(next.flight_id, flight.flight_id);
    service.cancel_simulation("CN-AT02");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_ticks() {
    let service = service();
    let mut events = service.subscribe_simulation();
    let flight = service.start_simulation("CN-AT05", "RAK", "CMN", Utc::now()).unwrap();

    for _ in 0..3 {
        assert!(matches!(
            next_event(&mut events).await,
            SimulationEvent::PositionUpdate(_)
        ));
    }
    let before = service.world().get_aircraft("CN-AT05").unwrap();

    assert!(service.cancel_simulation("CN-AT05"));
    assert!(!service.cancel_simulation("CN-AT05"));
    match next_event(&mut events).await {
        SimulationEvent::Aborted {
            flight_id, reason, ..
        } => {
            assert_eq!(flight_id, flight.flight_id);
            assert_eq!(reason, "cancelled");
        }
        other => panic!("expected abort, got {other:?}"),
    }

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(matches!(
        events.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
    assert!(!service.is_simulation_running("CN-AT05"));
    assert_eq!(service.world().get_aircraft("CN-AT05").unwrap(), before);
}

#[tokio::test(start_paused = true)]
async fn test_vanished_aircraft_aborts_run() {
    let service = service();
    let mut events = service.subscribe_simulation();
    service.start_simulation("CN-AT03", "RBA", "CMN", Utc::now()).unwrap();

    assert!(matches!(
        next_event(&mut events).await,
        SimulationEvent::PositionUpdate(_)
    ));
    let removed = service.world().remove_aircraft("CN-AT03").unwrap();

    match next_event(&mut events).await {
        SimulationEvent::Aborted { aircraft_id, .. } => assert_eq!(aircraft_id, "CN-AT03"),
        other => panic!("expected abort, got {other:?}"),
    }
    assert!(!service.is_simulation_running("CN-AT03"));

    // No zombie entry blocks a fresh start
    service.world().upsert_aircraft(removed);
    service.start_simulation("CN-AT03", "RBA", "CMN", Utc::now()).unwrap();
    assert!(service.is_simulation_running("CN-AT03"));
    service.cancel_simulation("CN-AT03");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_everything() {
    let service = service();
    service.start_simulation("CN-AT01", "CMN", "RBA", Utc::now()).unwrap();
    service.start_simulation("CN-AT07", "TNG", "RBA", Utc::now()).unwrap();
    assert_eq!(service.active_simulations().len(), 2);

    service.shutdown();
    assert!(service.active_simulations().is_empty());
}
