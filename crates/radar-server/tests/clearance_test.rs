//! Takeoff and landing clearance and departure tests against a seeded world.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Barrier;

use radar_core::{AircraftStatus, ClearanceOutcome, GeoPoint, RadarError, WeatherObservation};
use radar_server::{Config, RadarService, World, WorldSeed};

fn service() -> RadarService {
    let now = Utc::now();
    let world = Arc::new(World::new());
    WorldSeed::demo(now).apply(&world, now).unwrap();
    RadarService::new(world, Config::default())
}

/// Put an aircraft in the air `distance_km` north of an airport, with no
/// simulation attached.
fn fly_near(service: &RadarService, aircraft_id: &str, airport_id: &str, distance_km: f64) {
    let airport = service.world().get_airport(airport_id).unwrap();
    service.world().update_aircraft(aircraft_id, |aircraft| {
        aircraft.status = AircraftStatus::Airborne;
        aircraft.airport_id = None;
        aircraft.position = Some(airport.position().project(0.0, distance_km));
        aircraft.altitude_m = 2500.0;
    });
}

fn set_weather(service: &RadarService, airport_id: &str, f: impl FnOnce(&mut WeatherObservation)) {
    let mut weather = service.world().latest_weather(airport_id).unwrap();
    f(&mut weather);
    service.world().record_weather(weather);
}

#[tokio::test]
async fn test_clear_day_is_granted() {
    let service = service();
    let decision = service.request_takeoff_clearance("CN-AT01");
    assert_eq!(decision.outcome, ClearanceOutcome::Granted);
    assert!(decision.checks.iter().all(|check| check.passed));
    // The engine only decides
    assert_eq!(
        service.world().get_aircraft("CN-AT01").unwrap().status,
        AircraftStatus::OnGround
    );
}

#[tokio::test]
async fn test_low_visibility_is_refused() {
    let service = service();
    set_weather(&service, "CMN", |weather| weather.visibility_km = 0.3);

    let decision = service.request_takeoff_clearance("CN-AT01");
    assert_eq!(decision.outcome, ClearanceOutcome::Refused);
    let visibility = decision.check("visibility").unwrap();
    assert!(!visibility.passed);
    assert!(visibility.explanation.contains("0.30"));
    assert!(visibility.explanation.contains("0.55"));
}

#[tokio::test]
async fn test_runway_occupied_is_pending() {
    let service = service();
    service
        .world()
        .set_status("CN-AT02", AircraftStatus::TakeoffRoll, Utc::now());

    let decision = service.request_takeoff_clearance("CN-AT01");
    assert_eq!(decision.outcome, ClearanceOutcome::Pending);
    assert!(!decision.check("runway_available").unwrap().passed);
}

#[tokio::test]
async fn test_nearby_traffic_is_pending() {
    let service = service();
    let cmn = service.world().get_airport("CMN").unwrap();
    service.world().update_aircraft("CN-AT05", |aircraft| {
        aircraft.status = AircraftStatus::Airborne;
        aircraft.airport_id = None;
        aircraft.position = Some(cmn.position().project(300.0, 4.0));
        aircraft.altitude_m = 1200.0;
    });

    let decision = service.request_takeoff_clearance("CN-AT01");
    assert_eq!(decision.outcome, ClearanceOutcome::Pending);
    assert!(decision
        .check("traffic_separation")
        .unwrap()
        .explanation
        .contains("CN-AT05"));
}

#[tokio::test]
async fn test_stale_marginal_weather_without_transponder_is_refused() {
    let service = service();
    set_weather(&service, "CMN", |weather| {
        weather.observed_at = Utc::now() - Duration::hours(2);
        weather.visibility_km = 0.8;
    });
    service
        .world()
        .update_aircraft("CN-AT01", |aircraft| aircraft.transponder_code = None);

    let decision = service.request_takeoff_clearance("CN-AT01");
    assert_eq!(decision.outcome, ClearanceOutcome::Refused);
    assert!(!decision.check("risk_score").unwrap().passed);
}

#[tokio::test]
async fn test_unknown_aircraft_is_refused() {
    let decision = service().request_takeoff_clearance("CN-ZZZ");
    assert_eq!(decision.outcome, ClearanceOutcome::Refused);
    assert_eq!(decision.checks.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_depart_starts_simulation() {
    let service = service();
    let departure = service.depart("CN-AT02", "RAK").unwrap();

    assert_eq!(departure.decision.outcome, ClearanceOutcome::Granted);
    let flight = departure.flight.unwrap();
    assert_eq!(flight.aircraft_id, "CN-AT02");
    assert!(service.is_simulation_running("CN-AT02"));

    let aircraft = service.world().get_aircraft("CN-AT02").unwrap();
    assert_eq!(aircraft.status, AircraftStatus::Airborne);
    assert_eq!(
        aircraft.position,
        Some(GeoPoint::new(33.3675, -7.5898))
    );

    // Already flying
    assert_eq!(
        service.depart("CN-AT02", "RBA").unwrap_err(),
        RadarError::AlreadyRunning("CN-AT02".to_string())
    );
    service.cancel_simulation("CN-AT02");
}

#[tokio::test]
async fn test_depart_refused_stays_on_ground() {
    let service = service();
    set_weather(&service, "RBA", |weather| {
        weather.alert = true;
        weather.conditions = "Severe turbulence".to_string();
    });

    let departure = service.depart("CN-AT03", "CMN").unwrap();
    assert_eq!(departure.decision.outcome, ClearanceOutcome::Refused);
    assert!(departure.flight.is_none());
    assert!(!service.is_simulation_running("CN-AT03"));
    assert_eq!(
        service.world().get_aircraft("CN-AT03").unwrap().status,
        AircraftStatus::OnGround
    );
}

#[tokio::test]
async fn test_depart_validates_route() {
    let service = service();
    assert_eq!(
        service.depart("CN-AT01", "CMN").unwrap_err(),
        RadarError::InvalidRoute("CMN".to_string())
    );
    assert_eq!(
        service.depart("CN-AT01", "AGA").unwrap_err(),
        RadarError::AirportNotFound("AGA".to_string())
    );
    assert_eq!(
        service.depart("CN-ZZZ", "RAK").unwrap_err(),
        RadarError::AircraftNotFound("CN-ZZZ".to_string())
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_departures_start_one_flight() {
    for _ in 0..25 {
        let service = Arc::new(service());
        let barrier = Arc::new(Barrier::new(8));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                service.depart("CN-AT02", "RAK")
            }));
        }

        let mut flights = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(departure) if departure.flight.is_some() => flights += 1,
                // Lost the race after the winner left the stand
                Ok(departure) => assert_ne!(departure.decision.outcome, ClearanceOutcome::Granted),
                Err(RadarError::AlreadyRunning(id)) => assert_eq!(id, "CN-AT02"),
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(flights, 1);
        assert!(service.is_simulation_running("CN-AT02"));
        let aircraft = service.world().get_aircraft("CN-AT02").unwrap();
        assert_eq!(aircraft.status, AircraftStatus::Airborne);
        assert!(aircraft.airport_id.is_none());
        assert!(service.cancel_simulation("CN-AT02"));
    }
}

#[tokio::test]
async fn test_landing_granted_puts_aircraft_on_runway() {
    let service = service();
    fly_near(&service, "CN-AT01", "RAK", 20.0);

    let decision = service.request_landing_clearance("CN-AT01", "RAK").unwrap();
    assert_eq!(decision.outcome, ClearanceOutcome::Granted);
    assert!(decision.checks.iter().all(|check| check.passed));

    let aircraft = service.world().get_aircraft("CN-AT01").unwrap();
    assert_eq!(aircraft.status, AircraftStatus::Landing);
    assert_eq!(aircraft.airport_id.as_deref(), Some("RAK"));

    // Runway now busy for the next arrival
    fly_near(&service, "CN-AT03", "RAK", 30.0);
    let decision = service.request_landing_clearance("CN-AT03", "RAK").unwrap();
    assert_eq!(decision.outcome, ClearanceOutcome::Pending);
    assert!(decision
        .check("runway_available")
        .unwrap()
        .explanation
        .contains("CN-AT01"));
    assert_eq!(
        service.world().get_aircraft("CN-AT03").unwrap().status,
        AircraftStatus::Holding
    );
}

#[tokio::test]
async fn test_landing_in_fog_holds_until_it_lifts() {
    let service = service();
    fly_near(&service, "CN-AT01", "TNG", 15.0);
    set_weather(&service, "TNG", |weather| weather.conditions = "Fog".to_string());

    let decision = service.request_landing_clearance("CN-AT01", "TNG").unwrap();
    assert_eq!(decision.outcome, ClearanceOutcome::Refused);
    assert!(!decision.check("hazardous_conditions").unwrap().passed);
    assert_eq!(
        service.world().get_aircraft("CN-AT01").unwrap().status,
        AircraftStatus::Holding
    );

    set_weather(&service, "TNG", |weather| weather.conditions = "Clear".to_string());
    let decision = service.request_landing_clearance("CN-AT01", "TNG").unwrap();
    assert!(decision.is_granted());
    assert_eq!(
        service.world().get_aircraft("CN-AT01").unwrap().status,
        AircraftStatus::Landing
    );
}

#[tokio::test]
async fn test_landing_requires_flying_aircraft_and_known_airport() {
    let service = service();

    let decision = service.request_landing_clearance("CN-AT01", "RBA").unwrap();
    assert_eq!(decision.outcome, ClearanceOutcome::Refused);
    assert!(!decision.check("airborne").unwrap().passed);
    assert_eq!(
        service.world().get_aircraft("CN-AT01").unwrap().status,
        AircraftStatus::OnGround
    );

    assert_eq!(
        service.request_landing_clearance("CN-AT01", "AGA").unwrap_err(),
        RadarError::AirportNotFound("AGA".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_landing_decision_is_advisory_for_simulated_flight() {
    let service = service();
    service.depart("CN-AT02", "RAK").unwrap();

    // Just departed CMN, far outside the approach radius
    let decision = service.request_landing_clearance("CN-AT02", "RAK").unwrap();
    assert_eq!(decision.outcome, ClearanceOutcome::Pending);
    assert!(!decision.check("approach_range").unwrap().passed);
    assert_eq!(
        service.world().get_aircraft("CN-AT02").unwrap().status,
        AircraftStatus::Airborne
    );
    assert!(service.is_simulation_running("CN-AT02"));
    service.cancel_simulation("CN-AT02");
}
