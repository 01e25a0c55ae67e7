//! Clearance context assembly from the world store.

use chrono::{DateTime, Utc};

use radar_core::ClearanceContext;

use crate::state::World;

/// Gather the read snapshot a clearance request is evaluated against.
///
/// Missing records are left as `None`; the engine turns them into failed
/// precondition or weather checks.
pub fn build_context(world: &World, aircraft_id: &str, now: DateTime<Utc>) -> ClearanceContext {
    let aircraft = world.get_aircraft(aircraft_id);
    let airport_id = aircraft.as_ref().and_then(|a| a.airport_id.clone());
    let airport = airport_id.as_deref().and_then(|id| world.get_airport(id));

    let (runways, weather, airport_traffic) = match airport_id.as_deref() {
        Some(id) => (
            world.get_runways(id),
            world.latest_weather(id),
            world.aircraft_at(id),
        ),
        None => (Vec::new(), None, Vec::new()),
    };

    ClearanceContext {
        aircraft_id: aircraft_id.to_string(),
        aircraft,
        airport,
        runways,
        weather,
        airport_traffic,
        airborne_traffic: world.airborne_aircraft(),
        now,
    }
}

/// Snapshot for a landing request at `airport_id`. Runways, weather and
/// ground traffic come from the arrival airport, not the aircraft's record.
pub fn build_landing_context(
    world: &World,
    aircraft_id: &str,
    airport_id: &str,
    now: DateTime<Utc>,
) -> ClearanceContext {
    ClearanceContext {
        aircraft_id: aircraft_id.to_string(),
        aircraft: world.get_aircraft(aircraft_id),
        airport: world.get_airport(airport_id),
        runways: world.get_runways(airport_id),
        weather: world.latest_weather(airport_id),
        airport_traffic: world.aircraft_at(airport_id),
        airborne_traffic: world.airborne_aircraft(),
        now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radar_core::{AircraftState, Airport, GeoPoint, WeatherObservation};

    #[test]
    fn context_collects_airport_records() {
        let world = World::new();
        let now = Utc::now();
        let cmn = Airport::new("CMN", "CMN", "Mohammed V", 33.3675, -7.5898);
        world.upsert_airport(cmn.clone());
        world.record_weather(WeatherObservation::clear("CMN", now));
        world.upsert_aircraft(AircraftState::on_ground("CN-AT01", "CN-AT01", &cmn, now));
        world.upsert_aircraft(AircraftState::on_ground("CN-AT02", "CN-AT02", &cmn, now));
        world.upsert_aircraft(AircraftState::airborne(
            "CN-AT05",
            GeoPoint::new(32.0, -8.0),
            9000.0,
            800.0,
            10.0,
            now,
        ));

        let ctx = build_context(&world, "CN-AT01", now);
        assert_eq!(ctx.airport.as_ref().map(|a| a.code.as_str()), Some("CMN"));
        assert!(ctx.weather.is_some());
        assert_eq!(ctx.airport_traffic.len(), 2);
        assert_eq!(ctx.airborne_traffic.len(), 1);
    }

    #[test]
    fn unknown_aircraft_yields_empty_context() {
        let ctx = build_context(&World::new(), "ghost", Utc::now());
        assert!(ctx.aircraft.is_none());
        assert!(ctx.airport.is_none());
        assert!(ctx.weather.is_none());
    }

    #[test]
    fn landing_context_uses_arrival_airport() {
        let world = World::new();
        let now = Utc::now();
        let rak = Airport::new("RAK", "RAK", "Marrakech Menara", 31.6069, -8.0363);
        world.upsert_airport(rak.clone());
        world.record_weather(WeatherObservation::clear("RAK", now));
        world.upsert_aircraft(AircraftState::on_ground("CN-AT04", "CN-AT04", &rak, now));
        world.upsert_aircraft(AircraftState::airborne(
            "CN-AT01",
            rak.position().project(0.0, 30.0),
            3000.0,
            400.0,
            180.0,
            now,
        ));

        let ctx = build_landing_context(&world, "CN-AT01", "RAK", now);
        assert_eq!(ctx.airport.as_ref().map(|a| a.code.as_str()), Some("RAK"));
        assert_eq!(ctx.weather.as_ref().map(|w| w.airport_id.as_str()), Some("RAK"));
        assert_eq!(ctx.airport_traffic.len(), 1);
        assert_eq!(ctx.airport_traffic[0].aircraft_id, "CN-AT04");
    }
}
