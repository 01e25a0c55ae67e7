//! In-memory world store using DashMap.
//!
//! Readers always receive cloned snapshots so the conflict loop and
//! clearance requests never hold a shard lock while a simulation tick
//! writes.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use radar_core::{
    AircraftState, AircraftStatus, Airport, ConflictAlert, Runway, WeatherObservation,
};

/// Aircraft, airports, runways, weather and the latest conflict picture.
#[derive(Default)]
pub struct World {
    aircraft: DashMap<String, AircraftState>,
    airports: DashMap<String, Airport>,
    runways: DashMap<String, Vec<Runway>>,
    weather: DashMap<String, WeatherObservation>,
    conflicts: DashMap<String, ConflictAlert>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_airport(&self, airport: Airport) {
        self.airports.insert(airport.airport_id.clone(), airport);
    }

    pub fn get_airport(&self, airport_id: &str) -> Option<Airport> {
        self.airports.get(airport_id).map(|r| r.value().clone())
    }

    pub fn get_all_airports(&self) -> Vec<Airport> {
        let mut airports: Vec<Airport> = self.airports.iter().map(|r| r.value().clone()).collect();
        airports.sort_by(|a, b| a.airport_id.cmp(&b.airport_id));
        airports
    }

    pub fn add_runway(&self, runway: Runway) {
        self.runways
            .entry(runway.airport_id.clone())
            .or_default()
            .push(runway);
    }

    pub fn get_runways(&self, airport_id: &str) -> Vec<Runway> {
        self.runways
            .get(airport_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Replace the latest observation for the airport.
    pub fn record_weather(&self, observation: WeatherObservation) {
        self.weather.insert(observation.airport_id.clone(), observation);
    }

    pub fn latest_weather(&self, airport_id: &str) -> Option<WeatherObservation> {
        self.weather.get(airport_id).map(|r| r.value().clone())
    }

    pub fn upsert_aircraft(&self, aircraft: AircraftState) {
        self.aircraft.insert(aircraft.aircraft_id.clone(), aircraft);
    }

    pub fn remove_aircraft(&self, aircraft_id: &str) -> Option<AircraftState> {
        self.aircraft.remove(aircraft_id).map(|(_, state)| state)
    }

    pub fn get_aircraft(&self, aircraft_id: &str) -> Option<AircraftState> {
        self.aircraft.get(aircraft_id).map(|r| r.value().clone())
    }

    /// Mutate an aircraft in place. Returns false if the aircraft is unknown.
    pub fn update_aircraft<F>(&self, aircraft_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut AircraftState),
    {
        match self.aircraft.get_mut(aircraft_id) {
            Some(mut entry) => {
                f(entry.value_mut());
                true
            }
            None => false,
        }
    }

    pub fn set_status(&self, aircraft_id: &str, status: AircraftStatus, now: DateTime<Utc>) -> bool {
        self.update_aircraft(aircraft_id, |aircraft| {
            aircraft.status = status;
            aircraft.last_update = now;
        })
    }

    /// Compare-and-set on the status, under the entry lock. Returns false if
    /// the aircraft is unknown or not in `from`.
    pub fn transition_status(
        &self,
        aircraft_id: &str,
        from: AircraftStatus,
        to: AircraftStatus,
        now: DateTime<Utc>,
    ) -> bool {
        match self.aircraft.get_mut(aircraft_id) {
            Some(mut entry) if entry.status == from => {
                entry.status = to;
                entry.last_update = now;
                true
            }
            _ => false,
        }
    }

    pub fn get_all_aircraft(&self) -> Vec<AircraftState> {
        let mut aircraft: Vec<AircraftState> = self.aircraft.iter().map(|r| r.value().clone()).collect();
        aircraft.sort_by(|a, b| a.aircraft_id.cmp(&b.aircraft_id));
        aircraft
    }

    /// Aircraft currently AIRBORNE.
    pub fn airborne_aircraft(&self) -> Vec<AircraftState> {
        self.get_all_aircraft()
            .into_iter()
            .filter(|aircraft| aircraft.status == AircraftStatus::Airborne)
            .collect()
    }

    /// Aircraft assigned to the given airport.
    pub fn aircraft_at(&self, airport_id: &str) -> Vec<AircraftState> {
        self.get_all_aircraft()
            .into_iter()
            .filter(|aircraft| aircraft.airport_id.as_deref() == Some(airport_id))
            .collect()
    }

    /// Replace the conflict picture with the latest scan.
    /// Readers see either the old or the new alert for a pair, never a gap.
    pub fn replace_conflicts(&self, alerts: &[ConflictAlert]) {
        let mut keys = HashSet::with_capacity(alerts.len());
        for alert in alerts {
            let key = format!("{}-{}", alert.aircraft1_id, alert.aircraft2_id);
            self.conflicts.insert(key.clone(), alert.clone());
            keys.insert(key);
        }
        self.conflicts.retain(|key, _| keys.contains(key));
    }

    /// Conflicts from the latest scan, most severe first.
    pub fn get_conflicts(&self) -> Vec<ConflictAlert> {
        let mut conflicts: Vec<ConflictAlert> = self.conflicts.iter().map(|r| r.value().clone()).collect();
        conflicts.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.horizontal_distance_km.total_cmp(&b.horizontal_distance_km))
        });
        conflicts
    }
}
