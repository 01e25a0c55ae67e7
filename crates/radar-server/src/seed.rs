//! World seeding from JSON or the built-in demo network.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use radar_core::{AircraftState, Airport, Runway, WeatherObservation};

use crate::state::World;

/// An aircraft parked at an airport when the world is seeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAircraft {
    pub aircraft_id: String,
    pub registration: String,
    pub airport_id: String,
    #[serde(default)]
    pub transponder_code: Option<String>,
    /// Usual destination, used by the demo when none is given
    #[serde(default)]
    pub planned_arrival: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSeed {
    #[serde(default)]
    pub airports: Vec<Airport>,
    #[serde(default)]
    pub runways: Vec<Runway>,
    #[serde(default)]
    pub aircraft: Vec<SeedAircraft>,
    #[serde(default)]
    pub weather: Vec<WeatherObservation>,
}

impl WorldSeed {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading world seed {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing world seed {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Four Moroccan airports with two runways each, two aircraft per
    /// airport and clear weather everywhere.
    pub fn demo(now: DateTime<Utc>) -> Self {
        let airports = vec![
            Airport::new("CMN", "CMN", "Mohammed V International", 33.3675, -7.5898),
            Airport::new("RBA", "RBA", "Rabat-Sale", 34.0515, -6.7515),
            Airport::new("RAK", "RAK", "Marrakesh Menara", 31.6069, -8.0363),
            Airport::new("TNG", "TNG", "Tangier Ibn Battouta", 35.7269, -5.9169),
        ];

        let runways = airports
            .iter()
            .flat_map(|airport| {
                [("09/27", 90.0, 3500), ("17/35", 170.0, 3200)].map(|(name, orientation_deg, length_m)| Runway {
                    airport_id: airport.airport_id.clone(),
                    name: name.to_string(),
                    orientation_deg,
                    length_m,
                })
            })
            .collect();

        let fleet = [
            ("CN-AT01", "CMN", "RBA", "1201"),
            ("CN-AT02", "CMN", "RAK", "1202"),
            ("CN-AT03", "RBA", "CMN", "1203"),
            ("CN-AT04", "RBA", "TNG", "1204"),
            ("CN-AT05", "RAK", "CMN", "1205"),
            ("CN-AT06", "RAK", "RBA", "1206"),
            ("CN-AT07", "TNG", "RBA", "1207"),
            ("CN-AT08", "TNG", "CMN", "1210"),
        ];
        let aircraft = fleet
            .iter()
            .map(|(registration, home, planned, squawk)| SeedAircraft {
                aircraft_id: registration.to_string(),
                registration: registration.to_string(),
                airport_id: home.to_string(),
                transponder_code: Some(squawk.to_string()),
                planned_arrival: Some(planned.to_string()),
            })
            .collect();

        let weather = airports
            .iter()
            .map(|airport| WeatherObservation::clear(airport.airport_id.clone(), now))
            .collect();

        Self {
            airports,
            runways,
            aircraft,
            weather,
        }
    }

    /// Load the seed into the world. Every aircraft, runway and observation
    /// must reference a seeded (or already known) airport.
    pub fn apply(&self, world: &World, now: DateTime<Utc>) -> Result<()> {
        for airport in &self.airports {
            world.upsert_airport(airport.clone());
        }

        for runway in &self.runways {
            if world.get_airport(&runway.airport_id).is_none() {
                bail!("runway {} references unknown airport {}", runway.name, runway.airport_id);
            }
            world.add_runway(runway.clone());
        }

        for observation in &self.weather {
            if world.get_airport(&observation.airport_id).is_none() {
                bail!("weather references unknown airport {}", observation.airport_id);
            }
            world.record_weather(observation.clone());
        }

        for seed in &self.aircraft {
            let airport = world.get_airport(&seed.airport_id).with_context(|| {
                format!("aircraft {} references unknown airport {}", seed.aircraft_id, seed.airport_id)
            })?;
            let mut state = AircraftState::on_ground(&seed.aircraft_id, &seed.registration, &airport, now);
            state.transponder_code = seed.transponder_code.clone();
            world.upsert_aircraft(state);
        }

        tracing::info!(
            "Seeded {} airport(s), {} runway(s), {} aircraft",
            self.airports.len(),
            self.runways.len(),
            self.aircraft.len()
        );
        Ok(())
    }

    pub fn planned_arrival(&self, aircraft_id: &str) -> Option<&str> {
        self.aircraft
            .iter()
            .find(|seed| seed.aircraft_id == aircraft_id)
            .and_then(|seed| seed.planned_arrival.as_deref())
    }
}
