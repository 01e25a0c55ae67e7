//! Core data models shared by the simulation, conflict and clearance engines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geodesy;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to another point in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        geodesy::distance_km(self.lat, self.lon, other.lat, other.lon)
    }

    /// Initial bearing towards another point in degrees.
    pub fn bearing_to(&self, other: &GeoPoint) -> f64 {
        geodesy::bearing_deg(self.lat, self.lon, other.lat, other.lon)
    }

    /// Point reached after travelling `distance_km` along `bearing_deg`.
    pub fn project(&self, bearing_deg: f64, distance_km: f64) -> GeoPoint {
        let (lat, lon) = geodesy::destination(self.lat, self.lon, bearing_deg, distance_km);
        GeoPoint { lat, lon }
    }
}

/// Lifecycle status of an aircraft.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AircraftStatus {
    #[default]
    OnGround,
    TakeoffRoll,
    Airborne,
    Landing,
    Holding,
}

impl AircraftStatus {
    /// Statuses that keep the runway busy.
    pub fn occupies_runway(self) -> bool {
        matches!(self, Self::TakeoffRoll | Self::Landing)
    }
}

/// Current state of a tracked aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftState {
    pub aircraft_id: String,
    pub registration: String,
    pub status: AircraftStatus,
    /// Unknown until the aircraft reports (or is assigned) a position
    #[serde(default)]
    pub position: Option<GeoPoint>,
    #[serde(default)]
    pub altitude_m: f64,
    #[serde(default)]
    pub ground_speed_kmh: f64,
    #[serde(default)]
    pub heading_deg: f64,
    #[serde(default)]
    pub vertical_rate_mps: f64,
    /// Airport the aircraft is parked at; `None` while flying
    #[serde(default)]
    pub airport_id: Option<String>,
    #[serde(default)]
    pub transponder_code: Option<String>,
    pub last_update: DateTime<Utc>,
}

impl AircraftState {
    /// A parked aircraft at the given airport.
    pub fn on_ground(
        aircraft_id: impl Into<String>,
        registration: impl Into<String>,
        airport: &Airport,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            aircraft_id: aircraft_id.into(),
            registration: registration.into(),
            status: AircraftStatus::OnGround,
            position: Some(airport.position()),
            altitude_m: 0.0,
            ground_speed_kmh: 0.0,
            heading_deg: 0.0,
            vertical_rate_mps: 0.0,
            airport_id: Some(airport.airport_id.clone()),
            transponder_code: None,
            last_update: now,
        }
    }

    /// An airborne aircraft at an explicit position and velocity.
    pub fn airborne(
        aircraft_id: impl Into<String>,
        position: GeoPoint,
        altitude_m: f64,
        ground_speed_kmh: f64,
        heading_deg: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let aircraft_id = aircraft_id.into();
        Self {
            registration: aircraft_id.clone(),
            aircraft_id,
            status: AircraftStatus::Airborne,
            position: Some(position),
            altitude_m,
            ground_speed_kmh,
            heading_deg: geodesy::normalize_heading(heading_deg),
            vertical_rate_mps: 0.0,
            airport_id: None,
            transponder_code: None,
            last_update: now,
        }
    }

    pub fn with_transponder(mut self, code: impl Into<String>) -> Self {
        self.transponder_code = Some(code.into());
        self
    }

    /// Position, if the aircraft is airborne and its position is known.
    pub fn airborne_position(&self) -> Option<GeoPoint> {
        match self.status {
            AircraftStatus::Airborne => self.position,
            _ => None,
        }
    }

    pub fn has_transponder_code(&self) -> bool {
        self.transponder_code
            .as_deref()
            .map(|code| !code.trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub airport_id: String,
    /// IATA code, e.g. CMN
    pub code: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Airport {
    pub fn new(
        airport_id: impl Into<String>,
        code: impl Into<String>,
        name: impl Into<String>,
        lat: f64,
        lon: f64,
    ) -> Self {
        Self {
            airport_id: airport_id.into(),
            code: code.into(),
            name: name.into(),
            lat,
            lon,
        }
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runway {
    pub airport_id: String,
    /// Designator, e.g. "09/27"
    pub name: String,
    pub orientation_deg: f64,
    #[serde(default)]
    pub length_m: u32,
}

/// Latest weather observation for an airport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub airport_id: String,
    pub wind_speed_kmh: f64,
    pub wind_direction_deg: f64,
    pub visibility_km: f64,
    #[serde(default)]
    pub temperature_c: Option<f64>,
    /// Free text such as "Clear", "Fog" or "Thunderstorm"
    #[serde(default)]
    pub conditions: String,
    /// Crosswind reported by the observation source, used when no runway data exists
    #[serde(default)]
    pub crosswind_kmh: Option<f64>,
    /// Active weather alert flag
    #[serde(default)]
    pub alert: bool,
    pub observed_at: DateTime<Utc>,
}

impl WeatherObservation {
    /// Clear, calm weather at an airport.
    pub fn clear(airport_id: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            airport_id: airport_id.into(),
            wind_speed_kmh: 10.0,
            wind_direction_deg: 90.0,
            visibility_km: 10.0,
            temperature_c: Some(20.0),
            conditions: "Clear".to_string(),
            crosswind_kmh: None,
            alert: false,
            observed_at,
        }
    }
}

/// Flight-dynamics regime of an active simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightPhase {
    Climb,
    Cruise,
    Descent,
    Complete,
}

impl std::fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlightPhase::Climb => write!(f, "CLIMB"),
            FlightPhase::Cruise => write!(f, "CRUISE"),
            FlightPhase::Descent => write!(f, "DESCENT"),
            FlightPhase::Complete => write!(f, "COMPLETE"),
        }
    }
}

/// Current position information for an active simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub flight_id: String,
    pub aircraft_id: String,
    pub phase: FlightPhase,
    pub lat: f64,
    pub lon: f64,
    pub altitude_m: f64,
    pub speed_kmh: f64,
    pub heading_deg: f64,
    pub distance_remaining_km: f64,
    pub total_distance_km: f64,
    pub departure_time: DateTime<Utc>,
    pub estimated_arrival: DateTime<Utc>,
    /// Simulated seconds since departure
    pub elapsed_secs: f64,
}

/// Events emitted by the simulation engine for the surrounding application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimulationEvent {
    /// Emitted after every tick
    PositionUpdate(SimulationSnapshot),
    Completed {
        flight_id: String,
        aircraft_id: String,
        arrival_airport_id: String,
        completed_at: DateTime<Utc>,
    },
    /// Run removed before reaching its destination
    Aborted {
        flight_id: String,
        aircraft_id: String,
        reason: String,
    },
}

impl SimulationEvent {
    pub fn aircraft_id(&self) -> &str {
        match self {
            SimulationEvent::PositionUpdate(snapshot) => &snapshot.aircraft_id,
            SimulationEvent::Completed { aircraft_id, .. } => aircraft_id,
            SimulationEvent::Aborted { aircraft_id, .. } => aircraft_id,
        }
    }
}
