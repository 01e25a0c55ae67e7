//! Per-aircraft flight simulation state machine.
//!
//! A [`SimulationRun`] moves one aircraft from its departure airport to its
//! arrival airport in fixed steps of [`FlightProfile::tick_secs`] simulated
//! seconds, walking CLIMB -> CRUISE -> DESCENT -> COMPLETE. The run is pure:
//! scheduling and shared state live in the runtime.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AircraftState, AircraftStatus, Airport, FlightPhase, GeoPoint, SimulationSnapshot};
use crate::rules::FlightProfile;

/// Result of one simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub previous_phase: FlightPhase,
    pub phase: FlightPhase,
    /// Distance flown during this step (km)
    pub distance_km: f64,
}

impl TickReport {
    pub fn transitioned(&self) -> bool {
        self.previous_phase != self.phase
    }

    pub fn completed(&self) -> bool {
        self.phase == FlightPhase::Complete
    }
}

/// Ephemeral state of one actively simulated flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRun {
    pub flight_id: String,
    pub aircraft_id: String,
    pub origin: Airport,
    pub destination: Airport,
    pub total_distance_km: f64,
    pub distance_remaining_km: f64,
    pub phase: FlightPhase,
    pub departure_time: DateTime<Utc>,
    pub estimated_arrival: DateTime<Utc>,
    pub position: GeoPoint,
    pub altitude_m: f64,
    pub speed_kmh: f64,
    pub heading_deg: f64,
    /// Simulated seconds flown so far
    pub elapsed_secs: f64,
    profile: FlightProfile,
}

impl SimulationRun {
    /// Prepare a run at the departure airport, on the runway at takeoff speed.
    pub fn new(
        flight_id: impl Into<String>,
        aircraft_id: impl Into<String>,
        origin: &Airport,
        destination: &Airport,
        departure_time: DateTime<Utc>,
        profile: FlightProfile,
    ) -> Self {
        let start = origin.position();
        let end = destination.position();
        let total_distance_km = start.distance_km(&end);
        let flight_secs = profile.estimated_flight_secs(total_distance_km);
        let estimated_arrival = departure_time + Duration::seconds(flight_secs as i64);

        Self {
            flight_id: flight_id.into(),
            aircraft_id: aircraft_id.into(),
            origin: origin.clone(),
            destination: destination.clone(),
            total_distance_km,
            distance_remaining_km: total_distance_km,
            phase: FlightPhase::Climb,
            departure_time,
            estimated_arrival,
            position: start,
            altitude_m: 0.0,
            speed_kmh: profile.takeoff_speed_kmh,
            heading_deg: start.bearing_to(&end),
            elapsed_secs: 0.0,
            profile,
        }
    }

    /// Advance the run by one tick. A completed run does not move.
    pub fn advance(&mut self) -> TickReport {
        let previous_phase = self.phase;
        if self.phase == FlightPhase::Complete {
            return TickReport {
                previous_phase,
                phase: self.phase,
                distance_km: 0.0,
            };
        }

        let profile = self.profile;
        let distance_km = (self.speed_kmh / 3.6) * profile.tick_secs / 1000.0;

        self.position = self.position.project(self.heading_deg, distance_km);
        self.distance_remaining_km -= distance_km;
        self.elapsed_secs += profile.tick_secs;

        match self.phase {
            FlightPhase::Climb => {
                self.altitude_m += profile.climb_rate_mps * profile.tick_secs;
                self.speed_kmh =
                    (self.speed_kmh + profile.climb_acceleration_kmh).min(profile.cruise_speed_kmh);

                if self.altitude_m >= profile.cruise_altitude_m {
                    self.altitude_m = profile.cruise_altitude_m;
                    self.speed_kmh = profile.cruise_speed_kmh;
                    self.phase = FlightPhase::Cruise;
                } else if self.distance_remaining_km <= profile.near_arrival_km {
                    // Short hop: level off where we are
                    self.phase = FlightPhase::Cruise;
                }
            }
            FlightPhase::Cruise => {
                if self.distance_remaining_km <= profile.descent_trigger_km {
                    self.phase = FlightPhase::Descent;
                }
            }
            FlightPhase::Descent => {
                self.altitude_m -= profile.descent_rate_mps * profile.tick_secs;
                self.speed_kmh =
                    (self.speed_kmh - profile.descent_deceleration_kmh).max(profile.landing_speed_kmh);

                if self.altitude_m <= 0.0 || self.distance_remaining_km <= profile.near_arrival_km {
                    self.land();
                }
            }
            FlightPhase::Complete => {}
        }

        if self.phase != FlightPhase::Complete {
            self.heading_deg = self.position.bearing_to(&self.destination.position());
        }

        TickReport {
            previous_phase,
            phase: self.phase,
            distance_km,
        }
    }

    fn land(&mut self) {
        self.phase = FlightPhase::Complete;
        self.altitude_m = 0.0;
        self.speed_kmh = 0.0;
        self.position = self.destination.position();
        self.distance_remaining_km = self.distance_remaining_km.max(0.0);
    }

    /// Vertical rate implied by the current phase (m/s).
    pub fn vertical_rate_mps(&self) -> f64 {
        match self.phase {
            FlightPhase::Climb => self.profile.climb_rate_mps,
            FlightPhase::Descent => -self.profile.descent_rate_mps,
            FlightPhase::Cruise | FlightPhase::Complete => 0.0,
        }
    }

    /// Write the run's current state into the aircraft record.
    pub fn apply_to(&self, aircraft: &mut AircraftState, now: DateTime<Utc>) {
        aircraft.position = Some(self.position);
        aircraft.altitude_m = self.altitude_m;
        aircraft.ground_speed_kmh = self.speed_kmh;
        aircraft.heading_deg = self.heading_deg;
        aircraft.vertical_rate_mps = self.vertical_rate_mps();
        aircraft.last_update = now;

        if self.phase == FlightPhase::Complete {
            aircraft.status = AircraftStatus::OnGround;
            aircraft.airport_id = Some(self.destination.airport_id.clone());
        } else {
            aircraft.status = AircraftStatus::Airborne;
            aircraft.airport_id = None;
        }
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            flight_id: self.flight_id.clone(),
            aircraft_id: self.aircraft_id.clone(),
            phase: self.phase,
            lat: self.position.lat,
            lon: self.position.lon,
            altitude_m: self.altitude_m,
            speed_kmh: self.speed_kmh,
            heading_deg: self.heading_deg,
            distance_remaining_km: self.distance_remaining_km,
            total_distance_km: self.total_distance_km,
            departure_time: self.departure_time,
            estimated_arrival: self.estimated_arrival,
            elapsed_secs: self.elapsed_secs,
        }
    }
}
