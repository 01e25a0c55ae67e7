//! Flight profile, separation thresholds and takeoff minima.
//!
//! The numeric values are fixed constants; recorded fixtures depend on them.

use serde::{Deserialize, Serialize};

/// Altitude at which the climb levels off (m).
pub const CRUISE_ALTITUDE_M: f64 = 10_000.0;
/// Climb rate (m/s).
pub const CLIMB_RATE_MPS: f64 = 10.0;
/// Descent rate (m/s).
pub const DESCENT_RATE_MPS: f64 = 8.0;
/// Cruise ground speed (km/h).
pub const CRUISE_SPEED_KMH: f64 = 800.0;
/// Ground speed at rotation (km/h).
pub const TAKEOFF_SPEED_KMH: f64 = 250.0;
/// Floor for the descent speed ramp (km/h).
pub const LANDING_SPEED_KMH: f64 = 200.0;
/// Speed gained per tick while climbing (km/h).
pub const CLIMB_ACCELERATION_KMH: f64 = 5.0;
/// Speed lost per tick while descending (km/h).
pub const DESCENT_DECELERATION_KMH: f64 = 3.0;
/// Remaining distance at which the descent starts (km).
pub const DESCENT_TRIGGER_KM: f64 = 50.0;
/// Remaining distance treated as arrived (km).
pub const NEAR_ARRIVAL_KM: f64 = 0.5;
/// Simulated seconds per simulation step.
pub const TICK_SECS: f64 = 5.0;

/// Parameters of the simulated flight profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlightProfile {
    pub cruise_altitude_m: f64,
    pub climb_rate_mps: f64,
    pub descent_rate_mps: f64,
    pub cruise_speed_kmh: f64,
    pub takeoff_speed_kmh: f64,
    pub landing_speed_kmh: f64,
    pub climb_acceleration_kmh: f64,
    pub descent_deceleration_kmh: f64,
    pub descent_trigger_km: f64,
    pub near_arrival_km: f64,
    pub tick_secs: f64,
}

impl Default for FlightProfile {
    fn default() -> Self {
        Self {
            cruise_altitude_m: CRUISE_ALTITUDE_M,
            climb_rate_mps: CLIMB_RATE_MPS,
            descent_rate_mps: DESCENT_RATE_MPS,
            cruise_speed_kmh: CRUISE_SPEED_KMH,
            takeoff_speed_kmh: TAKEOFF_SPEED_KMH,
            landing_speed_kmh: LANDING_SPEED_KMH,
            climb_acceleration_kmh: CLIMB_ACCELERATION_KMH,
            descent_deceleration_kmh: DESCENT_DECELERATION_KMH,
            descent_trigger_km: DESCENT_TRIGGER_KM,
            near_arrival_km: NEAR_ARRIVAL_KM,
            tick_secs: TICK_SECS,
        }
    }
}

impl FlightProfile {
    /// Estimated block time in seconds for a route of `distance_km`:
    /// full climb, cruise over the whole distance, full descent.
    pub fn estimated_flight_secs(&self, distance_km: f64) -> f64 {
        let climb = self.cruise_altitude_m / self.climb_rate_mps;
        let cruise = (distance_km * 1000.0) / (self.cruise_speed_kmh / 3.6);
        let descent = self.cruise_altitude_m / self.descent_rate_mps;
        climb + cruise + descent
    }
}

/// Thresholds for conflict severity classification.
///
/// These are heuristic bands, not a closest-point-of-approach model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeparationRules {
    /// Horizontal distance for CRITICAL (km)
    pub critical_horizontal_km: f64,
    /// Horizontal distance for HIGH (km)
    pub high_horizontal_km: f64,
    /// Horizontal distance for MEDIUM (km)
    pub medium_horizontal_km: f64,
    /// Vertical separation for CRITICAL and HIGH (m)
    pub vertical_m: f64,
    /// Vertical separation for MEDIUM (m)
    pub medium_vertical_m: f64,
    /// Flagged pairs closing within this many seconds escalate to CRITICAL
    pub imminent_secs: f64,
    /// Heading difference above which aircraft are treated as converging
    pub converging_heading_deg: f64,
}

impl Default for SeparationRules {
    fn default() -> Self {
        Self {
            critical_horizontal_km: 2.0,
            high_horizontal_km: 5.0,
            medium_horizontal_km: 7.5,
            vertical_m: 300.0,
            medium_vertical_m: 450.0,
            imminent_secs: 60.0,
            converging_heading_deg: 90.0,
        }
    }
}

/// ICAO/FAA derived minima for takeoff clearance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakeoffMinima {
    /// CAT I minimum visibility (km)
    pub min_visibility_km: f64,
    /// 30 kt maximum wind (km/h)
    pub max_wind_kmh: f64,
    /// 15 kt maximum crosswind (km/h)
    pub max_crosswind_kmh: f64,
    /// 3 NM minimum separation from airborne traffic (km)
    pub min_separation_km: f64,
    /// Wind speed treated as possible wind shear when an alert is active (km/h)
    pub wind_shear_kmh: f64,
    /// Condition keywords treated as hazards when an alert is active
    pub hazard_keywords: Vec<String>,
    /// Risk score above which clearance is refused
    pub max_risk_score: u32,
    pub proximity_risk: u32,
    pub missing_transponder_risk: u32,
    pub stale_weather_risk: u32,
    pub marginal_visibility_risk: u32,
    /// Observations older than this are stale (minutes)
    pub weather_max_age_mins: i64,
}

impl Default for TakeoffMinima {
    fn default() -> Self {
        Self {
            min_visibility_km: 0.55,
            max_wind_kmh: 55.0,
            max_crosswind_kmh: 28.0,
            min_separation_km: 5.5,
            wind_shear_kmh: 80.0,
            hazard_keywords: vec![
                "thunderstorm".into(),
                "storm".into(),
                "severe turbulence".into(),
            ],
            max_risk_score: 50,
            proximity_risk: 30,
            missing_transponder_risk: 20,
            stale_weather_risk: 25,
            marginal_visibility_risk: 15,
            weather_max_age_mins: 60,
        }
    }
}

/// Minima for landing clearance. Stricter than takeoff on visibility and
/// crosswind; hazards apply whether or not an alert is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandingMinima {
    pub min_visibility_km: f64,
    pub max_wind_kmh: f64,
    pub max_crosswind_kmh: f64,
    /// Landing is only considered within this distance of the airport (km)
    pub approach_radius_km: f64,
    pub hazard_keywords: Vec<String>,
}

impl Default for LandingMinima {
    fn default() -> Self {
        Self {
            min_visibility_km: 1.0,
            max_wind_kmh: 50.0,
            max_crosswind_kmh: 15.0,
            approach_radius_km: DESCENT_TRIGGER_KM,
            hazard_keywords: vec![
                "thunderstorm".into(),
                "heavy rain".into(),
                "fog".into(),
                "strong wind".into(),
                "freezing".into(),
            ],
        }
    }
}
