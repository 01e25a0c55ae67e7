//! Takeoff and landing clearance rule engine.
//!
//! A request is evaluated as an ordered list of stages. Each stage runs one
//! or more named checks; when any check in a stage fails, the stage decides
//! the outcome and later stages are skipped.
//!
//! Takeoff:
//!
//! | Stage            | On failure |
//! |------------------|------------|
//! | Preconditions    | REFUSED    |
//! | Runway           | PENDING    |
//! | Weather minima   | REFUSED    |
//! | Traffic          | PENDING    |
//! | Critical weather | REFUSED    |
//! | Residual risk    | REFUSED    |
//!
//! Landing:
//!
//! | Stage            | On failure |
//! |------------------|------------|
//! | Preconditions    | REFUSED    |
//! | Approach range   | PENDING    |
//! | Runway           | PENDING    |
//! | Weather minima   | REFUSED    |
//! | Hazards          | REFUSED    |
//!
//! The engine never mutates anything; applying a GRANTED decision is up to
//! the caller.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::geodesy;
use crate::models::{AircraftState, AircraftStatus, Airport, GeoPoint, Runway, WeatherObservation};
use crate::rules::{LandingMinima, TakeoffMinima};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClearanceOutcome {
    Granted,
    Refused,
    /// Transient condition; retry later
    Pending,
}

/// One named check with its verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearanceCheck {
    pub name: String,
    pub passed: bool,
    pub explanation: String,
}

impl ClearanceCheck {
    pub fn pass(name: &str, explanation: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            explanation: explanation.into(),
        }
    }

    pub fn fail(name: &str, explanation: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            explanation: explanation.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearanceDecision {
    pub aircraft_id: String,
    pub outcome: ClearanceOutcome,
    pub summary: String,
    /// Every check attempted up to the decision point, in order
    pub checks: Vec<ClearanceCheck>,
    pub decided_at: DateTime<Utc>,
}

impl ClearanceDecision {
    pub fn is_granted(&self) -> bool {
        self.outcome == ClearanceOutcome::Granted
    }

    pub fn check(&self, name: &str) -> Option<&ClearanceCheck> {
        self.checks.iter().find(|check| check.name == name)
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &ClearanceCheck> {
        self.checks.iter().filter(|check| !check.passed)
    }
}

/// Read snapshot of everything a clearance request depends on.
#[derive(Debug, Clone)]
pub struct ClearanceContext {
    pub aircraft_id: String,
    pub aircraft: Option<AircraftState>,
    pub airport: Option<Airport>,
    pub runways: Vec<Runway>,
    pub weather: Option<WeatherObservation>,
    /// Other aircraft assigned to the same airport (the arrival airport for
    /// landing requests)
    pub airport_traffic: Vec<AircraftState>,
    /// Every aircraft currently airborne
    pub airborne_traffic: Vec<AircraftState>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Preconditions,
    Runway,
    Weather,
    Traffic,
    CriticalWeather,
    Risk,
    LandingPreconditions,
    Approach,
    LandingWeather,
    Hazards,
}

impl Stage {
    const TAKEOFF: [Stage; 6] = [
        Stage::Preconditions,
        Stage::Runway,
        Stage::Weather,
        Stage::Traffic,
        Stage::CriticalWeather,
        Stage::Risk,
    ];

    const LANDING: [Stage; 5] = [
        Stage::LandingPreconditions,
        Stage::Approach,
        Stage::Runway,
        Stage::LandingWeather,
        Stage::Hazards,
    ];

    fn on_failure(self) -> ClearanceOutcome {
        match self {
            Stage::Runway | Stage::Traffic | Stage::Approach => ClearanceOutcome::Pending,
            Stage::Preconditions
            | Stage::Weather
            | Stage::CriticalWeather
            | Stage::Risk
            | Stage::LandingPreconditions
            | Stage::LandingWeather
            | Stage::Hazards => ClearanceOutcome::Refused,
        }
    }

    fn failure_summary(self) -> &'static str {
        match self {
            Stage::Preconditions => "Takeoff refused: preconditions not met",
            Stage::Runway => "Runway occupied, stand by",
            Stage::Weather => "Takeoff refused: weather below minima",
            Stage::Traffic => "Traffic too close, stand by",
            Stage::CriticalWeather => "Takeoff refused: critical weather alert",
            Stage::Risk => "Takeoff refused: residual risk too high",
            Stage::LandingPreconditions => "Landing refused: preconditions not met",
            Stage::Approach => "Not yet on approach, continue and call again",
            Stage::LandingWeather => "Landing refused: weather below minima, hold and await instructions",
            Stage::Hazards => "Landing refused: hazardous conditions, hold and await instructions",
        }
    }
}

/// Evaluates clearance requests against [`TakeoffMinima`] and
/// [`LandingMinima`].
#[derive(Debug, Clone, Default)]
pub struct ClearanceEngine {
    pub minima: TakeoffMinima,
    pub landing: LandingMinima,
}

impl ClearanceEngine {
    pub fn new(minima: TakeoffMinima) -> Self {
        Self {
            minima,
            landing: LandingMinima::default(),
        }
    }

    pub fn with_landing_minima(mut self, landing: LandingMinima) -> Self {
        self.landing = landing;
        self
    }

    /// Takeoff clearance.
    pub fn evaluate(&self, ctx: &ClearanceContext) -> ClearanceDecision {
        self.decide(
            &Stage::TAKEOFF,
            ctx,
            "Takeoff clearance granted: all conditions met",
        )
    }

    /// Landing clearance. `ctx.airport` is the arrival airport and
    /// `ctx.runways`, `ctx.weather` and `ctx.airport_traffic` belong to it.
    pub fn evaluate_landing(&self, ctx: &ClearanceContext) -> ClearanceDecision {
        self.decide(
            &Stage::LANDING,
            ctx,
            "Landing clearance granted: runway clear, weather suitable",
        )
    }

    fn decide(&self, stages: &[Stage], ctx: &ClearanceContext, granted: &str) -> ClearanceDecision {
        let mut checks = Vec::new();

        for &stage in stages {
            let stage_checks = self.run_stage(stage, ctx);
            let failed = stage_checks.iter().any(|check| !check.passed);
            checks.extend(stage_checks);

            if failed {
                return ClearanceDecision {
                    aircraft_id: ctx.aircraft_id.clone(),
                    outcome: stage.on_failure(),
                    summary: stage.failure_summary().to_string(),
                    checks,
                    decided_at: ctx.now,
                };
            }
        }

        ClearanceDecision {
            aircraft_id: ctx.aircraft_id.clone(),
            outcome: ClearanceOutcome::Granted,
            summary: granted.to_string(),
            checks,
            decided_at: ctx.now,
        }
    }

    fn run_stage(&self, stage: Stage, ctx: &ClearanceContext) -> Vec<ClearanceCheck> {
        match stage {
            Stage::Preconditions => check_preconditions(ctx),
            Stage::Runway => vec![check_runway(ctx)],
            Stage::Weather => self.check_weather(ctx),
            Stage::Traffic => vec![self.check_traffic(ctx)],
            Stage::CriticalWeather => vec![self.check_critical_weather(ctx)],
            Stage::Risk => vec![self.check_risk(ctx)],
            Stage::LandingPreconditions => check_landing_preconditions(ctx),
            Stage::Approach => vec![self.check_approach(ctx)],
            Stage::LandingWeather => {
                let landing = &self.landing;
                weather_minima_checks(
                    ctx,
                    landing.min_visibility_km,
                    landing.max_wind_kmh,
                    landing.max_crosswind_kmh,
                )
            }
            Stage::Hazards => vec![self.check_landing_hazards(ctx)],
        }
    }

    /// Weather minima: data present, visibility, wind and crosswind.
    pub fn check_weather(&self, ctx: &ClearanceContext) -> Vec<ClearanceCheck> {
        let minima = &self.minima;
        weather_minima_checks(
            ctx,
            minima.min_visibility_km,
            minima.max_wind_kmh,
            minima.max_crosswind_kmh,
        )
    }

    /// Aircraft within the approach radius of the arrival airport.
    pub fn check_approach(&self, ctx: &ClearanceContext) -> ClearanceCheck {
        let radius = self.landing.approach_radius_km;
        let position = ctx.aircraft.as_ref().and_then(|aircraft| aircraft.position);
        match (position, ctx.airport.as_ref()) {
            (Some(position), Some(airport)) => {
                let distance = position.distance_km(&airport.position());
                if distance > radius {
                    ClearanceCheck::fail(
                        "approach_range",
                        format!(
                            "{:.1} km from {} > approach radius {:.1} km",
                            distance, airport.code, radius
                        ),
                    )
                } else {
                    ClearanceCheck::pass(
                        "approach_range",
                        format!("{:.1} km from {}", distance, airport.code),
                    )
                }
            }
            _ => ClearanceCheck::fail("approach_range", "aircraft position unknown"),
        }
    }

    /// Hazardous conditions at the arrival airport, alert or not.
    pub fn check_landing_hazards(&self, ctx: &ClearanceContext) -> ClearanceCheck {
        let Some(weather) = ctx.weather.as_ref() else {
            return ClearanceCheck::fail("hazardous_conditions", "no weather observation available");
        };

        let conditions = weather.conditions.to_lowercase();
        match self
            .landing
            .hazard_keywords
            .iter()
            .find(|keyword| conditions.contains(keyword.to_lowercase().as_str()))
        {
            Some(keyword) => ClearanceCheck::fail(
                "hazardous_conditions",
                format!("hazardous conditions '{}' ({})", weather.conditions, keyword),
            ),
            None => ClearanceCheck::pass(
                "hazardous_conditions",
                format!("conditions '{}'", weather.conditions),
            ),
        }
    }

    /// Separation from every other airborne aircraft.
    pub fn check_traffic(&self, ctx: &ClearanceContext) -> ClearanceCheck {
        let min_sep = self.minima.min_separation_km;
        let Some(reference) = reference_point(ctx) else {
            return ClearanceCheck::pass("traffic_separation", "no reference position; traffic not assessed");
        };

        match nearest_traffic(ctx, reference) {
            Some((id, distance)) if distance < min_sep => ClearanceCheck::fail(
                "traffic_separation",
                format!(
                    "aircraft {} at {:.2} km < minimum separation {:.2} km",
                    id, distance, min_sep
                ),
            ),
            Some((id, distance)) => ClearanceCheck::pass(
                "traffic_separation",
                format!("nearest traffic {} at {:.2} km", id, distance),
            ),
            None => ClearanceCheck::pass("traffic_separation", "no airborne traffic"),
        }
    }

    /// Active weather alert with a hazardous condition or wind shear.
    pub fn check_critical_weather(&self, ctx: &ClearanceContext) -> ClearanceCheck {
        let Some(weather) = ctx.weather.as_ref().filter(|weather| weather.alert) else {
            return ClearanceCheck::pass("critical_weather", "no active weather alert");
        };

        let conditions = weather.conditions.to_lowercase();
        let mut hazards: Vec<String> = Vec::new();
        if let Some(keyword) = self
            .minima
            .hazard_keywords
            .iter()
            .find(|keyword| conditions.contains(keyword.to_lowercase().as_str()))
        {
            hazards.push(format!("hazardous conditions '{}' ({})", weather.conditions, keyword));
        }
        if weather.wind_speed_kmh > self.minima.wind_shear_kmh {
            hazards.push(format!(
                "possible wind shear: wind {:.1} km/h > {:.1} km/h",
                weather.wind_speed_kmh, self.minima.wind_shear_kmh
            ));
        }

        if hazards.is_empty() {
            ClearanceCheck::pass(
                "critical_weather",
                format!("alert active for '{}' but no critical hazard", weather.conditions),
            )
        } else {
            ClearanceCheck::fail("critical_weather", hazards.join("; "))
        }
    }

    /// Residual risk score from secondary signals.
    pub fn check_risk(&self, ctx: &ClearanceContext) -> ClearanceCheck {
        let (score, reasons) = self.risk_score(ctx);
        let detail = if reasons.is_empty() {
            "no risk factors".to_string()
        } else {
            reasons.join(", ")
        };

        if score > self.minima.max_risk_score {
            ClearanceCheck::fail(
                "risk_score",
                format!("risk score {} > maximum {} ({})", score, self.minima.max_risk_score, detail),
            )
        } else {
            ClearanceCheck::pass(
                "risk_score",
                format!("risk score {} <= maximum {} ({})", score, self.minima.max_risk_score, detail),
            )
        }
    }

    /// Accumulated 0-100 score and the contributing factors.
    pub fn risk_score(&self, ctx: &ClearanceContext) -> (u32, Vec<String>) {
        let minima = &self.minima;
        let mut score = 0u32;
        let mut reasons = Vec::new();

        let proximity = reference_point(ctx)
            .and_then(|reference| nearest_traffic(ctx, reference))
            .map(|(_, distance)| distance < minima.min_separation_km)
            .unwrap_or(false);
        if proximity {
            score += minima.proximity_risk;
            reasons.push(format!("potential trajectory conflict (+{})", minima.proximity_risk));
        }

        let transponder_set = ctx
            .aircraft
            .as_ref()
            .map(AircraftState::has_transponder_code)
            .unwrap_or(false);
        if !transponder_set {
            score += minima.missing_transponder_risk;
            reasons.push(format!("transponder code missing (+{})", minima.missing_transponder_risk));
        }

        if let Some(weather) = ctx.weather.as_ref() {
            let age = ctx.now - weather.observed_at;
            if age > Duration::minutes(minima.weather_max_age_mins) {
                score += minima.stale_weather_risk;
                reasons.push(format!(
                    "weather observation {} min old (+{})",
                    age.num_minutes(),
                    minima.stale_weather_risk
                ));
            }
            if weather.visibility_km < minima.min_visibility_km * 2.0 {
                score += minima.marginal_visibility_risk;
                reasons.push(format!(
                    "marginal visibility {:.2} km (+{})",
                    weather.visibility_km, minima.marginal_visibility_risk
                ));
            }
        }

        (score.min(100), reasons)
    }
}

/// Aircraft exists, is on the ground and has an airport assigned.
fn check_preconditions(ctx: &ClearanceContext) -> Vec<ClearanceCheck> {
    let Some(aircraft) = ctx.aircraft.as_ref() else {
        return vec![ClearanceCheck::fail(
            "aircraft_exists",
            format!("aircraft {} not found", ctx.aircraft_id),
        )];
    };
    let mut checks = vec![ClearanceCheck::pass(
        "aircraft_exists",
        format!("aircraft {} ({})", aircraft.aircraft_id, aircraft.registration),
    )];

    if aircraft.status != AircraftStatus::OnGround {
        checks.push(ClearanceCheck::fail(
            "on_ground",
            format!("aircraft is not on the ground (status {:?})", aircraft.status),
        ));
        return checks;
    }
    checks.push(ClearanceCheck::pass("on_ground", "aircraft is on the ground"));

    match (aircraft.airport_id.as_deref(), ctx.airport.as_ref()) {
        (None, _) => checks.push(ClearanceCheck::fail("assigned_airport", "no airport assigned to the aircraft")),
        (Some(airport_id), None) => checks.push(ClearanceCheck::fail(
            "assigned_airport",
            format!("assigned airport {} not found", airport_id),
        )),
        (Some(_), Some(airport)) => checks.push(ClearanceCheck::pass(
            "assigned_airport",
            format!("departing {} ({})", airport.code, airport.name),
        )),
    }

    checks
}

/// Aircraft exists, is flying and the arrival airport is known.
fn check_landing_preconditions(ctx: &ClearanceContext) -> Vec<ClearanceCheck> {
    let Some(aircraft) = ctx.aircraft.as_ref() else {
        return vec![ClearanceCheck::fail(
            "aircraft_exists",
            format!("aircraft {} not found", ctx.aircraft_id),
        )];
    };
    let mut checks = vec![ClearanceCheck::pass(
        "aircraft_exists",
        format!("aircraft {} ({})", aircraft.aircraft_id, aircraft.registration),
    )];

    if !matches!(aircraft.status, AircraftStatus::Airborne | AircraftStatus::Holding) {
        checks.push(ClearanceCheck::fail(
            "airborne",
            format!("aircraft is not airborne (status {:?})", aircraft.status),
        ));
        return checks;
    }
    checks.push(ClearanceCheck::pass("airborne", format!("aircraft is {:?}", aircraft.status)));

    checks.push(match ctx.airport.as_ref() {
        Some(airport) => ClearanceCheck::pass(
            "arrival_airport",
            format!("arriving {} ({})", airport.code, airport.name),
        ),
        None => ClearanceCheck::fail("arrival_airport", "arrival airport unknown"),
    });

    checks
}

fn weather_minima_checks(
    ctx: &ClearanceContext,
    min_visibility_km: f64,
    max_wind_kmh: f64,
    max_crosswind_kmh: f64,
) -> Vec<ClearanceCheck> {
    let Some(weather) = ctx.weather.as_ref() else {
        return vec![ClearanceCheck::fail(
            "weather_data",
            "no weather observation available for the airport",
        )];
    };

    let mut checks = vec![ClearanceCheck::pass(
        "weather_data",
        format!("observation from {}", weather.observed_at.format("%Y-%m-%d %H:%M UTC")),
    )];

    let visibility = weather.visibility_km;
    checks.push(if visibility < min_visibility_km {
        ClearanceCheck::fail(
            "visibility",
            format!("visibility {:.2} km < minimum {:.2} km", visibility, min_visibility_km),
        )
    } else {
        ClearanceCheck::pass(
            "visibility",
            format!("visibility {:.2} km >= minimum {:.2} km", visibility, min_visibility_km),
        )
    });

    let wind = weather.wind_speed_kmh;
    checks.push(if wind > max_wind_kmh {
        ClearanceCheck::fail(
            "wind_speed",
            format!("wind {:.1} km/h > maximum {:.1} km/h", wind, max_wind_kmh),
        )
    } else {
        ClearanceCheck::pass(
            "wind_speed",
            format!("wind {:.1} km/h <= maximum {:.1} km/h", wind, max_wind_kmh),
        )
    });

    let crosswind = crosswind_kmh(weather, &ctx.runways);
    checks.push(if crosswind > max_crosswind_kmh {
        ClearanceCheck::fail(
            "crosswind",
            format!("crosswind {:.1} km/h > maximum {:.1} km/h", crosswind, max_crosswind_kmh),
        )
    } else {
        ClearanceCheck::pass(
            "crosswind",
            format!("crosswind {:.1} km/h <= maximum {:.1} km/h", crosswind, max_crosswind_kmh),
        )
    });

    checks
}

/// Nobody else is rolling or landing at the airport.
fn check_runway(ctx: &ClearanceContext) -> ClearanceCheck {
    let occupant = ctx
        .airport_traffic
        .iter()
        .filter(|other| other.aircraft_id != ctx.aircraft_id)
        .find(|other| other.status.occupies_runway());

    match occupant {
        Some(other) => ClearanceCheck::fail(
            "runway_available",
            format!("runway occupied: aircraft {} is {:?}", other.aircraft_id, other.status),
        ),
        None => ClearanceCheck::pass("runway_available", "runway clear"),
    }
}

/// Maximum crosswind over the airport's runways.
fn crosswind_kmh(weather: &WeatherObservation, runways: &[Runway]) -> f64 {
    if runways.is_empty() {
        return weather.crosswind_kmh.unwrap_or(0.0);
    }
    runways
        .iter()
        .map(|runway| {
            geodesy::crosswind_component(
                weather.wind_speed_kmh,
                weather.wind_direction_deg,
                runway.orientation_deg,
            )
        })
        .fold(0.0, f64::max)
}

fn reference_point(ctx: &ClearanceContext) -> Option<GeoPoint> {
    ctx.aircraft
        .as_ref()
        .and_then(|aircraft| aircraft.position)
        .or_else(|| ctx.airport.as_ref().map(Airport::position))
}

fn nearest_traffic(ctx: &ClearanceContext, reference: GeoPoint) -> Option<(String, f64)> {
    ctx.airborne_traffic
        .iter()
        .filter(|other| other.aircraft_id != ctx.aircraft_id)
        .filter_map(|other| {
            other
                .airborne_position()
                .map(|pos| (other.aircraft_id.clone(), reference.distance_km(&pos)))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}
