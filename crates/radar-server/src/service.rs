//! Facade exposed to the surrounding application.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use radar_core::{
    AircraftState, AircraftStatus, ClearanceDecision, ClearanceEngine, ConflictAlert,
    ConflictDetector, FlightProfile, RadarError, RadarResult, SimulationEvent, SimulationSnapshot,
    TakeoffMinima,
};

use crate::clearance::{build_context, build_landing_context};
use crate::config::Config;
use crate::loops::conflict_loop::run_conflict_loop;
use crate::simulation::{SimulationEngine, StartedFlight};
use crate::state::World;

/// Outcome of a departure request.
#[derive(Debug, Clone, Serialize)]
pub struct Departure {
    pub decision: ClearanceDecision,
    /// Present only when clearance was granted
    pub flight: Option<StartedFlight>,
}

pub struct RadarService {
    world: Arc<World>,
    simulations: SimulationEngine,
    detector: ConflictDetector,
    clearance: ClearanceEngine,
    conflicts_tx: broadcast::Sender<Vec<ConflictAlert>>,
    config: Config,
}

impl RadarService {
    pub fn new(world: Arc<World>, config: Config) -> Self {
        let profile = FlightProfile::default();
        let simulations = SimulationEngine::new(
            world.clone(),
            profile,
            config.wall_period(profile.tick_secs),
            config.event_buffer,
        );
        let minima = TakeoffMinima {
            weather_max_age_mins: config.weather_max_age_mins,
            ..TakeoffMinima::default()
        };
        let (conflicts_tx, _) = broadcast::channel(config.event_buffer.max(1));

        Self {
            world,
            simulations,
            detector: ConflictDetector::default(),
            clearance: ClearanceEngine::new(minima),
            conflicts_tx,
            config,
        }
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn start_simulation(
        &self,
        aircraft_id: &str,
        departure_airport_id: &str,
        arrival_airport_id: &str,
        departure_time: DateTime<Utc>,
    ) -> RadarResult<StartedFlight> {
        self.simulations.start_simulation(
            aircraft_id,
            departure_airport_id,
            arrival_airport_id,
            departure_time,
        )
    }

    pub fn is_simulation_running(&self, aircraft_id: &str) -> bool {
        self.simulations.is_running(aircraft_id)
    }

    pub fn simulation_snapshot(&self, flight_id: &str) -> RadarResult<SimulationSnapshot> {
        self.simulations.snapshot(flight_id)
    }

    pub fn active_simulations(&self) -> Vec<SimulationSnapshot> {
        self.simulations.active_runs()
    }

    pub fn cancel_simulation(&self, aircraft_id: &str) -> bool {
        self.simulations.cancel_simulation(aircraft_id)
    }

    /// Stateless scan over a caller-supplied snapshot.
    pub fn scan_conflicts_once(&self, airborne: &[AircraftState]) -> Vec<ConflictAlert> {
        self.detector.scan_once(airborne, Utc::now())
    }

    /// Alerts from the latest conflict loop cycle.
    pub fn active_conflicts(&self) -> Vec<ConflictAlert> {
        self.world.get_conflicts()
    }

    pub fn request_takeoff_clearance(&self, aircraft_id: &str) -> ClearanceDecision {
        let ctx = build_context(&self.world, aircraft_id, Utc::now());
        let decision = self.clearance.evaluate(&ctx);
        log_decision(aircraft_id, &decision);
        decision
    }

    /// Landing clearance at `airport_id`.
    ///
    /// For an aircraft not driven by a simulation the decision is applied:
    /// GRANTED puts it on the arrival runway as LANDING, anything else puts
    /// it in HOLDING. A simulated flight owns its aircraft record, so there
    /// the decision is advisory.
    pub fn request_landing_clearance(
        &self,
        aircraft_id: &str,
        airport_id: &str,
    ) -> RadarResult<ClearanceDecision> {
        if self.world.get_airport(airport_id).is_none() {
            return Err(RadarError::AirportNotFound(airport_id.to_string()));
        }

        let now = Utc::now();
        let ctx = build_landing_context(&self.world, aircraft_id, airport_id, now);
        let decision = self.clearance.evaluate_landing(&ctx);
        log_decision(aircraft_id, &decision);

        let flying = matches!(
            ctx.aircraft.as_ref().map(|aircraft| aircraft.status),
            Some(AircraftStatus::Airborne | AircraftStatus::Holding)
        );
        if flying && !self.simulations.is_running(aircraft_id) {
            let granted = decision.is_granted();
            self.world.update_aircraft(aircraft_id, |aircraft| {
                if !matches!(aircraft.status, AircraftStatus::Airborne | AircraftStatus::Holding) {
                    return;
                }
                if granted {
                    aircraft.status = AircraftStatus::Landing;
                    aircraft.airport_id = Some(airport_id.to_string());
                } else {
                    aircraft.status = AircraftStatus::Holding;
                }
                aircraft.last_update = now;
            });
            if !granted {
                tracing::info!("{}: maintain altitude and await instructions", aircraft_id);
            }
        }

        Ok(decision)
    }

    /// Request clearance and, when granted, put the aircraft on its takeoff
    /// roll and start simulating the flight from its airport.
    pub fn depart(&self, aircraft_id: &str, arrival_airport_id: &str) -> RadarResult<Departure> {
        let aircraft = self
            .world
            .get_aircraft(aircraft_id)
            .ok_or_else(|| RadarError::AircraftNotFound(aircraft_id.to_string()))?;
        if self.world.get_airport(arrival_airport_id).is_none() {
            return Err(RadarError::AirportNotFound(arrival_airport_id.to_string()));
        }
        if aircraft.airport_id.as_deref() == Some(arrival_airport_id) {
            return Err(RadarError::InvalidRoute(arrival_airport_id.to_string()));
        }
        if self.simulations.is_running(aircraft_id) {
            return Err(RadarError::AlreadyRunning(aircraft_id.to_string()));
        }

        let decision = self.request_takeoff_clearance(aircraft_id);
        if !decision.is_granted() {
            return Ok(Departure {
                decision,
                flight: None,
            });
        }

        // Granted implies the aircraft is parked at an assigned airport
        let Some(departure_airport_id) = aircraft.airport_id else {
            return Err(RadarError::AircraftNotFound(aircraft_id.to_string()));
        };

        let now = Utc::now();
        // Only one concurrent departure gets the aircraft off the stand
        if !self.world.transition_status(
            aircraft_id,
            AircraftStatus::OnGround,
            AircraftStatus::TakeoffRoll,
            now,
        ) {
            return Err(RadarError::AlreadyRunning(aircraft_id.to_string()));
        }

        match self
            .simulations
            .start_simulation(aircraft_id, &departure_airport_id, arrival_airport_id, now)
        {
            Ok(flight) => Ok(Departure {
                decision,
                flight: Some(flight),
            }),
            Err(err @ RadarError::AlreadyRunning(_)) => Err(err),
            Err(err) => {
                self.world.transition_status(
                    aircraft_id,
                    AircraftStatus::TakeoffRoll,
                    AircraftStatus::OnGround,
                    Utc::now(),
                );
                Err(err)
            }
        }
    }

    pub fn subscribe_simulation(&self) -> broadcast::Receiver<SimulationEvent> {
        self.simulations.subscribe()
    }

    pub fn subscribe_conflicts(&self) -> broadcast::Receiver<Vec<ConflictAlert>> {
        self.conflicts_tx.subscribe()
    }

    /// Spawn the periodic conflict loop at the configured scan period.
    pub fn spawn_conflict_loop(&self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let period = self.config.wall_period(self.config.conflict_scan_secs as f64);
        tokio::spawn(run_conflict_loop(
            self.world.clone(),
            self.detector.clone(),
            period,
            self.conflicts_tx.clone(),
            shutdown,
        ))
    }

    /// Cancel every active simulation.
    pub fn shutdown(&self) {
        let cancelled = self.simulations.cancel_all("shutdown");
        if cancelled > 0 {
            tracing::info!("Cancelled {} active simulation(s)", cancelled);
        }
    }
}

fn log_decision(aircraft_id: &str, decision: &ClearanceDecision) {
    if decision.is_granted() {
        tracing::info!("{}: {}", aircraft_id, decision.summary);
    } else {
        let failed: Vec<&str> = decision
            .failed_checks()
            .map(|check| check.explanation.as_str())
            .collect();
        tracing::warn!(
            "{}: {:?} - {} ({})",
            aircraft_id,
            decision.outcome,
            decision.summary,
            failed.join("; ")
        );
    }
}
