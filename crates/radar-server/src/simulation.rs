//! Flight Simulation Engine runtime.
//!
//! Each active [`SimulationRun`] is driven by its own tokio task. The
//! registry (aircraft id -> run) is the single point of mutual exclusion:
//! starts go through `entry` so at most one run exists per aircraft, and
//! every tick re-checks its registry entry (by generation) before touching
//! the aircraft record. Lock order is always registry, then aircraft.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use radar_core::{
    FlightProfile, RadarError, RadarResult, SimulationEvent, SimulationRun, SimulationSnapshot,
};

use crate::state::World;

/// Returned to the caller when a simulation starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartedFlight {
    pub flight_id: String,
    pub aircraft_id: String,
    pub total_distance_km: f64,
    pub estimated_arrival: DateTime<Utc>,
}

struct ActiveRun {
    generation: u64,
    run: SimulationRun,
    task: Option<AbortHandle>,
}

struct Inner {
    world: Arc<World>,
    runs: DashMap<String, ActiveRun>,
    events: broadcast::Sender<SimulationEvent>,
    profile: FlightProfile,
    tick_period: Duration,
    flight_sequence: AtomicU32,
    generation: AtomicU64,
}

/// Schedules and tracks active simulation runs. Cheap to clone.
#[derive(Clone)]
pub struct SimulationEngine {
    inner: Arc<Inner>,
}

impl SimulationEngine {
    /// `tick_period` is the wall-clock time between steps of
    /// `profile.tick_secs` simulated seconds.
    pub fn new(
        world: Arc<World>,
        profile: FlightProfile,
        tick_period: Duration,
        event_buffer: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            inner: Arc::new(Inner {
                world,
                runs: DashMap::new(),
                events,
                profile,
                tick_period,
                flight_sequence: AtomicU32::new(1),
                generation: AtomicU64::new(1),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimulationEvent> {
        self.inner.events.subscribe()
    }

    /// Start simulating a flight and return its estimated arrival.
    ///
    /// Never waits for the flight; the run advances on its own task.
    pub fn start_simulation(
        &self,
        aircraft_id: &str,
        departure_airport_id: &str,
        arrival_airport_id: &str,
        departure_time: DateTime<Utc>,
    ) -> RadarResult<StartedFlight> {
        let inner = &self.inner;
        let aircraft = inner
            .world
            .get_aircraft(aircraft_id)
            .ok_or_else(|| RadarError::AircraftNotFound(aircraft_id.to_string()))?;
        let origin = inner
            .world
            .get_airport(departure_airport_id)
            .ok_or_else(|| RadarError::AirportNotFound(departure_airport_id.to_string()))?;
        let destination = inner
            .world
            .get_airport(arrival_airport_id)
            .ok_or_else(|| RadarError::AirportNotFound(arrival_airport_id.to_string()))?;
        if origin.airport_id == destination.airport_id {
            return Err(RadarError::InvalidRoute(origin.airport_id));
        }

        // Cheap pre-check so a rejected start does not burn a flight number
        if inner.runs.contains_key(aircraft_id) {
            return Err(RadarError::AlreadyRunning(aircraft_id.to_string()));
        }

        let flight_id = self.next_flight_id(&aircraft.registration);
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst);
        let run = SimulationRun::new(
            flight_id,
            aircraft_id,
            &origin,
            &destination,
            departure_time,
            inner.profile,
        );
        let started = StartedFlight {
            flight_id: run.flight_id.clone(),
            aircraft_id: aircraft_id.to_string(),
            total_distance_km: run.total_distance_km,
            estimated_arrival: run.estimated_arrival,
        };

        match inner.runs.entry(aircraft_id.to_string()) {
            Entry::Occupied(_) => return Err(RadarError::AlreadyRunning(aircraft_id.to_string())),
            Entry::Vacant(vacant) => {
                let active = vacant.insert(ActiveRun {
                    generation,
                    run,
                    task: None,
                });
                let now = Utc::now();
                let written = inner
                    .world
                    .update_aircraft(aircraft_id, |aircraft| active.run.apply_to(aircraft, now));
                drop(active);
                if !written {
                    inner.runs.remove_if(aircraft_id, |_, active| active.generation == generation);
                    return Err(RadarError::AircraftNotFound(aircraft_id.to_string()));
                }
            }
        }

        let handle = tokio::spawn(drive(self.clone(), aircraft_id.to_string(), generation));
        if let Some(mut active) = inner.runs.get_mut(aircraft_id) {
            if active.generation == generation {
                active.task = Some(handle.abort_handle());
            }
        }

        tracing::info!(
            "Simulation {} started for {}: {} -> {} ({:.1} km, ETA {})",
            started.flight_id,
            aircraft_id,
            origin.code,
            destination.code,
            started.total_distance_km,
            started.estimated_arrival.format("%H:%M:%S")
        );

        Ok(started)
    }

    pub fn is_running(&self, aircraft_id: &str) -> bool {
        self.inner.runs.contains_key(aircraft_id)
    }

    /// Current position information for an active run.
    pub fn snapshot(&self, flight_id: &str) -> RadarResult<SimulationSnapshot> {
        self.inner
            .runs
            .iter()
            .find(|r| r.value().run.flight_id == flight_id)
            .map(|r| r.value().run.snapshot())
            .ok_or_else(|| RadarError::FlightNotFound(flight_id.to_string()))
    }

    pub fn active_runs(&self) -> Vec<SimulationSnapshot> {
        let mut runs: Vec<SimulationSnapshot> =
            self.inner.runs.iter().map(|r| r.value().run.snapshot()).collect();
        runs.sort_by(|a, b| a.aircraft_id.cmp(&b.aircraft_id));
        runs
    }

    /// Stop the run for an aircraft. The aircraft record is left as the last
    /// tick wrote it. Returns false when nothing was running.
    pub fn cancel_simulation(&self, aircraft_id: &str) -> bool {
        self.abort(aircraft_id, "cancelled")
    }

    /// Cancel every active run.
    pub fn cancel_all(&self, reason: &str) -> usize {
        let aircraft_ids: Vec<String> = self.inner.runs.iter().map(|r| r.key().clone()).collect();
        aircraft_ids
            .iter()
            .filter(|aircraft_id| self.abort(aircraft_id, reason))
            .count()
    }

    fn abort(&self, aircraft_id: &str, reason: &str) -> bool {
        let Some((_, active)) = self.inner.runs.remove(aircraft_id) else {
            return false;
        };
        if let Some(task) = active.task {
            task.abort();
        }

        tracing::info!(
            "Simulation {} for {} aborted: {}",
            active.run.flight_id,
            aircraft_id,
            reason
        );
        let _ = self.inner.events.send(SimulationEvent::Aborted {
            flight_id: active.run.flight_id,
            aircraft_id: aircraft_id.to_string(),
            reason: reason.to_string(),
        });
        true
    }

    /// Advance one run by a single tick. Returns false once the run is over.
    fn step(&self, aircraft_id: &str, generation: u64) -> bool {
        let inner = &self.inner;
        let now = Utc::now();

        let Some(mut active) = inner.runs.get_mut(aircraft_id) else {
            return false;
        };
        if active.generation != generation {
            return false;
        }

        let report = active.run.advance();
        let run = &active.run;
        let written = inner
            .world
            .update_aircraft(aircraft_id, |aircraft| run.apply_to(aircraft, now));

        if !written {
            let flight_id = run.flight_id.clone();
            drop(active);
            inner.runs.remove_if(aircraft_id, |_, active| active.generation == generation);
            tracing::error!(
                "Aircraft {} disappeared during simulation {}; run terminated",
                aircraft_id,
                flight_id
            );
            let _ = inner.events.send(SimulationEvent::Aborted {
                flight_id,
                aircraft_id: aircraft_id.to_string(),
                reason: "aircraft record no longer exists".to_string(),
            });
            return false;
        }

        let snapshot = run.snapshot();
        let arrival_airport_id = run.destination.airport_id.clone();
        drop(active);

        tracing::debug!(
            "{} {} at ({:.4}, {:.4}) alt {:.0} m, {:.0} km/h, {:.1} km to go",
            snapshot.flight_id,
            snapshot.phase,
            snapshot.lat,
            snapshot.lon,
            snapshot.altitude_m,
            snapshot.speed_kmh,
            snapshot.distance_remaining_km
        );
        if report.transitioned() {
            tracing::info!(
                "{} {} -> {} ({:.1} km remaining)",
                snapshot.flight_id,
                report.previous_phase,
                report.phase,
                snapshot.distance_remaining_km
            );
        }

        let flight_id = snapshot.flight_id.clone();
        let _ = inner.events.send(SimulationEvent::PositionUpdate(snapshot));

        if !report.completed() {
            return true;
        }

        inner.runs.remove_if(aircraft_id, |_, active| active.generation == generation);
        tracing::info!(
            "{} landed at {}; {} is on the ground",
            flight_id,
            arrival_airport_id,
            aircraft_id
        );
        let _ = inner.events.send(SimulationEvent::Completed {
            flight_id,
            aircraft_id: aircraft_id.to_string(),
            arrival_airport_id,
            completed_at: now,
        });
        false
    }

    /// `AT` + last three alphanumerics of the registration + a 4-digit sequence.
    fn next_flight_id(&self, registration: &str) -> String {
        let tail: String = registration
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_ascii_uppercase();
        let tail = &tail[tail.len().saturating_sub(3)..];
        let sequence = self.inner.flight_sequence.fetch_add(1, Ordering::SeqCst) % 10_000;
        format!("AT{}{:04}", tail, sequence)
    }
}

/// Releases the registry entry of a run whose task ends without going
/// through `step` or `abort` (a panic, or the runtime dropping the task).
struct RunGuard {
    engine: SimulationEngine,
    aircraft_id: String,
    generation: u64,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let generation = self.generation;
        let Some((_, active)) = self
            .engine
            .inner
            .runs
            .remove_if(&self.aircraft_id, |_, active| active.generation == generation)
        else {
            return;
        };

        tracing::error!(
            "Simulation task for {} ({}) stopped unexpectedly; run released",
            self.aircraft_id,
            active.run.flight_id
        );
        let _ = self.engine.inner.events.send(SimulationEvent::Aborted {
            flight_id: active.run.flight_id,
            aircraft_id: self.aircraft_id.clone(),
            reason: "simulation task stopped unexpectedly".to_string(),
        });
    }
}

async fn drive(engine: SimulationEngine, aircraft_id: String, generation: u64) {
    let guard = RunGuard {
        engine,
        aircraft_id,
        generation,
    };

    let period = guard.engine.inner.tick_period;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !guard.engine.step(&guard.aircraft_id, guard.generation) {
            break;
        }
    }
}
