pub mod clearance;
pub mod conflict;
pub mod error;
pub mod flight;
pub mod geodesy;
pub mod models;
pub mod rules;

pub use clearance::{
    ClearanceCheck, ClearanceContext, ClearanceDecision, ClearanceEngine, ClearanceOutcome,
};
pub use conflict::{ConflictAlert, ConflictDetector, ConflictSeverity};
pub use error::{RadarError, RadarResult};
pub use flight::{SimulationRun, TickReport};
pub use models::{
    AircraftState, AircraftStatus, Airport, FlightPhase, GeoPoint, Runway, SimulationEvent,
    SimulationSnapshot, WeatherObservation,
};
pub use rules::{FlightProfile, LandingMinima, SeparationRules, TakeoffMinima};
