//! Error type shared by the radar crates.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadarError {
    /// A simulation for this aircraft is already active
    #[error("a simulation is already running for aircraft {0}")]
    AlreadyRunning(String),

    #[error("aircraft {0} not found")]
    AircraftNotFound(String),

    #[error("airport {0} not found")]
    AirportNotFound(String),

    #[error("no active simulation with flight id {0}")]
    FlightNotFound(String),

    #[error("invalid route: {0}")]
    InvalidRoute(String),
}

pub type RadarResult<T> = Result<T, RadarError>;
