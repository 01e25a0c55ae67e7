//! Runtime around the radar core: world store, simulation tasks, conflict
//! loop and clearance service.

pub mod clearance;
pub mod config;
pub mod logging;
pub mod loops;
pub mod seed;
pub mod service;
pub mod simulation;
pub mod state;

pub use config::Config;
pub use seed::WorldSeed;
pub use service::{Departure, RadarService};
pub use simulation::{SimulationEngine, StartedFlight};
pub use state::World;
