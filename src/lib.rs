//! # Bomber Crew Simulator
//!
//! A deterministic, tick-driven simulation of a heavy bomber under combat
//! attrition: airframe sections and systems take damage and burn, crew members
//! run timed multi-phase jobs to keep the aircraft flying, and a hazard
//! scheduler throws flak and fighters at it with a rate and severity that
//! follow the danger of the current leg.
//!
//! ## Features
//!
//! - **Vehicle model**: section and system integrity, fire damage and spread,
//!   engine feathering and restarts, fuel burn and altitude loss
//! - **Crew tasks**: move, man station, extinguish, repair, treat, feather and
//!   restart, with exclusive per-target locks and an injury timeline
//! - **Hazards**: Cruise/Flak/Fighters phases with danger-scaled strikes and wounds
//! - **Commands**: bounded command queue plus time-tagged JSON scripts
//! - **Reproducible**: every random stream is seeded from [`SimConfig::seed`]
//!
//! ## Quick Start
//!
//! ```rust
//! use bomber_sim::{SimConfig, Simulation};
//!
//! let mut sim = Simulation::with_b17(SimConfig::default()).expect("default roster is valid");
//!
//! for _ in 0..100 {
//!     if let Some(snapshot) = sim.tick() {
//!         println!("{}", snapshot.summary_line());
//!     }
//! }
//! assert_eq!(sim.step_count(), 100);
//! ```
//!
//! ## Architecture
//!
//! - [`simulation`] - Clock driving every component in a fixed order
//! - [`vehicle`] - Sections, systems, engines, fuel and altitude
//! - [`crew`] - Roster state, injuries and the action state machine
//! - [`hazard`] - Phase scheduler and strike/injury generation
//! - [`command_queue`] - Crew command validation and dispatch
//! - [`scheduler`] - Time-tagged scripted commands
//! - [`protocol`] - JSON command envelopes and outcomes
//! - [`events`] - Signal bus with bounded history
//! - [`telemetry`] - Periodic state snapshots

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod command_queue;
pub mod config;
pub mod crew;
pub mod events;
pub mod hazard;
pub mod layout;
pub mod protocol;
pub mod roster;
pub mod scheduler;
pub mod simulation;
pub mod telemetry;
pub mod travel;
pub mod vehicle;

// Re-export main public types for convenience
pub use command_queue::{CommandQueue, CrewCommand};
pub use config::{ConfigError, SimConfig};
pub use crew::{CrewAction, CrewState, HealthStatus};
pub use events::{EventBus, SimEvent, SimEventRecord};
pub use hazard::{HazardPhase, HazardScheduler};
pub use layout::{PositionService, StaticLayout};
pub use roster::Roster;
pub use simulation::{Simulation, SimulationError};
pub use telemetry::SimSnapshot;
pub use travel::{LegConfig, TimedLeg, TravelFeed};
pub use vehicle::VehicleState;
