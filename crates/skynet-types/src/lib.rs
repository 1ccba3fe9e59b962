//! Shared type definitions for the Skynet simulation.
//!
//! This crate is the single source of truth for the values that flow
//! between the coordinator, the factory, the factions, and the engine
//! binary.
//!
//! # Modules
//!
//! - [`ids`] -- Faction indices, rendezvous participants, and run IDs
//! - [`enums`] -- Part kinds and the day/night phase
//! - [`inventory`] -- Fixed-domain part counts and robot assembly
//! - [`result`] -- Per-faction reports and the final simulation result

pub mod enums;
pub mod ids;
pub mod inventory;
pub mod result;

// Re-export all public types at crate root for convenience.
pub use enums::{PartKind, Phase};
pub use ids::{FactionId, Participant, RunId};
pub use inventory::Inventory;
pub use result::{FactionReport, Outcome, SimulationResult};
