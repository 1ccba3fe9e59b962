//! Coordinator, factory, factions, and the day/night cycle driver for the
//! Skynet simulation.
//!
//! One factory and `F` factions run concurrently for a fixed number of days.
//! Each day the factory produces parts; each night every faction collects a
//! fair share of them and assembles robots from complete sets. Two reusable
//! rendezvous points keep every participant on the same cycle.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `skynet-config.yaml` into
//!   strongly-typed structs.
//! - [`coordinator`] -- Day counter, phase, running flag, and the two
//!   rendezvous points.
//! - [`source`] -- [`PartSource`] trait with seeded and cyclic sources.
//! - [`factory`] -- Part production and fair-share collection.
//! - [`faction`] -- Per-faction collection, inventory, and robot assembly.
//! - [`conservation`] -- End-of-run part accounting.
//! - [`runner`] -- [`Simulation`] driver and the [`DayCallback`] hook.
//!
//! [`PartSource`]: source::PartSource
//! [`Simulation`]: runner::Simulation
//! [`DayCallback`]: runner::DayCallback

pub mod config;
pub mod conservation;
pub mod coordinator;
pub mod faction;
pub mod factory;
mod rendezvous;
pub mod runner;
pub mod source;
