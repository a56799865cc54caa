//! Brew model, tick scheduling, and the simulator service for the moka pot
//! simulator.
//!
//! This crate owns everything that changes the brew state. Transports and
//! dashboards live elsewhere and only see published snapshots.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `moka-config.yaml` into
//!   strongly-typed structs.
//! - [`model`] -- The piecewise-linear pot and its pure tick step.
//! - [`publish`] -- [`StatePublisher`] seam plus fan-out and in-memory
//!   publishers.
//! - [`simulator`] -- [`BrewSimulator`], the start/stop/reset state machine
//!   that owns the single tick timer.
//! - [`timer`] -- Tick timer traits and a manual scheduler for tests.
//! - [`service`] -- Tokio task that serializes access to the simulator and
//!   hands out [`SimulatorHandle`]s.
//!
//! [`StatePublisher`]: publish::StatePublisher
//! [`BrewSimulator`]: simulator::BrewSimulator
//! [`SimulatorHandle`]: service::SimulatorHandle

pub mod config;
pub mod model;
pub mod publish;
pub mod service;
pub mod simulator;
pub mod timer;
