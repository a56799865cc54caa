//! Observer API server for the moka pot simulator.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Control endpoints** (`/api/start`, `/api/stop`, `/api/reset`) that
//!   forward commands to the simulator service
//! - **`WebSocket` endpoint** (`/ws/state`) streaming every published
//!   snapshot via [`tokio::sync::broadcast`], starting with the retained
//!   latest one
//! - **State endpoint** (`/api/state`) returning the latest snapshot and
//!   message bus connectivity
//! - **Minimal HTML status page** (`GET /`)
//!
//! # Architecture
//!
//! The simulator publishes into a [`StateFeed`], which is just another
//! [`StatePublisher`](moka_core::publish::StatePublisher) next to the
//! MQTT transport. Reads never go through the simulator task unless
//! nothing has been published yet.
//!
//! [`StateFeed`]: state::StateFeed

pub mod control;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, bind, serve};
pub use startup::{StartupError, spawn_observer};
pub use state::{AppState, PublishedState, StateFeed};
