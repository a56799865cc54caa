//! Brew control REST handlers.
//!
//! Each route forwards one [`ControlCommand`] to the simulator service and
//! answers with the snapshot that command published.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`/`POST` | `/api/start` | Start a brew (no-op while running) |
//! | `GET`/`POST` | `/api/stop` | Stop and reset to idle |
//! | `GET`/`POST` | `/api/reset` | Reset to idle |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use moka_types::{ControlCommand, Snapshot};
use tracing::info;

use crate::error::ObserverError;
use crate::state::AppState;

/// Response body for the control routes.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ControlResponse {
    /// `started`, `stopped` or `reset`.
    pub status: String,
    /// State published by the command.
    pub snapshot: Snapshot,
}

const fn status_word(command: ControlCommand) -> &'static str {
    match command {
        ControlCommand::Start => "started",
        ControlCommand::Stop => "stopped",
        ControlCommand::Reset => "reset",
    }
}

async fn run(
    state: &AppState,
    command: ControlCommand,
) -> Result<Json<ControlResponse>, ObserverError> {
    info!(%command, "Control request received over HTTP");
    let snapshot = state.simulator.apply(command).await?;
    Ok(Json(ControlResponse {
        status: status_word(command).to_owned(),
        snapshot,
    }))
}

/// Start a brew.
pub async fn start(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ControlResponse>, ObserverError> {
    run(&state, ControlCommand::Start).await
}

/// Stop the brew and reset to idle.
pub async fn stop(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ControlResponse>, ObserverError> {
    run(&state, ControlCommand::Stop).await
}

/// Reset to idle.
pub async fn reset(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ControlResponse>, ObserverError> {
    run(&state, ControlCommand::Reset).await
}
