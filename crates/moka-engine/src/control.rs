//! Control channel handling.
//!
//! Messages on the control topic carry a bare command word (`start`,
//! `stop` or `reset`). Anything else is logged and dropped; a malformed
//! command never stops the transport.

use moka_core::service::SimulatorHandle;
use moka_types::{ControlCommand, ParseCommandError};
use tracing::{info, warn};

/// Decode a control payload.
///
/// # Errors
///
/// Returns [`ParseCommandError`] if the payload is not UTF-8 or not a
/// known command.
pub fn decode(payload: &[u8]) -> Result<ControlCommand, ParseCommandError> {
    std::str::from_utf8(payload)
        .map_err(|e| ParseCommandError(format!("payload is not UTF-8: {e}")))?
        .parse()
}

/// Decode a control payload and forward it to the simulator.
pub async fn dispatch(payload: &[u8], simulator: &SimulatorHandle) {
    let command = match decode(payload) {
        Ok(command) => command,
        Err(e) => {
            warn!(error = %e, "Ignoring control message");
            return;
        }
    };

    info!(%command, "Control command received over MQTT");
    match simulator.apply(command).await {
        Ok(snapshot) => info!(%command, phase = %snapshot.phase, "Control command applied"),
        Err(e) => warn!(%command, error = %e, "Control command dropped"),
    }
}
