//! Control commands accepted by the simulator.
//!
//! The same three commands arrive either as HTTP requests or as plain-text
//! payloads on the bus control channel. Both paths parse into a
//! [`ControlCommand`] so they reach the simulator identically.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Unprefixed name of the bus control channel.
pub const CONTROL_CHANNEL: &str = "control";

/// An operator command for the brew simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ControlCommand {
    /// Begin a brew from cold. Ignored while a brew is already running.
    Start,
    /// Abort the brew and hard reset to idle.
    Stop,
    /// Hard reset to idle from any phase.
    Reset,
}

impl ControlCommand {
    /// Plain-text payload for this command.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Reset => "reset",
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unrecognized control payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown control command: {0:?}")]
pub struct ParseCommandError(pub String);

impl FromStr for ControlCommand {
    type Err = ParseCommandError;

    /// Parse a control payload. Surrounding whitespace and letter case
    /// are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "reset" => Ok(Self::Reset),
            _ => Err(ParseCommandError(s.to_owned())),
        }
    }
}
