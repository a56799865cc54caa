//! Enumeration types for the brew simulator.
//!
//! [`Phase`] is the discrete operating mode of the pot and [`Channel`]
//! names the four retained state channels the simulator publishes on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Operating mode of the moka pot.
///
/// The only forward path is `Idle -> Heating -> Brewing -> Finished`.
/// `Finished` is terminal until the next start; any stop or reset returns
/// the pot to `Idle`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Phase {
    /// Cold pot at ambient temperature, nothing extracted.
    #[default]
    Idle,
    /// Water is heating but pressure has not reached the brew threshold.
    Heating,
    /// Pressure is at or above the brew threshold and coffee is flowing.
    Brewing,
    /// The upper chamber is full. Terminal until a new start.
    Finished,
}

impl Phase {
    /// Every phase in state-machine order.
    pub const ALL: [Self; 4] = [Self::Idle, Self::Heating, Self::Brewing, Self::Finished];

    /// Wire name used on the `state/phase` channel.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Heating => "heating",
            Self::Brewing => "brewing",
            Self::Finished => "finished",
        }
    }

    /// Whether a tick timer is expected to be driving this phase.
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Heating | Self::Brewing)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known phase name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown phase: {0:?}")]
pub struct ParsePhaseError(pub String);

impl FromStr for Phase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| ParsePhaseError(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// A retained state channel published after every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Channel {
    /// Boiler temperature in degrees Celsius, two fractional digits.
    Temperature,
    /// Boiler pressure in bar, two fractional digits.
    Pressure,
    /// Extracted coffee in percent, one fractional digit.
    CoffeeVolume,
    /// Current [`Phase`] wire name.
    Phase,
}

impl Channel {
    /// All channels in publish order.
    pub const ALL: [Self; 4] = [
        Self::Temperature,
        Self::Pressure,
        Self::CoffeeVolume,
        Self::Phase,
    ];

    /// Channel name without any deployment prefix.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Temperature => "state/temperature",
            Self::Pressure => "state/pressure",
            Self::CoffeeVolume => "state/coffee_volume",
            Self::Phase => "state/phase",
        }
    }

    /// Resolve a channel from its unprefixed name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
