//! Immutable snapshot of the published simulator fields.
//!
//! Subscribers never see the live simulation state. Every publish carries
//! a [`Snapshot`], which is encoded into one plain-text payload per
//! [`Channel`].

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Channel, Phase};

/// The four published fields at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Snapshot {
    /// Boiler temperature in degrees Celsius.
    pub temperature: f64,
    /// Boiler pressure in bar.
    pub pressure: f64,
    /// Extracted coffee in percent of the upper chamber.
    pub coffee_volume: f64,
    /// Current operating phase.
    pub phase: Phase,
}

impl Snapshot {
    /// Encode a single channel's payload.
    ///
    /// Temperature and pressure carry two fractional digits, coffee volume
    /// one, and the phase its lowercase wire name.
    pub fn payload(&self, channel: Channel) -> String {
        match channel {
            Channel::Temperature => format!("{:.2}", self.temperature),
            Channel::Pressure => format!("{:.2}", self.pressure),
            Channel::CoffeeVolume => format!("{:.1}", self.coffee_volume),
            Channel::Phase => self.phase.as_str().to_owned(),
        }
    }

    /// Encode every channel in publish order.
    pub fn payloads(&self) -> [(Channel, String); 4] {
        Channel::ALL.map(|channel| (channel, self.payload(channel)))
    }
}

/// Build a full topic from an optional deployment prefix and a channel name.
///
/// An empty prefix yields the bare channel name. Trailing slashes on the
/// prefix are ignored.
pub fn topic(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_precision_per_channel() {
        let snap = Snapshot {
            temperature: 80.0,
            pressure: 1.0,
            coffee_volume: 1.0,
            phase: Phase::Brewing,
        };
        let payloads = snap.payloads();
        assert_eq!(
            payloads,
            [
                (Channel::Temperature, "80.00".to_owned()),
                (Channel::Pressure, "1.00".to_owned()),
                (Channel::CoffeeVolume, "1.0".to_owned()),
                (Channel::Phase, "brewing".to_owned()),
            ]
        );
    }

    #[test]
    fn payload_rounds_fractional_values() {
        let snap = Snapshot {
            temperature: 80.5,
            pressure: 30.5 / 30.0,
            coffee_volume: 2.0 / 3.0,
            phase: Phase::Brewing,
        };
        assert_eq!(snap.payload(Channel::Temperature), "80.50");
        assert_eq!(snap.payload(Channel::Pressure), "1.02");
        assert_eq!(snap.payload(Channel::CoffeeVolume), "0.7");
    }

    #[test]
    fn topic_prefixing() {
        assert_eq!(topic("", "state/phase"), "state/phase");
        assert_eq!(topic("moka", "state/phase"), "moka/state/phase");
        assert_eq!(topic("moka/", "control"), "moka/control");
    }
}
