//! Brew model and the pure tick step.
//!
//! The model is a deliberately simple piecewise-linear pot:
//!
//! - Temperature rises by a fixed delta per tick until it reaches the
//!   ceiling.
//! - Pressure is never integrated. It is recomputed from temperature on
//!   every tick as `clamp((T - onset) / span, 0, max_pressure)`.
//! - Once pressure reaches the brew threshold, coffee volume rises by a
//!   fixed delta per tick until the upper chamber is full.
//!
//! [`BrewModel::step`] is a pure function of the previous [`BrewState`].
//! Scheduling, publishing and timer ownership live in
//! [`crate::simulator`].

use std::time::Duration;

use moka_types::{Phase, Snapshot};

use crate::config::SimulationConfig;

/// Mutable brew fields, without the timer that drives them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrewState {
    /// Boiler temperature in degrees Celsius.
    pub temperature: f64,
    /// Boiler pressure in bar, always derived from `temperature`.
    pub pressure: f64,
    /// Extracted coffee in percent.
    pub coffee_volume: f64,
    /// Current operating phase.
    pub phase: Phase,
}

impl BrewState {
    /// Copy out the published fields.
    pub const fn snapshot(&self) -> Snapshot {
        Snapshot {
            temperature: self.temperature,
            pressure: self.pressure,
            coffee_volume: self.coffee_volume,
            phase: self.phase,
        }
    }
}

/// Fixed parameters of the brew model, derived once from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BrewModel {
    /// Wall-clock period between ticks.
    pub tick_interval: Duration,
    /// Cold-start temperature.
    pub ambient_temperature: f64,
    /// Temperature ceiling.
    pub max_temperature: f64,
    /// Temperature added per tick while below the ceiling.
    pub temperature_delta: f64,
    /// Temperature at which pressure starts to build.
    pub pressure_onset_temperature: f64,
    /// Degrees above onset per bar.
    pub pressure_span: f64,
    /// Pressure ceiling.
    pub max_pressure: f64,
    /// Pressure at which coffee flows.
    pub brew_pressure: f64,
    /// Coffee volume added per brewing tick.
    pub coffee_delta: f64,
    /// Volume at which the brew finishes.
    pub max_coffee_volume: f64,
}

impl BrewModel {
    /// Derive the per-tick deltas from a (validated) configuration.
    ///
    /// Both deltas spread their full range over the nominal ramp:
    /// `(max - ambient) / total_ticks` for temperature and
    /// `max_volume / total_ticks` for coffee.
    pub fn from_config(config: &SimulationConfig) -> Self {
        let total_ticks = config.total_ticks();
        Self {
            tick_interval: Duration::from_millis(u64::from(config.tick_ms)),
            ambient_temperature: config.ambient_temperature,
            max_temperature: config.max_temperature,
            temperature_delta: (config.max_temperature - config.ambient_temperature)
                / total_ticks,
            pressure_onset_temperature: config.pressure_onset_temperature,
            pressure_span: config.pressure_span,
            max_pressure: config.max_pressure,
            brew_pressure: config.brew_pressure,
            coffee_delta: config.max_coffee_volume / total_ticks,
            max_coffee_volume: config.max_coffee_volume,
        }
    }

    /// Pressure as a pure function of temperature.
    pub fn pressure_at(&self, temperature: f64) -> f64 {
        ((temperature - self.pressure_onset_temperature) / self.pressure_span)
            .clamp(0.0, self.max_pressure)
    }

    /// Cold pot in the given phase: ambient temperature, no pressure,
    /// nothing extracted.
    pub const fn cold(&self, phase: Phase) -> BrewState {
        BrewState {
            temperature: self.ambient_temperature,
            pressure: 0.0,
            coffee_volume: 0.0,
            phase,
        }
    }

    /// Advance the brew by one tick.
    ///
    /// A finished brew is returned with its coffee volume clamped to the
    /// maximum and its phase set to [`Phase::Finished`]; the caller is
    /// responsible for stopping the timer.
    pub fn step(&self, state: &BrewState) -> BrewState {
        let mut next = *state;

        if next.temperature < self.max_temperature {
            next.temperature =
                (next.temperature + self.temperature_delta).min(self.max_temperature);
        }

        next.pressure = self.pressure_at(next.temperature);

        if next.pressure >= self.brew_pressure && next.coffee_volume < self.max_coffee_volume {
            next.coffee_volume += self.coffee_delta;
            next.phase = Phase::Brewing;
        }

        if next.coffee_volume >= self.max_coffee_volume {
            next.coffee_volume = self.max_coffee_volume;
            next.phase = Phase::Finished;
        }

        next
    }
}

impl Default for BrewModel {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}
