//! Configuration loading and typed config structures for the brew simulator.
//!
//! The canonical configuration lives in `moka-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, a loader that applies environment overrides, and a
//! validator that rejects configurations the simulator cannot run with.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the nominal model. The broker endpoint is the one value without a
//! usable default and must be supplied before the engine will start.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but cannot be used.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },

    /// An environment override could not be parsed.
    #[error("invalid environment variable {name}: {reason}")]
    Env {
        /// The offending variable.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `moka-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MokaConfig {
    /// Brew model parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// MQTT transport settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Observer HTTP server settings.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MokaConfig {
    /// Load configuration for the engine.
    ///
    /// Reads the YAML file at `path` if it exists (defaults otherwise),
    /// then applies environment overrides:
    /// - `MQTT_BROKER_URL` overrides `transport.broker_url`
    /// - `MQTT_USERNAME` / `MQTT_PASSWORD` override the credentials
    /// - `MQTT_CLIENT_ID` overrides `transport.client_id`
    /// - `MQTT_TOPIC_PREFIX` overrides `transport.topic_prefix`
    /// - `OBSERVER_PORT` overrides `observer.port`
    ///
    /// The result is not validated; call [`validate`](Self::validate).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file exists but cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Env`] if an override is malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Read configuration from a YAML file without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply environment variable overrides to transport and observer settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if `OBSERVER_PORT` is not a valid port.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.transport.apply_env_overrides();
        if let Ok(val) = std::env::var("OBSERVER_PORT") {
            self.observer.port = val.parse().map_err(|e| ConfigError::Env {
                name: "OBSERVER_PORT",
                reason: format!("{e}"),
            })?;
        }
        Ok(())
    }

    /// Check the whole configuration before anything is started.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;
        self.transport.validate()
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Brew model parameters.
///
/// The defaults reproduce the nominal pot: a 20 second ramp sampled every
/// 200 ms, water heated from 20 to 95 degrees, and pressure rising
/// linearly from 50 degrees over a 30 degree span.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Wall-clock period between ticks, in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u32,

    /// Nominal wall-clock duration of the full ramp, in milliseconds.
    #[serde(default = "default_ramp_ms")]
    pub ramp_ms: u32,

    /// Cold-start water temperature in degrees Celsius.
    #[serde(default = "default_ambient_temperature")]
    pub ambient_temperature: f64,

    /// Temperature ceiling in degrees Celsius.
    #[serde(default = "default_max_temperature")]
    pub max_temperature: f64,

    /// Temperature at which pressure starts to build.
    #[serde(default = "default_pressure_onset_temperature")]
    pub pressure_onset_temperature: f64,

    /// Degrees above the onset needed for one bar of pressure.
    #[serde(default = "default_pressure_span")]
    pub pressure_span: f64,

    /// Pressure ceiling in bar.
    #[serde(default = "default_max_pressure")]
    pub max_pressure: f64,

    /// Pressure at which coffee starts to flow.
    #[serde(default = "default_brew_pressure")]
    pub brew_pressure: f64,

    /// Volume at which the brew is finished, in percent.
    #[serde(default = "default_max_coffee_volume")]
    pub max_coffee_volume: f64,
}

impl SimulationConfig {
    /// Number of ticks in the nominal ramp.
    pub fn total_ticks(&self) -> f64 {
        f64::from(self.ramp_ms) / f64::from(self.tick_ms)
    }

    /// Reject parameters that would break the model's invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_owned(),
            })
        };

        if self.tick_ms == 0 {
            return invalid("simulation.tick_ms must be at least 1");
        }
        if self.ramp_ms < self.tick_ms {
            return invalid("simulation.ramp_ms must be at least one tick");
        }
        let values = [
            self.ambient_temperature,
            self.max_temperature,
            self.pressure_onset_temperature,
            self.pressure_span,
            self.max_pressure,
            self.brew_pressure,
            self.max_coffee_volume,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return invalid("simulation parameters must be finite numbers");
        }
        if self.max_temperature <= self.ambient_temperature {
            return invalid("simulation.max_temperature must exceed ambient_temperature");
        }
        if self.pressure_span <= 0.0 {
            return invalid("simulation.pressure_span must be positive");
        }
        if self.max_pressure <= 0.0 {
            return invalid("simulation.max_pressure must be positive");
        }
        if self.brew_pressure <= 0.0 || self.brew_pressure > self.max_pressure {
            return invalid("simulation.brew_pressure must be in (0, max_pressure]");
        }
        if self.max_coffee_volume <= 0.0 {
            return invalid("simulation.max_coffee_volume must be positive");
        }
        if self.ambient_temperature > self.pressure_onset_temperature {
            return invalid("simulation.ambient_temperature must not exceed the pressure onset");
        }
        let peak_pressure = ((self.max_temperature - self.pressure_onset_temperature)
            / self.pressure_span)
            .clamp(0.0, self.max_pressure);
        if peak_pressure < self.brew_pressure {
            return invalid("simulation.max_temperature is too low to reach brew_pressure");
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            ramp_ms: default_ramp_ms(),
            ambient_temperature: default_ambient_temperature(),
            max_temperature: default_max_temperature(),
            pressure_onset_temperature: default_pressure_onset_temperature(),
            pressure_span: default_pressure_span(),
            max_pressure: default_max_pressure(),
            brew_pressure: default_brew_pressure(),
            max_coffee_volume: default_max_coffee_volume(),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// MQTT broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransportConfig {
    /// Broker URL (`mqtt://`, `mqtts://`, `ws://` or `wss://`). Required.
    #[serde(default)]
    pub broker_url: Option<String>,

    /// Broker username. Must be set together with `password`.
    #[serde(default)]
    pub username: Option<String>,

    /// Broker password. Must be set together with `username`.
    #[serde(default)]
    pub password: Option<String>,

    /// MQTT client identifier.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Append a random suffix to `client_id` so several processes can
    /// share one broker.
    #[serde(default)]
    pub unique_client_id: bool,

    /// Prefix prepended to every state and control topic. Empty by default.
    #[serde(default)]
    pub topic_prefix: String,

    /// Whether to subscribe to the control channel.
    #[serde(default = "default_true")]
    pub control_enabled: bool,

    /// MQTT keep-alive interval in seconds.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Request a clean session on connect.
    #[serde(default)]
    pub clean_session: bool,

    /// Delay before retrying after a connection error, in milliseconds.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Capacity of the client's outgoing request queue.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl TransportConfig {
    /// Override broker settings with environment variables when set.
    ///
    /// This allows any deployment to supply credentials without
    /// modifying the YAML config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MQTT_BROKER_URL") {
            self.broker_url = Some(val);
        }
        if let Ok(val) = std::env::var("MQTT_USERNAME") {
            self.username = Some(val);
        }
        if let Ok(val) = std::env::var("MQTT_PASSWORD") {
            self.password = Some(val);
        }
        if let Ok(val) = std::env::var("MQTT_CLIENT_ID") {
            self.client_id = val;
        }
        if let Ok(val) = std::env::var("MQTT_TOPIC_PREFIX") {
            self.topic_prefix = val;
        }
    }

    /// Require a broker endpoint and consistent credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_owned(),
            })
        };

        match self.broker_url.as_deref().map(str::trim) {
            None | Some("") => {
                return invalid("transport.broker_url is required (or set MQTT_BROKER_URL)");
            }
            Some(_) => {}
        }
        if self.username.is_some() != self.password.is_some() {
            return invalid("transport.username and transport.password must be set together");
        }
        if self.client_id.trim().is_empty() {
            return invalid("transport.client_id must not be empty");
        }
        if self.channel_capacity == 0 {
            return invalid("transport.channel_capacity must be at least 1");
        }
        Ok(())
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            broker_url: None,
            username: None,
            password: None,
            client_id: default_client_id(),
            unique_client_id: false,
            topic_prefix: String::new(),
            control_enabled: true,
            keep_alive_secs: default_keep_alive_secs(),
            clean_session: false,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Observer HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Address to bind to.
    #[serde(default = "default_observer_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_observer_port")]
    pub port: u16,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            host: default_observer_host(),
            port: default_observer_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_tick_ms() -> u32 {
    200
}

const fn default_ramp_ms() -> u32 {
    20_000
}

const fn default_ambient_temperature() -> f64 {
    20.0
}

const fn default_max_temperature() -> f64 {
    95.0
}

const fn default_pressure_onset_temperature() -> f64 {
    50.0
}

const fn default_pressure_span() -> f64 {
    30.0
}

const fn default_max_pressure() -> f64 {
    1.5
}

const fn default_brew_pressure() -> f64 {
    1.0
}

const fn default_max_coffee_volume() -> f64 {
    100.0
}

fn default_client_id() -> String {
    "moka-simulator".to_owned()
}

const fn default_keep_alive_secs() -> u64 {
    30
}

const fn default_reconnect_delay_ms() -> u64 {
    1000
}

const fn default_channel_capacity() -> usize {
    64
}

fn default_observer_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}
