//! Harness configuration and backend selection.
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set via [`HarnessConfigBuilder`] methods
//! 2. **Environment variables**: values from `PIPELAB_*` env vars
//! 3. **Config file**: values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults**: built-in defaults from [`HarnessConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `PIPELAB_BACKEND` | `virtual` / `realtime` / `accelerated` | `backend` |
//! | `PIPELAB_STUCK_THRESHOLD` | `u64` | `lab.stuck_threshold` |
//! | `PIPELAB_MAX_DRAIN_TURNS` | `usize` | `lab.max_drain_turns` |
//! | `PIPELAB_CLOCK_RATE` | `u32` | `clock_rate` |
//!
//! An unknown backend name or an unparseable value is a [`ConfigError`],
//! reported before any test body runs.

use crate::lab::LabConfig;
use std::fmt;
use std::str::FromStr;

/// Environment variable name for the backend selector.
pub const ENV_BACKEND: &str = "PIPELAB_BACKEND";
/// Environment variable name for the stuck detector threshold.
pub const ENV_STUCK_THRESHOLD: &str = "PIPELAB_STUCK_THRESHOLD";
/// Environment variable name for the teardown drain budget.
pub const ENV_MAX_DRAIN_TURNS: &str = "PIPELAB_MAX_DRAIN_TURNS";
/// Environment variable name for the accelerated clock rate.
pub const ENV_CLOCK_RATE: &str = "PIPELAB_CLOCK_RATE";

/// Default rate of the accelerated wall clock, in virtual seconds per real second.
pub const DEFAULT_CLOCK_RATE: u32 = 10;

/// Errors raised while resolving the harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The backend selector named no known backend.
    #[error("unknown backend {0:?}: expected one of virtual, realtime, accelerated")]
    UnknownBackend(String),
    /// A setting was present but could not be used.
    #[error("invalid value for {name}: {reason}, got {value:?}")]
    InvalidValue {
        /// Setting name (env var or config key).
        name: String,
        /// The raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The config file could not be read or parsed.
    #[error("config file {path}: {message}")]
    File {
        /// Path of the file.
        path: String,
        /// Read or parse failure.
        message: String,
    },
}

impl ConfigError {
    fn invalid(name: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.to_owned(),
            value: value.to_owned(),
            reason: reason.into(),
        }
    }
}

/// The scheduling substrate a fixture runs its test body on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Backend {
    /// Virtual clock: timers fire by jumping time, steps are recorded.
    #[default]
    Virtual,
    /// Wall clock at real speed.
    Realtime,
    /// Wall clock running `clock_rate` times faster than real time.
    Accelerated,
}

impl Backend {
    /// Every backend, in selection order.
    pub const ALL: [Self; 3] = [Self::Virtual, Self::Realtime, Self::Accelerated];

    /// Returns the selector name of this backend.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Virtual => "virtual",
            Self::Realtime => "realtime",
            Self::Accelerated => "accelerated",
        }
    }

    /// Returns true if this backend records virtual time jumps.
    #[must_use]
    pub const fn records_steps(self) -> bool {
        matches!(self, Self::Virtual)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "virtual" => Ok(Self::Virtual),
            "realtime" => Ok(Self::Realtime),
            "accelerated" => Ok(Self::Accelerated),
            _ => Err(ConfigError::UnknownBackend(s.to_owned())),
        }
    }
}

/// Resolved configuration for one fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Backend to instantiate.
    pub backend: Backend,
    /// Virtual scheduler settings.
    pub lab: LabConfig,
    /// Accelerated clock rate (virtual seconds per real second).
    pub clock_rate: u32,
}

impl HarnessConfig {
    /// Creates the default configuration for `backend`.
    #[must_use]
    pub const fn new(backend: Backend) -> Self {
        Self {
            backend,
            lab: LabConfig::new(),
            clock_rate: DEFAULT_CLOCK_RATE,
        }
    }

    /// Starts a builder that layers env and file overrides.
    #[must_use]
    pub fn builder() -> HarnessConfigBuilder {
        HarnessConfigBuilder::default()
    }

    /// Resolves defaults overlaid with environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_rate == 0 {
            return Err(ConfigError::invalid("clock_rate", "0", "must be positive"));
        }
        if self.lab.max_drain_turns == 0 {
            return Err(ConfigError::invalid(
                "max_drain_turns",
                "0",
                "must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::new(Backend::default())
    }
}

/// Builder for [`HarnessConfig`].
#[derive(Debug, Clone, Default)]
pub struct HarnessConfigBuilder {
    backend: Option<Backend>,
    stuck_threshold: Option<u64>,
    max_drain_turns: Option<usize>,
    clock_rate: Option<u32>,
    skip_env: bool,
    #[cfg(feature = "config-file")]
    config_file: Option<std::path::PathBuf>,
}

impl HarnessConfigBuilder {
    /// Selects the backend.
    #[must_use]
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Sets the stuck detector threshold.
    #[must_use]
    pub fn stuck_threshold(mut self, turns: u64) -> Self {
        self.stuck_threshold = Some(turns);
        self
    }

    /// Sets the teardown drain budget.
    #[must_use]
    pub fn max_drain_turns(mut self, turns: usize) -> Self {
        self.max_drain_turns = Some(turns);
        self
    }

    /// Sets the accelerated clock rate.
    #[must_use]
    pub fn clock_rate(mut self, rate: u32) -> Self {
        self.clock_rate = Some(rate);
        self
    }

    /// Ignores `PIPELAB_*` environment variables.
    #[must_use]
    pub fn without_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Loads a TOML config file beneath env and programmatic settings.
    #[cfg(feature = "config-file")]
    #[must_use]
    pub fn config_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Resolves the final configuration.
    pub fn build(self) -> Result<HarnessConfig, ConfigError> {
        let mut config = HarnessConfig::default();
        self.apply_file(&mut config)?;
        if !self.skip_env {
            apply_env_overrides(&mut config)?;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(turns) = self.stuck_threshold {
            config.lab.stuck_threshold = turns;
        }
        if let Some(turns) = self.max_drain_turns {
            config.lab.max_drain_turns = turns;
        }
        if let Some(rate) = self.clock_rate {
            config.clock_rate = rate;
        }
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "config-file")]
    fn apply_file(&self, config: &mut HarnessConfig) -> Result<(), ConfigError> {
        if let Some(path) = &self.config_file {
            let file = parse_toml_file(path)?;
            apply_toml_config(config, &file)?;
        }
        Ok(())
    }

    #[cfg(not(feature = "config-file"))]
    #[allow(clippy::unused_self, clippy::unnecessary_wraps)]
    fn apply_file(&self, _config: &mut HarnessConfig) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Apply environment variable overrides to a [`HarnessConfig`].
///
/// Only variables that are set in the environment are applied.
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut HarnessConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_BACKEND) {
        config.backend = val.parse()?;
    }
    if let Some(val) = read_env(ENV_STUCK_THRESHOLD) {
        config.lab.stuck_threshold = parse_u64(ENV_STUCK_THRESHOLD, &val)?;
    }
    if let Some(val) = read_env(ENV_MAX_DRAIN_TURNS) {
        config.lab.max_drain_turns = parse_usize(ENV_MAX_DRAIN_TURNS, &val)?;
    }
    if let Some(val) = read_env(ENV_CLOCK_RATE) {
        config.clock_rate = parse_u32(ENV_CLOCK_RATE, &val)?;
    }
    Ok(())
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_u64(var_name: &str, val: &str) -> Result<u64, ConfigError> {
    val.trim().parse::<u64>().map_err(|e| {
        ConfigError::invalid(var_name, val, format!("expected unsigned integer ({e})"))
    })
}

fn parse_usize(var_name: &str, val: &str) -> Result<usize, ConfigError> {
    val.trim().parse::<usize>().map_err(|e| {
        ConfigError::invalid(var_name, val, format!("expected unsigned integer ({e})"))
    })
}

fn parse_u32(var_name: &str, val: &str) -> Result<u32, ConfigError> {
    val.trim()
        .parse::<u32>()
        .map_err(|e| ConfigError::invalid(var_name, val, format!("expected u32 ({e})")))
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable harness configuration.
///
/// ```toml
/// [harness]
/// backend = "accelerated"
/// clock_rate = 20
///
/// [lab]
/// stuck_threshold = 100
/// max_drain_turns = 100000
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct HarnessTomlConfig {
    /// Backend selection settings.
    #[serde(default)]
    pub harness: HarnessToml,
    /// Virtual scheduler settings.
    #[serde(default)]
    pub lab: LabToml,
}

/// Harness section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct HarnessToml {
    /// Backend name.
    pub backend: Option<String>,
    /// Accelerated clock rate.
    pub clock_rate: Option<u32>,
}

/// Lab section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct LabToml {
    /// Stuck detector threshold.
    pub stuck_threshold: Option<u64>,
    /// Teardown drain budget.
    pub max_drain_turns: Option<usize>,
}

/// Apply a parsed TOML config to a [`HarnessConfig`].
///
/// Only fields that are `Some` in the TOML struct override the config.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(
    config: &mut HarnessConfig,
    toml: &HarnessTomlConfig,
) -> Result<(), ConfigError> {
    if let Some(ref name) = toml.harness.backend {
        config.backend = name.parse()?;
    }
    if let Some(v) = toml.harness.clock_rate {
        config.clock_rate = v;
    }
    if let Some(v) = toml.lab.stuck_threshold {
        config.lab.stuck_threshold = v;
    }
    if let Some(v) = toml.lab.max_drain_turns {
        config.lab.max_drain_turns = v;
    }
    Ok(())
}

/// Parse a TOML string into a [`HarnessTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<HarnessTomlConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::File {
        path: "<inline>".to_owned(),
        message: e.to_string(),
    })
}

/// Read and parse a TOML file into a [`HarnessTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<HarnessTomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::File {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
