//! Effective configuration of a `syncpulse` invocation
//!
//! Sources, later ones winning:
//!
//! 1. Built-in defaults
//! 2. YAML file (`--config`, else `syncpulse.yaml` / `syncpulse.yml` in the
//!    working directory)
//! 3. Environment variables (`SYNCPULSE_*`)
//! 4. Command-line flags
//!
//! Durations are written either as plain seconds (`1.5`) or as humantime
//! strings (`250ms`, `1m 30s`).

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use syncpulse_core::{Line, PulseConfig, SyncError, SyncResult};
use syncpulse_device::DeviceConfig;
use syncpulse_time::{HybridWait, WaitMode};

use crate::error::{CliError, CliResult};

/// Files tried when no `--config` is given
const DEFAULT_LOCATIONS: &[&str] = &["syncpulse.yaml", "syncpulse.yml"];

/// Prefix of the environment overrides
const ENV_PREFIX: &str = "SYNCPULSE_";

/// Flat configuration, one key per option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// High time of each pulse
    #[serde(with = "seconds")]
    pub pulse_duration: Duration,

    /// Low time after each pulse
    #[serde(with = "seconds")]
    pub inter_pulse_gap: Duration,

    pub pulse_count: u32,

    /// Serial port of the controller
    pub port: String,

    pub baud_rate: u32,

    /// How long a read waits for an answer
    #[serde(with = "seconds")]
    pub read_timeout: Duration,

    /// Line carrying the pulses (1-8)
    pub output_line: u8,

    /// Line being monitored (1-8)
    pub input_line: u8,

    /// Bytes requested per input read
    pub read_size: usize,

    /// Ping the controller right after opening the port
    pub ping_on_open: bool,

    /// Wait strategy: `spin` or `hybrid`
    pub wait: String,

    /// Final stretch spun by the hybrid strategy
    #[serde(with = "seconds")]
    pub spin_window: Duration,

    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let pulse = PulseConfig::default();
        let device = DeviceConfig::default();
        Config {
            pulse_duration: pulse.pulse_duration,
            inter_pulse_gap: pulse.inter_pulse_gap,
            pulse_count: pulse.pulse_count,
            port: device.port,
            baud_rate: device.baud_rate,
            read_timeout: device.read_timeout,
            output_line: pulse.output_line.number(),
            input_line: pulse.input_line.number(),
            read_size: syncpulse_runtime::DEFAULT_READ_SIZE,
            ping_on_open: device.ping_on_open,
            wait: WaitMode::default().name().to_string(),
            spin_window: HybridWait::default().spin_window,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load defaults, the YAML file and the environment
    ///
    /// An explicitly given file must exist; the default locations are
    /// skipped when absent.
    pub fn load(config_path: Option<&Path>) -> CliResult<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => match DEFAULT_LOCATIONS.iter().map(Path::new).find(|p| p.exists()) {
                Some(path) => Self::from_file(path)?,
                None => Config::default(),
            },
        };

        config.apply_env_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Parse one YAML file on top of the defaults
    pub fn from_file(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&content).map_err(|source| CliError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "configuration file loaded");
        Ok(config)
    }

    /// Parse YAML text; missing keys keep their defaults
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(content)
    }

    /// Apply `SYNCPULSE_<KEY>` overrides found through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> SyncResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            let name = format!("{}{}", ENV_PREFIX, key);
            lookup(&name).map(|value| (name, value))
        };

        if let Some((name, val)) = get("PULSE_DURATION") {
            self.pulse_duration = env_value(&name, &val, parse_seconds)?;
        }
        if let Some((name, val)) = get("INTER_PULSE_GAP") {
            self.inter_pulse_gap = env_value(&name, &val, parse_seconds)?;
        }
        if let Some((name, val)) = get("PULSE_COUNT") {
            self.pulse_count = env_value(&name, &val, |v| v.parse().map_err(|e| format!("{}", e)))?;
        }
        if let Some((_, val)) = get("PORT") {
            self.port = val;
        }
        if let Some((name, val)) = get("BAUD_RATE") {
            self.baud_rate = env_value(&name, &val, |v| v.parse().map_err(|e| format!("{}", e)))?;
        }
        if let Some((name, val)) = get("READ_TIMEOUT") {
            self.read_timeout = env_value(&name, &val, parse_seconds)?;
        }
        if let Some((name, val)) = get("OUTPUT_LINE") {
            self.output_line = env_value(&name, &val, |v| v.parse().map_err(|e| format!("{}", e)))?;
        }
        if let Some((name, val)) = get("INPUT_LINE") {
            self.input_line = env_value(&name, &val, |v| v.parse().map_err(|e| format!("{}", e)))?;
        }
        if let Some((name, val)) = get("READ_SIZE") {
            self.read_size = env_value(&name, &val, |v| v.parse().map_err(|e| format!("{}", e)))?;
        }
        if let Some((_, val)) = get("PING_ON_OPEN") {
            self.ping_on_open = val.eq_ignore_ascii_case("true") || val == "1";
        }
        if let Some((_, val)) = get("WAIT") {
            self.wait = val;
        }
        if let Some((name, val)) = get("SPIN_WINDOW") {
            self.spin_window = env_value(&name, &val, parse_seconds)?;
        }
        if let Some((_, val)) = get("LOG_LEVEL") {
            self.log_level = val;
        }
        Ok(())
    }

    /// Pulse train parameters, validated
    pub fn to_pulse_config(&self) -> SyncResult<PulseConfig> {
        let config = PulseConfig::new(self.pulse_duration, self.inter_pulse_gap, self.pulse_count)
            .with_lines(Line::new(self.output_line)?, Line::new(self.input_line)?);
        config.validate()?;
        Ok(config)
    }

    /// Serial parameters, validated
    pub fn to_device_config(&self) -> SyncResult<DeviceConfig> {
        let config = DeviceConfig {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            read_timeout: self.read_timeout,
            ping_on_open: self.ping_on_open,
            return_mode: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Wait strategy, with the configured spin window for `hybrid`
    pub fn wait_mode(&self) -> SyncResult<WaitMode> {
        match self.wait.parse::<WaitMode>()? {
            WaitMode::Hybrid(hybrid) => Ok(WaitMode::Hybrid(HybridWait {
                spin_window: self.spin_window,
                ..hybrid
            })),
            spin => Ok(spin),
        }
    }

    pub fn input_line(&self) -> SyncResult<Line> {
        Line::new(self.input_line)
    }

    /// Check every section without touching the device
    pub fn validate(&self) -> SyncResult<()> {
        self.to_pulse_config()?;
        self.to_device_config()?;
        self.wait_mode()?;
        if self.read_size == 0 {
            return Err(SyncError::Config("read_size must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Parse a duration given as plain seconds or as a humantime string
pub fn parse_seconds(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<f64>() {
        if !secs.is_finite() || secs < 0.0 {
            return Err(format!("'{}' is not a non-negative number of seconds", value));
        }
        return Ok(Duration::from_secs_f64(secs));
    }
    humantime::parse_duration(value).map_err(|e| format!("'{}': {}", value, e))
}

fn env_value<T, F>(name: &str, value: &str, parse: F) -> SyncResult<T>
where
    F: FnOnce(&str) -> Result<T, String>,
{
    parse(value).map_err(|e| SyncError::Config(format!("{}: {}", name, e)))
}

/// Serde adapter: durations as seconds, accepting humantime strings on input
mod seconds {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Number(secs) if secs.is_finite() && secs >= 0.0 => Ok(Duration::from_secs_f64(secs)),
            Raw::Number(secs) => Err(de::Error::custom(format!(
                "{} is not a non-negative number of seconds",
                secs
            ))),
            Raw::Text(text) => super::parse_seconds(&text).map_err(de::Error::custom),
        }
    }
}
