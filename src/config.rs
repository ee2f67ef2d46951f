//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! The telemetry core only ever borrows the loaded [`TelemetryConfig`];
//! everything that could make a record unusable (unknown provider, a
//! function mapped to two ports, out-of-range settings) is rejected here.

use serde::de::Error;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{Result, TelemetryError};
use crate::serial::SerialFunction;
use crate::telemetry::{Feature, FeatureFlags};

/// Baud rates the serial driver accepts for a port
pub const SUPPORTED_BAUD_RATES: [u32; 7] = [9600, 19200, 38400, 57600, 115200, 230400, 250000];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub features: FeatureConfig,
    pub telemetry: TelemetryConfig,
    pub serial: SerialConfig,
}

/// Feature switches
#[derive(Debug, Deserialize, Clone)]
pub struct FeatureConfig {
    #[serde(default = "default_telemetry_feature")]
    pub telemetry: bool,
}

/// Telemetry provider selected for the telemetry port
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    FrSky,
    Hott,
    Msp,
}

/// Telemetry configuration record
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    /// Enable telemetry on a shared port from an RC switch instead of arm state
    #[serde(default)]
    pub telemetry_switch: bool,

    /// Invert the telemetry line (FrSky receivers expect inverted serial)
    #[serde(default)]
    pub inversion: bool,

    #[serde(default)]
    pub frsky: FrSkyConfig,

    #[serde(default)]
    pub hott: HottConfig,
}

/// FrSky coordinate encoding
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateFormat {
    Dms,
    Nmea,
}

/// FrSky unit system
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    Metric,
    Imperial,
}

/// FrSky-specific settings, opaque to the lifecycle core
#[derive(Debug, Deserialize, Clone)]
pub struct FrSkyConfig {
    #[serde(default)]
    pub gps_no_fix_latitude: f64,

    #[serde(default)]
    pub gps_no_fix_longitude: f64,

    #[serde(default = "default_coordinate_format")]
    pub coordinate_format: CoordinateFormat,

    #[serde(default = "default_unit")]
    pub unit: UnitSystem,
}

/// HoTT-specific settings, opaque to the lifecycle core
#[derive(Debug, Deserialize, Clone)]
pub struct HottConfig {
    #[serde(default = "default_alarm_sound_interval_s")]
    pub alarm_sound_interval_s: u8,
}

/// Serial port mapping
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub ports: Vec<PortConfig>,
}

/// One physical port and the functions mapped onto it
#[derive(Debug, Deserialize, Clone)]
pub struct PortConfig {
    pub device: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default)]
    pub functions: Vec<SerialFunction>,
}

// Default value functions
fn default_telemetry_feature() -> bool { true }

fn default_provider() -> ProviderKind { ProviderKind::FrSky }
fn default_coordinate_format() -> CoordinateFormat { CoordinateFormat::Dms }
fn default_unit() -> UnitSystem { UnitSystem::Metric }
fn default_alarm_sound_interval_s() -> u8 { 5 }

fn default_timeout_ms() -> u64 { 10 }
fn default_baud_rate() -> u32 { 115200 }

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { telemetry: default_telemetry_feature() }
    }
}

impl Default for FrSkyConfig {
    fn default() -> Self {
        Self {
            gps_no_fix_latitude: 0.0,
            gps_no_fix_longitude: 0.0,
            coordinate_format: default_coordinate_format(),
            unit: default_unit(),
        }
    }
}

impl Default for HottConfig {
    fn default() -> Self {
        Self { alarm_sound_interval_s: default_alarm_sound_interval_s() }
    }
}

impl FeatureFlags for FeatureConfig {
    fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Telemetry => self.telemetry,
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> TelemetryError {
    TelemetryError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails (including an unknown telemetry provider)
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fc_telemetry::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        let mut assigned = HashSet::new();
        for port in &self.serial.ports {
            if port.device.is_empty() {
                return Err(invalid("serial port device cannot be empty"));
            }

            if !SUPPORTED_BAUD_RATES.contains(&port.baud_rate) {
                return Err(invalid(format!(
                    "baud_rate {} on {} must be one of: {:?}",
                    port.baud_rate, port.device, SUPPORTED_BAUD_RATES
                )));
            }

            // One owning port per function
            for function in &port.functions {
                if !assigned.insert(*function) {
                    return Err(invalid(format!(
                        "function {:?} is assigned to more than one serial port",
                        function
                    )));
                }
            }
        }

        let frsky = &self.telemetry.frsky;
        if !(-90.0..=90.0).contains(&frsky.gps_no_fix_latitude) {
            return Err(invalid("gps_no_fix_latitude must be between -90 and 90"));
        }

        if !(-180.0..=180.0).contains(&frsky.gps_no_fix_longitude) {
            return Err(invalid("gps_no_fix_longitude must be between -180 and 180"));
        }

        if self.telemetry.hott.alarm_sound_interval_s > 120 {
            return Err(invalid("alarm_sound_interval_s must be at most 120"));
        }

        Ok(())
    }
}
