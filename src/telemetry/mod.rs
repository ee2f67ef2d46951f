//! # Telemetry Module
//!
//! Decides when telemetry runs and which provider owns the telemetry port.
//!
//! This module handles:
//! - Gating telemetry on the feature flag and port availability (once per configuration)
//! - Computing the desired enabled state from port sharing, arm state and the telemetry switch
//! - Acquiring and releasing the shared port exactly once per state change
//! - Dispatching per-tick work to the selected FrSky, HoTT or MSP provider
//!
//! The controller is single-threaded by construction: every entry point
//! takes `&mut self`, so a host that runs it from several tasks has to give
//! it one owner.

pub mod controller;
pub mod gate;
pub mod provider;
pub mod state;

pub use controller::TelemetryController;
pub use gate::{can_use_telemetry_with_current_configuration, Feature, FeatureFlags};
pub use provider::{FrameEncoder, Provider, FRSKY_BAUD_RATE, HOTT_BAUD_RATE};
pub use state::{determine_enabled_state, FlightStatus, RcSwitchState, TELEMETRY_SWITCH_INDEX};
