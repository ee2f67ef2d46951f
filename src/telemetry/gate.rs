//! # Configuration Gate
//!
//! One-shot check of whether telemetry can run at all under the current
//! feature flags and port mapping. The answer cannot change without a
//! configuration reload, so the controller asks once and caches it.

use tracing::warn;

use crate::serial::{SerialFunction, SerialPorts};

/// Optional firmware features
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Telemetry,
}

/// Feature flag collaborator
#[cfg_attr(test, mockall::automock)]
pub trait FeatureFlags {
    fn is_enabled(&self, feature: Feature) -> bool;
}

/// Whether telemetry is runnable with the current configuration
///
/// False if the telemetry feature is off or no port can be opened for the
/// telemetry function.
pub fn can_use_telemetry_with_current_configuration(
    features: &dyn FeatureFlags,
    ports: &dyn SerialPorts,
) -> bool {
    if !features.is_enabled(Feature::Telemetry) {
        warn!("Telemetry feature disabled");
        return false;
    }

    if !ports.can_open(SerialFunction::Telemetry) {
        warn!("No serial port available for telemetry");
        return false;
    }

    true
}
