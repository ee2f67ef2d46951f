//! # Telemetry Lifecycle Controller
//!
//! Owns the applied enabled/disabled state and the active provider.
//!
//! ## State Machine
//!
//! ```text
//!             desired = true / configure_port
//!   Disabled ─────────────────────────────────▶ Enabled
//!      ▲                                           │
//!      └───────────────────────────────────────────┘
//!             desired = false / free_port
//! ```
//!
//! Transitions are evaluated by [`TelemetryController::check_state`] only,
//! and only while the configuration passed the gate at init. Each edge drives
//! exactly one acquire or release; repeated identical desired states do
//! nothing.
//!
//! [`TelemetryController::handle`] runs at a higher rate and re-evaluates the
//! desired state itself, so frame output stops the moment the vehicle
//! disarms or the switch flips, even before the port is released.
//!
//! ## Usage
//!
//! ```no_run
//! use fc_telemetry::config::Config;
//! use fc_telemetry::serial::HostSerialPorts;
//! use fc_telemetry::telemetry::{FrameEncoder, RcSwitchState, TelemetryController};
//! # struct Encoder;
//! # impl FrameEncoder for Encoder {
//! #     fn init(&mut self, _: &fc_telemetry::config::TelemetryConfig) {}
//! #     fn poll(&mut self, _input: &[u8]) -> Option<Vec<u8>> { None }
//! # }
//!
//! let config = Config::load("config/default.toml")?;
//! let mut ports = HostSerialPorts::new(&config.serial);
//! let mut flight = RcSwitchState::default();
//!
//! let mut telemetry = TelemetryController::init(
//!     &config.telemetry,
//!     Box::new(Encoder),
//!     &config.features,
//!     &mut ports,
//!     &flight,
//! );
//!
//! flight.armed = true;
//! telemetry.check_state(&flight, &mut ports);
//! telemetry.handle(&flight, &mut ports);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use tracing::info;

use super::gate::{can_use_telemetry_with_current_configuration, FeatureFlags};
use super::provider::{FrameEncoder, Provider};
use super::state::{determine_enabled_state, FlightStatus};
use crate::config::{ProviderKind, TelemetryConfig};
use crate::serial::{SerialFunction, SerialPorts};

/// Telemetry subsystem for one configuration
///
/// Construction binds the configuration and runs initialization, so every
/// entry point operates on an initialized subsystem. Applying a new
/// configuration means [`shutdown`](Self::shutdown) and a fresh
/// [`init`](Self::init).
#[derive(Debug)]
pub struct TelemetryController<'a> {
    config: &'a TelemetryConfig,
    provider: Provider,
    configuration_valid: bool,
    port_shared: bool,
    enabled: bool,
}

impl<'a> TelemetryController<'a> {
    /// Bind `config`, initialize the selected provider and apply the
    /// initial state
    ///
    /// Must run after the serial driver is initialized. `encoder` is the
    /// frame encoder for `config.provider`.
    pub fn init(
        config: &'a TelemetryConfig,
        encoder: Box<dyn FrameEncoder>,
        features: &dyn FeatureFlags,
        ports: &mut dyn SerialPorts,
        flight: &dyn FlightStatus,
    ) -> Self {
        let port_shared = ports.is_function_shared(SerialFunction::Telemetry, SerialFunction::Msp);
        let configuration_valid = can_use_telemetry_with_current_configuration(features, &*ports);

        let mut provider = Provider::new(config.provider, encoder);
        provider.init(config);

        info!(
            "Telemetry initialized: provider={:?}, port_shared={}, configuration_valid={}",
            config.provider, port_shared, configuration_valid
        );

        let mut controller = Self {
            config,
            provider,
            configuration_valid,
            port_shared,
            enabled: false,
        };
        controller.check_state(flight, ports);
        controller
    }

    /// Desired state for the current flight inputs
    pub fn determine_new_enabled_state(&self, flight: &dyn FlightStatus) -> bool {
        determine_enabled_state(self.port_shared, self.config.telemetry_switch, flight)
    }

    fn should_change_state_now(&self, new_state: bool) -> bool {
        new_state != self.enabled
    }

    /// Apply an enable/disable transition if the desired state changed
    ///
    /// Call at low or medium rate, e.g. once per control loop iteration.
    pub fn check_state(&mut self, flight: &dyn FlightStatus, ports: &mut dyn SerialPorts) {
        if !self.configuration_valid {
            return;
        }

        let new_state = self.determine_new_enabled_state(flight);
        if !self.should_change_state_now(new_state) {
            return;
        }

        if new_state {
            self.provider.configure_port(ports);
            info!("{:?} telemetry enabled", self.provider.kind());
        } else {
            self.provider.free_port(ports);
            info!("{:?} telemetry disabled", self.provider.kind());
        }

        self.enabled = new_state;
    }

    /// Service the active provider for this tick
    ///
    /// Safe to call every control loop iteration. Does not change the
    /// applied state.
    pub fn handle(&mut self, flight: &dyn FlightStatus, ports: &mut dyn SerialPorts) {
        if !self.configuration_valid || !self.determine_new_enabled_state(flight) {
            return;
        }

        self.provider.handle(ports);
    }

    /// Release the telemetry port if held, ending this configuration
    pub fn shutdown(mut self, ports: &mut dyn SerialPorts) {
        if self.enabled {
            self.provider.free_port(ports);
            self.enabled = false;
            info!("{:?} telemetry shut down", self.provider.kind());
        }
    }

    /// Line speed required by the active provider, 0 if unconstrained
    pub fn provider_baud_rate(&self) -> u32 {
        self.provider.baud_rate()
    }

    /// Provider selected by the bound configuration
    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    /// Last applied state
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the configuration passed the gate at init
    pub fn is_configuration_valid(&self) -> bool {
        self.configuration_valid
    }

    /// Whether the telemetry port is shared with MSP
    pub fn is_port_shared(&self) -> bool {
        self.port_shared
    }
}
