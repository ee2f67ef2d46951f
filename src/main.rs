//! # FC Telemetry Bench
//!
//! Runs the telemetry lifecycle against host UARTs.
//!
//! The bench stands in for the flight-control loop. It owns the serial port
//! map and a simulated arm state, services telemetry at 100Hz and checks for
//! state changes at 10Hz. Toggling the armed flag every few seconds exercises
//! hand-over of a port shared between MSP and telemetry.
//!
//! ```bash
//! cargo run --release -- config/default.toml
//! ```

use anyhow::{Context, Result};
use tokio::time::{interval, Duration};
use tracing::{info, warn};

use fc_telemetry::config::{Config, TelemetryConfig};
use fc_telemetry::serial::{HostSerialPorts, PortMode, SerialFunction, SerialPorts};
use fc_telemetry::telemetry::{FrameEncoder, RcSwitchState, TelemetryController};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Rate at which the active provider is serviced
const HANDLE_RATE_HZ: u64 = 100;

/// Rate at which enable/disable transitions are evaluated
const CHECK_RATE_HZ: u64 = 10;

/// Simulated arm/disarm period
const ARM_TOGGLE_SECS: u64 = 10;

/// Encoder placeholder: protocol encoders are linked by the firmware image,
/// the bench only exercises port ownership.
struct IdleEncoder;

impl FrameEncoder for IdleEncoder {
    fn init(&mut self, _config: &TelemetryConfig) {}

    fn poll(&mut self, _input: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("FC Telemetry v{} starting...", env!("CARGO_PKG_VERSION"));

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&path).with_context(|| format!("loading {}", path))?;

    let mut ports = HostSerialPorts::new(&config.serial);

    // MSP holds its port from boot; telemetry borrows it when shared
    if ports.open(SerialFunction::Msp, 0, PortMode::RxTx, false).is_none() {
        match ports.device_for(SerialFunction::Msp) {
            Ok(device) => warn!("MSP port {} not available, continuing without it", device),
            Err(e) => info!("{}, continuing without MSP", e),
        }
    }

    let mut flight = RcSwitchState::default();
    let mut telemetry = TelemetryController::init(
        &config.telemetry,
        Box::new(IdleEncoder),
        &config.features,
        &mut ports,
        &flight,
    );

    let mut handle_interval = interval(Duration::from_millis(1000 / HANDLE_RATE_HZ));
    let mut check_interval = interval(Duration::from_millis(1000 / CHECK_RATE_HZ));
    let mut arm_interval = interval(Duration::from_secs(ARM_TOGGLE_SECS));
    // First tick completes immediately; start disarmed
    arm_interval.tick().await;

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = handle_interval.tick() => {
                telemetry.handle(&flight, &mut ports);
            }

            _ = check_interval.tick() => {
                telemetry.check_state(&flight, &mut ports);
            }

            _ = arm_interval.tick() => {
                flight.armed = !flight.armed;
                info!("Simulated {}", if flight.armed { "arm" } else { "disarm" });
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    telemetry.shutdown(&mut ports);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_constants() {
        assert_eq!(1000 / HANDLE_RATE_HZ, 10, "handle period should be 10ms");
        assert_eq!(1000 / CHECK_RATE_HZ, 100, "check period should be 100ms");
        assert!(CHECK_RATE_HZ < HANDLE_RATE_HZ);
    }

    #[test]
    fn test_idle_encoder_emits_nothing() {
        let mut encoder = IdleEncoder;
        assert!(encoder.poll(&[0x80, 0x8d]).is_none());
    }

    #[test]
    fn test_default_config_file_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let config = Config::load(path).unwrap();
        assert!(config.features.telemetry);
        let ports = HostSerialPorts::new(&config.serial);
        assert!(ports.is_function_shared(SerialFunction::Telemetry, SerialFunction::Msp));
        assert_eq!(ports.device_for(SerialFunction::Msp).unwrap(), "/dev/ttyUSB0");
    }
}
