//! # Telemetry Providers
//!
//! The closed set of telemetry protocols that can own the telemetry port.
//!
//! Each provider manages its claim on the serial port and drives an external
//! [`FrameEncoder`] that builds the protocol's frames. Exactly one provider
//! exists per configuration; [`Provider`] dispatches to it with exhaustive
//! matches, so no other protocol's code can run.

use tracing::{debug, info, warn};

use crate::config::{ProviderKind, TelemetryConfig};
use crate::serial::{PortHandle, PortMode, SerialFunction, SerialPorts};

/// FrSky hub telemetry line speed
pub const FRSKY_BAUD_RATE: u32 = 9600;

/// Graupner HoTT line speed
pub const HOTT_BAUD_RATE: u32 = 19_200;

/// Protocol frame encoder linked in for the selected provider
pub trait FrameEncoder {
    /// One-time protocol setup
    fn init(&mut self, config: &TelemetryConfig);

    /// Frame due on this tick, if any
    ///
    /// `input` holds the bytes received since the last poll. It is always
    /// empty for one-way providers.
    fn poll(&mut self, input: &[u8]) -> Option<Vec<u8>>;
}

/// Largest chunk of received input passed to the encoder per tick
const INPUT_CHUNK: usize = 64;

/// Provider-owned claim on the telemetry function's port
#[derive(Debug, Default)]
struct TelemetryPort {
    handle: Option<PortHandle>,
}

impl TelemetryPort {
    fn open(&mut self, ports: &mut dyn SerialPorts, baud_rate: u32, mode: PortMode, inverted: bool) {
        if self.handle.is_some() {
            warn!("Telemetry port already open");
            return;
        }

        self.handle = ports.open(SerialFunction::Telemetry, baud_rate, mode, inverted);
        if self.handle.is_none() {
            warn!("Failed to open telemetry port at {} baud", baud_rate);
        }
    }

    fn close(&mut self, ports: &mut dyn SerialPorts) {
        if let Some(handle) = self.handle.take() {
            ports.close(handle);
        }
    }
}

/// Poll the encoder and write any due frame to `handle`
///
/// With `read_input` set, bytes waiting on the port are handed to the encoder.
fn service(
    encoder: &mut dyn FrameEncoder,
    ports: &mut dyn SerialPorts,
    handle: Option<PortHandle>,
    read_input: bool,
) {
    let Some(handle) = handle else {
        return;
    };

    let mut buf = [0u8; INPUT_CHUNK];
    let received = if read_input {
        ports.read(handle, &mut buf).unwrap_or_else(|e| {
            debug!("Failed to read telemetry input: {}", e);
            0
        })
    } else {
        0
    };

    if let Some(frame) = encoder.poll(&buf[..received]) {
        if let Err(e) = ports.write(handle, &frame) {
            debug!("Failed to send telemetry frame: {}", e);
        }
    }
}

/// FrSky hub telemetry (one-way, TX only)
pub struct FrSkyTelemetry {
    encoder: Box<dyn FrameEncoder>,
    port: TelemetryPort,
    inverted: bool,
}

impl FrSkyTelemetry {
    pub fn new(encoder: Box<dyn FrameEncoder>) -> Self {
        Self {
            encoder,
            port: TelemetryPort::default(),
            inverted: false,
        }
    }

    fn init(&mut self, config: &TelemetryConfig) {
        self.inverted = config.inversion;
        self.encoder.init(config);
    }

    fn configure_port(&mut self, ports: &mut dyn SerialPorts) {
        self.port.open(ports, FRSKY_BAUD_RATE, PortMode::Tx, self.inverted);
    }

    fn free_port(&mut self, ports: &mut dyn SerialPorts) {
        self.port.close(ports);
    }

    fn handle(&mut self, ports: &mut dyn SerialPorts) {
        service(self.encoder.as_mut(), ports, self.port.handle, false);
    }
}

/// Graupner HoTT telemetry (request/response, RX and TX)
pub struct HottTelemetry {
    encoder: Box<dyn FrameEncoder>,
    port: TelemetryPort,
    inverted: bool,
}

impl HottTelemetry {
    pub fn new(encoder: Box<dyn FrameEncoder>) -> Self {
        Self {
            encoder,
            port: TelemetryPort::default(),
            inverted: false,
        }
    }

    fn init(&mut self, config: &TelemetryConfig) {
        self.inverted = config.inversion;
        self.encoder.init(config);
    }

    fn configure_port(&mut self, ports: &mut dyn SerialPorts) {
        self.port.open(ports, HOTT_BAUD_RATE, PortMode::RxTx, self.inverted);
    }

    fn free_port(&mut self, ports: &mut dyn SerialPorts) {
        self.port.close(ports);
    }

    /// Feed received requests to the encoder and send its reply
    fn handle(&mut self, ports: &mut dyn SerialPorts) {
        service(self.encoder.as_mut(), ports, self.port.handle, true);
    }
}

/// MSP telemetry pushed over the already-open MSP port
///
/// Never opens or closes a port and does not constrain its baud rate.
/// Configuring attaches to the MSP function's claim, freeing detaches.
pub struct MspTelemetry {
    encoder: Box<dyn FrameEncoder>,
    attached: Option<PortHandle>,
}

impl MspTelemetry {
    pub fn new(encoder: Box<dyn FrameEncoder>) -> Self {
        Self {
            encoder,
            attached: None,
        }
    }

    fn init(&mut self, config: &TelemetryConfig) {
        self.encoder.init(config);
    }

    fn configure_port(&mut self, ports: &mut dyn SerialPorts) {
        self.attached = ports.find_open(SerialFunction::Msp);
        if self.attached.is_none() {
            warn!("MSP port not open, MSP telemetry has nowhere to write");
        }
    }

    fn free_port(&mut self) {
        self.attached = None;
    }

    // MSP input belongs to the command processor
    fn handle(&mut self, ports: &mut dyn SerialPorts) {
        service(self.encoder.as_mut(), ports, self.attached, false);
    }
}

/// The active telemetry provider
pub enum Provider {
    FrSky(FrSkyTelemetry),
    Hott(HottTelemetry),
    Msp(MspTelemetry),
}

impl Provider {
    /// Provider for `kind`, driving `encoder`
    pub fn new(kind: ProviderKind, encoder: Box<dyn FrameEncoder>) -> Self {
        match kind {
            ProviderKind::FrSky => Provider::FrSky(FrSkyTelemetry::new(encoder)),
            ProviderKind::Hott => Provider::Hott(HottTelemetry::new(encoder)),
            ProviderKind::Msp => Provider::Msp(MspTelemetry::new(encoder)),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::FrSky(_) => ProviderKind::FrSky,
            Provider::Hott(_) => ProviderKind::Hott,
            Provider::Msp(_) => ProviderKind::Msp,
        }
    }

    /// Required line speed, 0 if the provider inherits the port's rate
    pub fn baud_rate(&self) -> u32 {
        match self {
            Provider::FrSky(_) => FRSKY_BAUD_RATE,
            Provider::Hott(_) => HOTT_BAUD_RATE,
            Provider::Msp(_) => 0,
        }
    }

    /// One-time protocol setup; does not touch the port
    pub fn init(&mut self, config: &TelemetryConfig) {
        info!("Initializing {:?} telemetry", self.kind());
        match self {
            Provider::FrSky(frsky) => frsky.init(config),
            Provider::Hott(hott) => hott.init(config),
            Provider::Msp(msp) => msp.init(config),
        }
    }

    /// Acquire the telemetry port
    pub fn configure_port(&mut self, ports: &mut dyn SerialPorts) {
        match self {
            Provider::FrSky(frsky) => frsky.configure_port(ports),
            Provider::Hott(hott) => hott.configure_port(ports),
            Provider::Msp(msp) => msp.configure_port(ports),
        }
    }

    /// Release the telemetry port
    pub fn free_port(&mut self, ports: &mut dyn SerialPorts) {
        match self {
            Provider::FrSky(frsky) => frsky.free_port(ports),
            Provider::Hott(hott) => hott.free_port(ports),
            Provider::Msp(msp) => msp.free_port(),
        }
    }

    /// One unit of protocol work for this scheduler tick
    pub fn handle(&mut self, ports: &mut dyn SerialPorts) {
        match self {
            Provider::FrSky(frsky) => frsky.handle(ports),
            Provider::Hott(hott) => hott.handle(ports),
            Provider::Msp(msp) => msp.handle(ports),
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Mock frame encoder for testing
    #[derive(Clone, Default)]
    pub struct RecordingEncoder {
        pub init_calls: Arc<Mutex<usize>>,
        pub poll_calls: Arc<Mutex<usize>>,
        pub frames: Arc<Mutex<VecDeque<Vec<u8>>>>,
        pub inputs: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl RecordingEncoder {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a frame for the next poll
        pub fn push_frame(&self, frame: &[u8]) {
            self.frames.lock().unwrap().push_back(frame.to_vec());
        }

        pub fn init_count(&self) -> usize {
            *self.init_calls.lock().unwrap()
        }

        pub fn poll_count(&self) -> usize {
            *self.poll_calls.lock().unwrap()
        }

        /// Input passed to each poll, in order
        pub fn received(&self) -> Vec<Vec<u8>> {
            self.inputs.lock().unwrap().clone()
        }
    }

    impl FrameEncoder for RecordingEncoder {
        fn init(&mut self, _config: &TelemetryConfig) {
            *self.init_calls.lock().unwrap() += 1;
        }

        fn poll(&mut self, input: &[u8]) -> Option<Vec<u8>> {
            *self.poll_calls.lock().unwrap() += 1;
            self.inputs.lock().unwrap().push(input.to_vec());
            self.frames.lock().unwrap().pop_front()
        }
    }
}
