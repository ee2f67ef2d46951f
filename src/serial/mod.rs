//! # Serial Communication Module
//!
//! Serial port driver seam used by the telemetry subsystem.
//!
//! This module handles:
//! - Mapping logical functions (MSP, telemetry, ...) onto physical ports
//! - Reporting whether two functions share one physical port
//! - Opening and closing host UARTs via `tokio-serial`
//! - Handing a shared port over between functions, one owner at a time

pub mod port_trait;

pub use port_trait::{PortHandle, PortMode, SerialFunction, SerialPorts};

use std::io::{Read, Write};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{PortConfig, SerialConfig};
use crate::error::{Result, TelemetryError};

/// Open UART as used by [`HostSerialPorts`]
pub trait UartDevice: Write {
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()>;

    /// Read whatever is already buffered without waiting, up to `buf.len()`
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Opens a device path at a baud rate
pub type UartOpener = Box<dyn FnMut(&str, u32, Duration) -> Result<Box<dyn UartDevice>>>;

/// Host UART backed by `tokio-serial`
struct HostUart(Box<dyn tokio_serial::SerialPort>);

impl Write for HostUart {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

impl UartDevice for HostUart {
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.0.set_baud_rate(baud_rate).map_err(|e| {
            TelemetryError::Serial(format!("Failed to set {} baud: {}", baud_rate, e))
        })
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let pending = self
            .0
            .bytes_to_read()
            .map_err(|e| TelemetryError::Serial(format!("Failed to query input: {}", e)))?;
        let len = (pending as usize).min(buf.len());
        if len == 0 {
            return Ok(0);
        }
        Ok(self.0.read(&mut buf[..len])?)
    }
}

/// A function's claim on a port and the rate it asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Claim {
    function: SerialFunction,
    baud_rate: u32,
}

/// One physical port, its owner and the claims it displaced
struct PortSlot {
    config: PortConfig,
    device: Option<Box<dyn UartDevice>>,
    owner: Option<Claim>,
    suspended: Vec<Claim>,
}

impl PortSlot {
    fn owned_by(&self, function: SerialFunction) -> bool {
        self.device.is_some() && self.owner.map(|claim| claim.function) == Some(function)
    }

    fn owned_device(&mut self, function: SerialFunction) -> Result<&mut Box<dyn UartDevice>> {
        if !self.owned_by(function) {
            return Err(TelemetryError::Serial(format!(
                "{:?} does not own {}",
                function, self.config.device
            )));
        }
        self.device
            .as_mut()
            .ok_or_else(|| TelemetryError::Serial(format!("{} is not open", self.config.device)))
    }
}

/// Host serial port driver
///
/// A physical port has at most one owner. A function claiming a port that
/// another function holds suspends that claim and switches the device to
/// its own rate. Releasing the port resumes the most recently suspended
/// claim at that claim's rate; the device is closed once no claim is left.
pub struct HostSerialPorts {
    slots: Vec<PortSlot>,
    timeout: Duration,
    opener: UartOpener,
}

impl std::fmt::Debug for HostSerialPorts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let devices: Vec<_> = self.slots.iter().map(|slot| &slot.config.device).collect();
        f.debug_struct("HostSerialPorts")
            .field("devices", &devices)
            .finish_non_exhaustive()
    }
}

impl HostSerialPorts {
    /// Build the driver from the configured port map
    ///
    /// No device is opened until a function claims it.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fc_telemetry::config::Config;
    /// use fc_telemetry::serial::{HostSerialPorts, SerialFunction, SerialPorts};
    ///
    /// let config = Config::load("config/default.toml")?;
    /// let ports = HostSerialPorts::new(&config.serial);
    /// println!("telemetry port available: {}", ports.can_open(SerialFunction::Telemetry));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(config: &SerialConfig) -> Self {
        Self::with_opener(config, Box::new(Self::open_port))
    }

    /// Build the driver with a custom device opener
    pub fn with_opener(config: &SerialConfig, opener: UartOpener) -> Self {
        let slots = config
            .ports
            .iter()
            .cloned()
            .map(|config| PortSlot {
                config,
                device: None,
                owner: None,
                suspended: Vec::new(),
            })
            .collect();

        Self {
            slots,
            timeout: Duration::from_millis(config.timeout_ms),
            opener,
        }
    }

    /// Device path mapped to `function`
    pub fn device_for(&self, function: SerialFunction) -> Result<&str> {
        self.slot_for(function)
            .map(|index| self.slots[index].config.device.as_str())
            .ok_or(TelemetryError::PortNotAssigned(function))
    }

    fn slot_for(&self, function: SerialFunction) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.config.functions.contains(&function))
    }

    /// Open a specific serial port, 8N1 without flow control
    fn open_port(path: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn UartDevice>> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| TelemetryError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(Box::new(HostUart(port)))
    }
}

impl SerialPorts for HostSerialPorts {
    fn can_open(&self, function: SerialFunction) -> bool {
        self.slot_for(function).is_some()
    }

    fn is_function_shared(&self, a: SerialFunction, b: SerialFunction) -> bool {
        match (self.slot_for(a), self.slot_for(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    fn open(
        &mut self,
        function: SerialFunction,
        baud_rate: u32,
        mode: PortMode,
        inverted: bool,
    ) -> Option<PortHandle> {
        let Some(index) = self.slot_for(function) else {
            warn!("No serial port assigned to {:?}", function);
            return None;
        };
        let timeout = self.timeout;
        let slot = &mut self.slots[index];
        let baud_rate = if baud_rate == 0 { slot.config.baud_rate } else { baud_rate };

        if inverted {
            warn!(
                "{} cannot invert signal levels on a host UART, opening non-inverted",
                slot.config.device
            );
        }

        if let Some(device) = slot.device.as_mut() {
            if let Err(e) = device.set_baud_rate(baud_rate) {
                warn!("{}: {}", slot.config.device, e);
                return None;
            }
        } else {
            match (self.opener)(slot.config.device.as_str(), baud_rate, timeout) {
                Ok(device) => slot.device = Some(device),
                Err(e) => {
                    warn!("{}", e);
                    return None;
                }
            }
        }

        let claim = Claim { function, baud_rate };
        match slot.owner.replace(claim) {
            Some(previous) if previous.function != function => {
                info!(
                    "{:?} takes {} from {:?}",
                    function, slot.config.device, previous.function
                );
                slot.suspended.push(previous);
            }
            _ => {}
        }

        info!(
            "Opened {} for {:?} at {} baud ({:?})",
            slot.config.device, function, baud_rate, mode
        );
        Some(PortHandle::new(index, function))
    }

    fn close(&mut self, handle: PortHandle) {
        let Some(slot) = self.slots.get_mut(handle.slot()) else {
            return;
        };
        let function = handle.function();

        if slot.owner.map(|claim| claim.function) != Some(function) {
            slot.suspended.retain(|claim| claim.function != function);
            debug!("Dropped suspended {:?} claim on {}", function, slot.config.device);
            return;
        }

        match slot.suspended.pop() {
            Some(previous) => {
                if let Some(device) = slot.device.as_mut() {
                    if let Err(e) = device.set_baud_rate(previous.baud_rate) {
                        warn!("{}: {}", slot.config.device, e);
                    }
                }
                slot.owner = Some(previous);
                info!(
                    "Returned {} to {:?} at {} baud",
                    slot.config.device, previous.function, previous.baud_rate
                );
            }
            None => {
                slot.owner = None;
                if slot.device.take().is_some() {
                    info!("Closed {}", slot.config.device);
                }
            }
        }
    }

    fn find_open(&self, function: SerialFunction) -> Option<PortHandle> {
        let index = self.slot_for(function)?;
        self.slots[index]
            .owned_by(function)
            .then(|| PortHandle::new(index, function))
    }

    fn read(&mut self, handle: PortHandle, buf: &mut [u8]) -> Result<usize> {
        let slot = self
            .slots
            .get_mut(handle.slot())
            .ok_or(TelemetryError::PortNotAssigned(handle.function()))?;

        slot.owned_device(handle.function())?.read_available(buf)
    }

    fn write(&mut self, handle: PortHandle, data: &[u8]) -> Result<()> {
        let slot = self
            .slots
            .get_mut(handle.slot())
            .ok_or(TelemetryError::PortNotAssigned(handle.function()))?;

        let device = slot.owned_device(handle.function())?;
        device
            .write_all(data)
            .map_err(|e| TelemetryError::Serial(format!("Failed to write frame: {}", e)))?;
        device
            .flush()
            .map_err(|e| TelemetryError::Serial(format!("Failed to flush serial port: {}", e)))?;

        debug!("Sent telemetry frame ({} bytes)", data.len());
        Ok(())
    }
}
