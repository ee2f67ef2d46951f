//! Trait abstraction for the flight controller's serial port driver

use serde::Deserialize;

use crate::error::Result;

/// Logical function a physical serial port can be mapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerialFunction {
    /// MultiWii Serial Protocol (configurator / command link)
    Msp,
    /// Telemetry downlink
    Telemetry,
    /// GPS receiver
    Gps,
    /// Serial RC receiver
    SerialRx,
}

/// Direction(s) a port is opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortMode {
    Rx,
    Tx,
    RxTx,
}

/// Handle to a function's claim on an open physical port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortHandle {
    slot: usize,
    function: SerialFunction,
}

impl PortHandle {
    pub fn new(slot: usize, function: SerialFunction) -> Self {
        Self { slot, function }
    }

    /// Index of the physical port in the driver's port table
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Function this claim was opened for
    pub fn function(&self) -> SerialFunction {
        self.function
    }
}

/// Serial port driver as seen by the telemetry subsystem
///
/// Implementations own the function-to-port mapping and the physical
/// devices. All calls are synchronous and must not block the control loop.
pub trait SerialPorts {
    /// Whether a port could be opened for `function` under the current mapping
    fn can_open(&self, function: SerialFunction) -> bool;

    /// Whether `a` and `b` resolve to the same physical port
    fn is_function_shared(&self, a: SerialFunction, b: SerialFunction) -> bool;

    /// Claim the port mapped to `function`
    ///
    /// A `baud_rate` of 0 keeps the port's configured rate. Returns `None`
    /// if no port is mapped or the device cannot be opened.
    fn open(
        &mut self,
        function: SerialFunction,
        baud_rate: u32,
        mode: PortMode,
        inverted: bool,
    ) -> Option<PortHandle>;

    /// Release a claim obtained from [`SerialPorts::open`]
    fn close(&mut self, handle: PortHandle);

    /// Existing claim for `function`, if its port is already open
    fn find_open(&self, function: SerialFunction) -> Option<PortHandle>;

    /// Read input already received on the port behind `handle`
    ///
    /// Never waits; returns 0 when nothing is buffered.
    fn read(&mut self, handle: PortHandle, buf: &mut [u8]) -> Result<usize>;

    /// Write a complete frame to the port behind `handle`
    fn write(&mut self, handle: PortHandle, data: &[u8]) -> Result<()>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::TelemetryError;
    use std::collections::{HashSet, VecDeque};
    use std::sync::{Arc, Mutex};

    /// Driver call recorded by [`MockSerialPorts`]
    #[derive(Debug, Clone, PartialEq)]
    pub enum PortCall {
        Open {
            function: SerialFunction,
            baud_rate: u32,
            mode: PortMode,
            inverted: bool,
        },
        Close(PortHandle),
        Write(PortHandle, Vec<u8>),
    }

    /// Mock serial driver for testing
    ///
    /// Every function is mapped to slot 0. `openable` controls which
    /// functions `can_open` reports, `shared` answers `is_function_shared`.
    #[derive(Clone)]
    pub struct MockSerialPorts {
        pub calls: Arc<Mutex<Vec<PortCall>>>,
        pub openable: Arc<Mutex<HashSet<SerialFunction>>>,
        pub open_claims: Arc<Mutex<HashSet<SerialFunction>>>,
        pub shared: bool,
        pub open_error: Arc<Mutex<bool>>,
        pub write_error: Arc<Mutex<bool>>,
        pub input: Arc<Mutex<VecDeque<u8>>>,
    }

    impl MockSerialPorts {
        pub fn new(shared: bool) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                openable: Arc::new(Mutex::new(
                    [SerialFunction::Msp, SerialFunction::Telemetry].into_iter().collect(),
                )),
                open_claims: Arc::new(Mutex::new(HashSet::new())),
                shared,
                open_error: Arc::new(Mutex::new(false)),
                write_error: Arc::new(Mutex::new(false)),
                input: Arc::new(Mutex::new(VecDeque::new())),
            }
        }

        /// Driver with no port available for telemetry
        pub fn without_telemetry_port() -> Self {
            let ports = Self::new(false);
            ports.openable.lock().unwrap().remove(&SerialFunction::Telemetry);
            ports
        }

        /// Mark `function` as already holding an open claim (e.g. MSP at boot)
        pub fn preopen(&self, function: SerialFunction) {
            self.open_claims.lock().unwrap().insert(function);
        }

        pub fn set_open_error(&self, fail: bool) {
            *self.open_error.lock().unwrap() = fail;
        }

        pub fn set_write_error(&self, fail: bool) {
            *self.write_error.lock().unwrap() = fail;
        }

        /// Bytes the next `read` will return
        pub fn queue_input(&self, data: &[u8]) {
            self.input.lock().unwrap().extend(data.iter().copied());
        }

        pub fn get_calls(&self) -> Vec<PortCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn open_count(&self) -> usize {
            self.get_calls()
                .iter()
                .filter(|call| matches!(call, PortCall::Open { .. }))
                .count()
        }

        pub fn close_count(&self) -> usize {
            self.get_calls()
                .iter()
                .filter(|call| matches!(call, PortCall::Close(_)))
                .count()
        }

        pub fn written_frames(&self) -> Vec<Vec<u8>> {
            self.get_calls()
                .into_iter()
                .filter_map(|call| match call {
                    PortCall::Write(_, frame) => Some(frame),
                    _ => None,
                })
                .collect()
        }
    }

    impl SerialPorts for MockSerialPorts {
        fn can_open(&self, function: SerialFunction) -> bool {
            self.openable.lock().unwrap().contains(&function)
        }

        fn is_function_shared(&self, _a: SerialFunction, _b: SerialFunction) -> bool {
            self.shared
        }

        fn open(
            &mut self,
            function: SerialFunction,
            baud_rate: u32,
            mode: PortMode,
            inverted: bool,
        ) -> Option<PortHandle> {
            self.calls.lock().unwrap().push(PortCall::Open {
                function,
                baud_rate,
                mode,
                inverted,
            });
            if *self.open_error.lock().unwrap() {
                return None;
            }
            self.open_claims.lock().unwrap().insert(function);
            Some(PortHandle::new(0, function))
        }

        fn close(&mut self, handle: PortHandle) {
            self.calls.lock().unwrap().push(PortCall::Close(handle));
            self.open_claims.lock().unwrap().remove(&handle.function());
        }

        fn find_open(&self, function: SerialFunction) -> Option<PortHandle> {
            self.open_claims
                .lock()
                .unwrap()
                .contains(&function)
                .then(|| PortHandle::new(0, function))
        }

        fn read(&mut self, _handle: PortHandle, buf: &mut [u8]) -> Result<usize> {
            let mut input = self.input.lock().unwrap();
            let len = input.len().min(buf.len());
            for (slot, byte) in buf.iter_mut().zip(input.drain(..len)) {
                *slot = byte;
            }
            Ok(len)
        }

        fn write(&mut self, handle: PortHandle, data: &[u8]) -> Result<()> {
            if *self.write_error.lock().unwrap() {
                return Err(TelemetryError::Serial("Mock write error".to_string()));
            }
            self.calls
                .lock()
                .unwrap()
                .push(PortCall::Write(handle, data.to_vec()));
            Ok(())
        }
    }
}
