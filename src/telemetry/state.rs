//! # State Evaluator
//!
//! Decides whether telemetry should be enabled right now.
//!
//! | Port shared | Telemetry switch | Enabled |
//! |-------------|------------------|---------|
//! | no          | -                | always  |
//! | yes         | configured       | RC switch position |
//! | yes         | not configured   | armed   |
//!
//! A dedicated port has no contention, so telemetry runs continuously. A
//! port shared with MSP is handed to telemetry only while flying (or while
//! the pilot holds the telemetry switch), leaving it free for the
//! configurator on the bench.

/// Index of the telemetry switch in the RC switch-position array
pub const TELEMETRY_SWITCH_INDEX: usize = 20;

/// Arming and RC switch state owned by the flight-control loop
#[cfg_attr(test, mockall::automock)]
pub trait FlightStatus {
    fn is_armed(&self) -> bool;

    /// Position of the RC switch at `index`; out-of-range switches read as off
    fn switch_position(&self, index: usize) -> bool;
}

/// Snapshot of arm state and up to 32 RC switch positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RcSwitchState {
    pub armed: bool,
    switches: u32,
}

impl RcSwitchState {
    pub fn new(armed: bool) -> Self {
        Self { armed, switches: 0 }
    }

    pub fn set_switch(&mut self, index: usize, active: bool) {
        if index >= u32::BITS as usize {
            return;
        }
        if active {
            self.switches |= 1 << index;
        } else {
            self.switches &= !(1 << index);
        }
    }
}

impl FlightStatus for RcSwitchState {
    fn is_armed(&self) -> bool {
        self.armed
    }

    fn switch_position(&self, index: usize) -> bool {
        index < u32::BITS as usize && self.switches & (1 << index) != 0
    }
}

/// Desired telemetry state for the current inputs
///
/// Pure: reads only its arguments, never the controller's applied state.
pub fn determine_enabled_state(
    port_shared: bool,
    telemetry_switch: bool,
    flight: &dyn FlightStatus,
) -> bool {
    if !port_shared {
        return true;
    }

    if telemetry_switch {
        flight.switch_position(TELEMETRY_SWITCH_INDEX)
    } else {
        flight.is_armed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_dedicated_port_never_consults_flight_state() {
        let mut flight = MockFlightStatus::new();
        flight.expect_is_armed().times(0);
        flight.expect_switch_position().times(0);

        assert!(determine_enabled_state(false, false, &flight));
        assert!(determine_enabled_state(false, true, &flight));
    }

    #[test]
    fn test_dedicated_port_enabled_for_every_input() {
        for armed in [false, true] {
            for switch in [false, true] {
                for switch_enabled in [false, true] {
                    let mut flight = RcSwitchState::new(armed);
                    flight.set_switch(TELEMETRY_SWITCH_INDEX, switch);
                    assert!(determine_enabled_state(false, switch_enabled, &flight));
                }
            }
        }
    }

    #[test]
    fn test_shared_port_follows_arm_state() {
        let mut flight = MockFlightStatus::new();
        flight.expect_is_armed().times(1).return_const(true);
        flight.expect_switch_position().times(0);
        assert!(determine_enabled_state(true, false, &flight));

        let mut flight = MockFlightStatus::new();
        flight.expect_is_armed().times(1).return_const(false);
        assert!(!determine_enabled_state(true, false, &flight));
    }

    #[test]
    fn test_shared_port_follows_telemetry_switch() {
        let mut flight = MockFlightStatus::new();
        flight.expect_is_armed().times(0);
        flight
            .expect_switch_position()
            .with(eq(TELEMETRY_SWITCH_INDEX))
            .times(1)
            .return_const(true);
        assert!(determine_enabled_state(true, true, &flight));
    }

    #[test]
    fn test_switch_ignores_arm_state() {
        let mut flight = RcSwitchState::new(true);
        assert!(!determine_enabled_state(true, true, &flight));

        flight.armed = false;
        flight.set_switch(TELEMETRY_SWITCH_INDEX, true);
        assert!(determine_enabled_state(true, true, &flight));
    }

    #[test]
    fn test_same_inputs_same_answer() {
        let mut flight = RcSwitchState::new(true);
        flight.set_switch(TELEMETRY_SWITCH_INDEX, false);

        let first = determine_enabled_state(true, false, &flight);
        for _ in 0..10 {
            assert_eq!(determine_enabled_state(true, false, &flight), first);
        }
    }

    #[test]
    fn test_rc_switch_state_bits() {
        let mut flight = RcSwitchState::default();
        assert!(!flight.is_armed());
        assert!(!flight.switch_position(3));

        flight.set_switch(3, true);
        flight.set_switch(31, true);
        assert!(flight.switch_position(3));
        assert!(flight.switch_position(31));
        assert!(!flight.switch_position(4));

        flight.set_switch(3, false);
        assert!(!flight.switch_position(3));
    }

    #[test]
    fn test_rc_switch_state_out_of_range() {
        let mut flight = RcSwitchState::default();
        flight.set_switch(32, true);
        assert!(!flight.switch_position(32));
        assert!(!flight.switch_position(usize::MAX));
        assert_eq!(flight, RcSwitchState::default());
    }
}
