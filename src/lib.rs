//! # FC Telemetry Library
//!
//! Telemetry lifecycle core for flight controllers.
//!
//! This library decides at run time whether telemetry should be active,
//! which provider (FrSky, HoTT or MSP) owns the telemetry serial link, and
//! when to acquire or release a port shared with the MSP command link as
//! arm state and switches change.

pub mod config;
pub mod error;
pub mod serial;
pub mod telemetry;
