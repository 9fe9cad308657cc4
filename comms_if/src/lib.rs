//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software: the Link between the rover and
//! the ground station, the messages carried over it, and the serial protocol spoken by the rover's
//! motor/sensor controller.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommands sent from the ground station to the rover
pub mod tc;

/// Telemetry sent from the rover to the ground station
pub mod tm;

/// Command and response definitions for equipment (like the motor controller)
pub mod eqpt;

/// Network module
pub mod net;
