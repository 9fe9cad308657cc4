//! # Pose estimator module
//!
//! This module talks to the rover's motor/sensor controller over a serial port. It decodes the
//! GPS, IMU and encoder frames the controller streams, dead reckons the rover's pose from the
//! encoders and IMU yaw, and sends the current motor demands back to the controller.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
pub mod port;
pub mod pose;
pub mod state;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use port::*;
pub use pose::*;
pub use state::*;
