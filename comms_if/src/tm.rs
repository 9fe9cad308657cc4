//! # Telemetry module
//!
//! Status reports sent periodically from the rover to the ground station.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Overall status of the rover.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoverStatus {
    /// False once the rover executable is shutting down. The ground station exits when it sees
    /// this.
    pub power: bool,

    /// True while the control loop is running
    pub running: bool,

    /// True while the link is in its low rate polling mode
    pub sleeping: bool,

    /// True while the rover is under remote control
    pub rc: bool,

    /// True while images are being saved to the session directory
    pub img_logging: bool
}

impl Default for RoverStatus {
    fn default() -> Self {
        Self {
            power: true,
            running: false,
            sleeping: false,
            rc: false,
            img_logging: false
        }
    }
}
