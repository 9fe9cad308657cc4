//! Utility library for the rover and ground station software

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod angle;
pub mod host;
pub mod logger;
pub mod maths;
pub mod params;
pub mod rate;
pub mod session;
pub mod time;
