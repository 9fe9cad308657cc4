//! # Rover library.
//!
//! This library allows other crates in the workspace to access items defined inside the rover
//! crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Global data store for the rover executable
pub mod data_store;

/// Image saver - writes camera frames to the session directory
pub mod img_saver;

/// Locomotion control module - converts remote control demands into motor powers
pub mod loco_ctrl;

/// Occupancy map - accumulates terrain observations into a growable grid
pub mod map;

/// Rover executable parameters
pub mod params;

/// Perception - projects the terrain classifier output onto the ground
pub mod per;

/// Pose estimator - talks to the motor/sensor controller and dead reckons the rover's pose
pub mod pose_est;
