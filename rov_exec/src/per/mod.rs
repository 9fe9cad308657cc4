//! # Perception module
//!
//! Turns the terrain classifier's output into ground plane observations for the map.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod camera;
pub mod project;
pub mod source;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use camera::*;
pub use project::*;
pub use source::*;
