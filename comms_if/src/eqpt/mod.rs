//! # Equipment Interface
//!
//! This module defines the interface structures which are exchanged with equipment on the rover.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod ctrl;
