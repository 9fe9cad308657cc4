//! # Angle
//!
//! A bounded angular quantity in degrees, normalised into `[0, 360)` on every write, with a
//! calibration offset which is applied before normalisation.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::maths::{ang_dist_deg, rem_euclid};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const FULL_TURN_DEG: f64 = 360.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An angle in degrees, always in the range `[0, 360)`.
///
/// Every instance owns its own value and offset, copying an `Angle` never aliases another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Angle {
    angle_deg: f64,

    offset_deg: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Angle {
    /// Create a new angle with no calibration offset.
    pub fn new(angle_deg: f64) -> Self {
        let mut a = Self::default();
        a.set(angle_deg);
        a
    }

    /// Set the angle, applying the calibration offset and then normalising into `[0, 360)`.
    pub fn set(&mut self, angle_deg: f64) -> &mut Self {
        self.angle_deg = normalise(angle_deg + self.offset_deg);
        self
    }

    /// Get the angle in degrees.
    pub fn get(&self) -> f64 {
        self.angle_deg
    }

    /// Get the angle in radians.
    pub fn radians(&self) -> f64 {
        self.angle_deg.to_radians()
    }

    /// The calibration offset which is added to every value passed to [`Angle::set`].
    pub fn offset(&self) -> f64 {
        self.offset_deg
    }

    /// Set the calibration offset directly.
    pub fn set_offset(&mut self, offset_deg: f64) -> &mut Self {
        self.offset_deg = offset_deg;
        self
    }

    /// Calibrate the angle so that the current reading becomes the zero point.
    ///
    /// The current value is left untouched, only subsequent calls to [`Angle::set`] are
    /// affected.
    pub fn calibrate(&mut self) {
        self.offset_deg = -self.angle_deg;
    }

    /// Determine if this angle is within `error_deg` of `other`, accounting for wrap around at
    /// 360.
    ///
    /// An error of zero requires exact equality, errors larger than 180 are clamped to 180
    /// (which matches any angle).
    pub fn is_angle<A: Into<f64>>(&self, other: A, error_deg: f64) -> bool {
        let other = normalise(other.into());
        let error = error_deg.abs().min(FULL_TURN_DEG / 2.0);

        if error == 0.0 {
            return other == self.angle_deg;
        }

        ang_dist_deg(self.angle_deg, other) <= error
    }
}

impl From<Angle> for f64 {
    fn from(angle: Angle) -> Self {
        angle.get()
    }
}

impl From<&Angle> for f64 {
    fn from(angle: &Angle) -> Self {
        angle.get()
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Normalise an angle into `[0, 360)`.
fn normalise(angle_deg: f64) -> f64 {
    let a = rem_euclid(angle_deg, FULL_TURN_DEG);

    // Round off can land exactly on the upper bound
    if a >= FULL_TURN_DEG {
        0.0
    } else {
        a
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
