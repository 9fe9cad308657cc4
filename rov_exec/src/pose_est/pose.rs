//! # Pose
//!
//! Dead reckoned position of the rover and the logger used to detect straight line travel.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use util::{angle::Angle, maths::haversine_m};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The current pose of the rover.
///
/// `x_m` and `y_m` are in the local frame, whose origin is the position the rover started from (or
/// was last reset to) and in which a heading of zero points along +y.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Units: meters
    pub x_m: f64,

    /// Units: meters
    pub y_m: f64,

    /// Latitude of the last GPS fix.
    ///
    /// Units: degrees
    pub latitude_deg: f64,

    /// Longitude of the last GPS fix.
    ///
    /// Units: degrees
    pub longitude_deg: f64,

    pub heading: Angle,
}

/// Tracks the last pose at which the rover changed heading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionLogger {
    /// Heading changes smaller than this are not counted as turns.
    ///
    /// Units: degrees
    pub angle_error_deg: f64,

    position: Pose,

    last_turn: Pose,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Position in the local frame.
    pub fn position_m(&self) -> Vector2<f64> {
        Vector2::new(self.x_m, self.y_m)
    }

    /// Latitude and longitude in degrees.
    pub fn coords(&self) -> (f64, f64) {
        (self.latitude_deg, self.longitude_deg)
    }

    /// Straight line distance to another pose in the local frame.
    pub fn distance_to(&self, other: &Pose) -> f64 {
        (self.position_m() - other.position_m()).norm()
    }

    /// Great circle distance to another pose using their GPS coordinates, in meters.
    pub fn geo_distance_to(&self, other: &Pose) -> f64 {
        haversine_m(
            self.latitude_deg,
            self.longitude_deg,
            other.latitude_deg,
            other.longitude_deg,
        )
    }

    /// Move the local frame origin to the current position.
    pub fn reset_position(&mut self) {
        self.x_m = 0.0;
        self.y_m = 0.0;
    }
}

impl PositionLogger {
    pub fn new(angle_error_deg: f64) -> Self {
        Self {
            angle_error_deg,
            position: Pose::default(),
            last_turn: Pose::default(),
        }
    }

    /// Record the current pose. If its heading differs from that of the last turn by more than
    /// the tolerance the pose becomes the new last turn.
    pub fn set_pos(&mut self, pose: &Pose) {
        self.position = *pose;

        if !pose
            .heading
            .is_angle(self.last_turn.heading, self.angle_error_deg)
        {
            self.last_turn = *pose;
        }
    }

    /// True if the rover has travelled at least `dist_m` without turning.
    pub fn going_straight(&self, dist_m: f64) -> bool {
        dist_m <= self.position.distance_to(&self.last_turn)
    }

    /// The pose at which the rover last turned.
    pub fn last_turn(&self) -> &Pose {
        &self.last_turn
    }
}

impl Default for PositionLogger {
    fn default() -> Self {
        Self::new(5.0)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
