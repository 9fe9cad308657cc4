//! Camera mounting geometry and lens distortion

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use util::maths::{clamp, poly_val};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// How the camera is mounted on the rover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraGeometry {
    /// Field of view across the image diagonal.
    ///
    /// Units: degrees
    pub fov_deg: f64,

    /// Height of the lens above the ground.
    ///
    /// Units: meters
    pub mount_height_m: f64,

    /// Tilt of the optical axis, negative is towards the ground.
    ///
    /// Units: degrees
    pub mount_angle_deg: f64,

    pub distortion: Distortion,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Correction applied to the normalised distance of a pixel from the image centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distortion {
    /// No correction
    Identity,

    /// A polynomial in the normalised distance, coefficients from the highest power down. The
    /// result is clamped to `[0, 1]`.
    Polynomial { coeffs: Vec<f64> },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for CameraGeometry {
    fn default() -> Self {
        Self {
            fov_deg: 160.0,
            mount_height_m: 0.15,
            mount_angle_deg: -25.0,
            distortion: Distortion::Identity,
        }
    }
}

impl Distortion {
    /// Fit for the wide angle lens fitted to the rover.
    pub fn wide_angle() -> Self {
        Distortion::Polynomial {
            coeffs: vec![-0.397208, -0.204189, 1.6014, 0.0],
        }
    }

    /// Apply the correction to a normalised distance in `[0, 1]`.
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Distortion::Identity => x,
            Distortion::Polynomial { coeffs } => clamp(poly_val(x, coeffs), 0.0, 1.0),
        }
    }
}

impl Default for Distortion {
    fn default() -> Self {
        Distortion::Identity
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distortion() {
        assert_eq!(Distortion::Identity.apply(0.3), 0.3);

        let d = Distortion::wide_angle();
        assert_relative_eq!(d.apply(0.0), 0.0);
        assert_relative_eq!(
            d.apply(0.5),
            -0.397208 * 0.125 - 0.204189 * 0.25 + 1.6014 * 0.5,
            epsilon = 1e-12
        );

        // Clamped into range
        let steep = Distortion::Polynomial {
            coeffs: vec![3.0, 0.0],
        };
        assert_eq!(steep.apply(0.9), 1.0);
        assert_eq!(steep.apply(-0.1), 0.0);
    }

    #[test]
    fn test_geometry_from_toml() {
        let geom: CameraGeometry = util::params::from_str(
            "mount_height_m = 0.2\n[distortion]\nkind = \"polynomial\"\ncoeffs = [1.0, 0.0]",
        )
        .unwrap();

        assert_eq!(geom.fov_deg, 160.0);
        assert_eq!(geom.mount_height_m, 0.2);
        assert_eq!(
            geom.distortion,
            Distortion::Polynomial {
                coeffs: vec![1.0, 0.0]
            }
        );
        assert_eq!(CameraGeometry::default().distortion, Distortion::Identity);
    }
}
