//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Mean radius of the Earth used for great-circle distances.
///
/// Units: meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Apply polynomial coefficients to a value.
///
/// Coefficients are ordered highest power first, i.e. `[a, b, c]` evaluates `a*x^2 + b*x + c`.
pub fn poly_val<T>(value: T, coeffs: &[T]) -> T
where
    T: Float
{
    // Horner's method
    coeffs.iter().fold(T::zero(), |acc, &c| acc * value + c)
}

/// Clamp a value into the range `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T 
where
    T: Float
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// `num_traits::Float` has no `rem_euclid` so this mirrors the std implementation. Due to round
/// off the result can equal `rhs.abs()` when `lhs` is a tiny negative number, callers which need a
/// half-open range must handle that case.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Get the unsigned angular distance between two angles in degrees, accounting for wrapping at
/// 360.
///
/// The result is always in the range `[0, 180]`.
pub fn ang_dist_deg(a: f64, b: f64) -> f64 {
    let d = rem_euclid(a - b, 360.0);

    d.min(360.0 - d)
}

/// Great circle distance between two latitude/longitude pairs (in degrees) using the haversine
/// formula.
///
/// Units: meters
pub fn haversine_m(lat_0: f64, lon_0: f64, lat_1: f64, lon_1: f64) -> f64 {
    let lat_0_rad = lat_0.to_radians();
    let lat_1_rad = lat_1.to_radians();
    let delta_lat = (lat_1 - lat_0).to_radians();
    let delta_lon = (lon_1 - lon_0).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat_0_rad.cos() * lat_1_rad.cos() * (delta_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}
