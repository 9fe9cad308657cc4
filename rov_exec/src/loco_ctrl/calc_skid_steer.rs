//! Skid steer calculations

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::tc::RcDemand;

use super::OutputData;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Mix a forward and steer demand into left and right side powers.
///
/// If either side would exceed full power both sides are scaled down by the same factor, which
/// keeps the ratio between them (and so the turn radius) the same.
pub fn calc_skid_steer(demand: &RcDemand) -> OutputData {
    let mut left = demand.forward + demand.steer;
    let mut right = demand.forward - demand.steer;

    let max = left.abs().max(right.abs());
    if max > 1.0 {
        left /= max;
        right /= max;
    }

    OutputData { left, right }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn mix(forward: f64, steer: f64) -> (f64, f64) {
        let out = calc_skid_steer(&RcDemand::new(forward, steer));
        (out.left, out.right)
    }

    #[test]
    fn test_unsaturated() {
        assert_eq!(mix(0.0, 0.0), (0.0, 0.0));
        assert_eq!(mix(0.5, 0.0), (0.5, 0.5));
        assert_eq!(mix(0.0, 0.25), (0.25, -0.25));
        assert_eq!(mix(0.5, 0.5), (1.0, 0.0));
    }

    #[test]
    fn test_saturated() {
        let (l, r) = mix(1.0, 0.5);
        assert_relative_eq!(l, 1.0);
        assert_relative_eq!(r, 0.5 / 1.5);

        // Reversing keeps the sign of each side
        let (l, r) = mix(-1.0, 0.5);
        assert_relative_eq!(l, -0.5 / 1.5);
        assert_relative_eq!(r, -1.0);

        let (l, r) = mix(-1.0, -1.0);
        assert_relative_eq!(l, -1.0);
        assert_relative_eq!(r, 0.0);
    }
}
