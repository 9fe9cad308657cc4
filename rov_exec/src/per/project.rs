//! # Projection
//!
//! Projects a grid of per-pixel terrain classes onto the ground plane.
//!
//! Each cell of the class grid is treated as a ray leaving the camera. Its angle from the optical
//! axis is proportional to the (distortion corrected) distance of the cell from the centre of the
//! grid, with the grid corner lying at half the field of view. Rays pointing at or above the
//! horizon never meet the ground and are dropped.
//!
//! In the local frame the rover sits at the origin facing +y, with +x to its right.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Rotation2, Vector2};
use serde::Serialize;

use comms_if::net::ClassGrid;

use super::CameraGeometry;
use crate::pose_est::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single ground plane observation of a terrain class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassifiedPoint {
    pub class: usize,

    /// Position of the point in the frame it was projected into.
    ///
    /// Units: meters
    pub position: Vector2<f64>,

    /// Distance from the rover at the time of observation.
    ///
    /// Units: meters
    pub range_m: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProjectionError {
    #[error("The class grid is empty")]
    EmptyGrid,

    #[error("The camera must be mounted above the ground, got a height of {0} m")]
    InvalidMountHeight(f64),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Project every cell of the class grid onto the ground in the rover's local frame.
///
/// Points further than `cutoff_m` from the rover are discarded.
pub fn project(
    grid: &ClassGrid,
    geom: &CameraGeometry,
    cutoff_m: f64,
) -> Result<Vec<ClassifiedPoint>, ProjectionError> {
    let (height, width) = grid.dim();

    if height == 0 || width == 0 {
        return Err(ProjectionError::EmptyGrid);
    }
    if !(geom.mount_height_m > 0.0) {
        return Err(ProjectionError::InvalidMountHeight(geom.mount_height_m));
    }

    let centre = Vector2::new((width - 1) as f64 / 2.0, (height - 1) as f64 / 2.0);
    let corner_dist = centre.norm();
    let half_fov_deg = geom.fov_deg / 2.0;

    let mut points = Vec::new();

    for ((row, col), &class) in grid.indexed_iter() {
        // Offset from the centre, +y up the image
        let offset = Vector2::new(col as f64 - centre.x, centre.y - row as f64);
        let dist = offset.norm();

        let (v_angle_deg, h_angle_deg) = if dist > 0.0 {
            let norm_dist = dist / corner_dist;
            let correction = geom.distortion.apply(norm_dist) / norm_dist;
            let angles = offset * correction / corner_dist * half_fov_deg;

            (angles.y + geom.mount_angle_deg, angles.x)
        } else {
            (geom.mount_angle_deg, 0.0)
        };

        if v_angle_deg >= 0.0 {
            continue;
        }

        let y_m = (90.0 + v_angle_deg).to_radians().tan() * geom.mount_height_m;
        let ray_m = y_m.hypot(geom.mount_height_m);
        let x_m = h_angle_deg.to_radians().tan() * ray_m;

        let position = Vector2::new(x_m, y_m);
        let range_m = position.norm();

        if range_m > cutoff_m {
            continue;
        }

        points.push(ClassifiedPoint {
            class,
            position,
            range_m,
        });
    }

    Ok(points)
}

/// Project the class grid and then move the points into the global frame using the given pose.
pub fn project_global(
    grid: &ClassGrid,
    geom: &CameraGeometry,
    pose: &Pose,
    cutoff_m: f64,
) -> Result<Vec<ClassifiedPoint>, ProjectionError> {
    let mut points = project(grid, geom, cutoff_m)?;

    // Clockwise rotation by the heading
    let rot = Rotation2::new(-pose.heading.radians());
    let trans = pose.position_m();

    for p in points.iter_mut() {
        p.position = rot * p.position + trans;
    }

    Ok(points)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::per::Distortion;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use util::angle::Angle;

    fn centre_range(geom: &CameraGeometry) -> f64 {
        (90.0 + geom.mount_angle_deg).to_radians().tan() * geom.mount_height_m
    }

    #[test]
    fn test_single_centre_cell() {
        let geom = CameraGeometry::default();
        let grid = Array2::from_elem((1, 1), 2);

        let points = project(&grid, &geom, 5.0).unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].class, 2);
        assert_relative_eq!(points[0].position.x, 0.0);
        assert_relative_eq!(points[0].position.y, centre_range(&geom), epsilon = 1e-12);
        assert_relative_eq!(points[0].position.y, 0.321_68, epsilon = 1e-5);
        assert_relative_eq!(points[0].range_m, points[0].position.y);
    }

    #[test]
    fn test_horizon_cutoff() {
        // Optical axis on the horizon, so only the lower rows can hit the ground
        let geom = CameraGeometry {
            mount_angle_deg: 0.0,
            ..Default::default()
        };
        let grid = Array2::from_shape_fn((5, 5), |(row, _)| row);

        let points = project(&grid, &geom, f64::MAX).unwrap();

        assert_eq!(points.len(), 10);
        assert!(points.iter().all(|p| p.class >= 3));
        assert!(points.iter().all(|p| p.position.y > 0.0));

        // Pointing straight up nothing is visible
        let up = CameraGeometry {
            mount_angle_deg: 90.0,
            ..Default::default()
        };
        assert!(project(&grid, &up, f64::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_range_cutoff() {
        let geom = CameraGeometry::default();
        let grid = Array2::from_elem((9, 9), 1);

        let all = project(&grid, &geom, f64::MAX).unwrap();
        let near = project(&grid, &geom, 1.0).unwrap();

        assert!(near.len() < all.len());
        assert!(near.iter().all(|p| p.range_m <= 1.0));
    }

    #[test]
    fn test_distortion_changes_rays() {
        let grid = Array2::from_shape_fn((3, 3), |(row, col)| row * 3 + col);
        let identity = project(&grid, &CameraGeometry::default(), f64::MAX).unwrap();

        let distorted = CameraGeometry {
            distortion: Distortion::wide_angle(),
            ..Default::default()
        };
        let corrected = project(&grid, &distorted, f64::MAX).unwrap();

        // The centre cell is unaffected
        let centre = |points: &[ClassifiedPoint]| {
            points.iter().find(|p| p.class == 4).map(|p| p.position)
        };
        assert_eq!(centre(&identity), centre(&corrected));
        assert!(centre(&identity).is_some());
        assert_eq!(identity.len(), corrected.len());
        assert!(identity
            .iter()
            .zip(corrected.iter())
            .any(|(a, b)| (a.position - b.position).norm() > 1e-6));
    }

    #[test]
    fn test_invalid_input() {
        let empty: ClassGrid = Array2::zeros((0, 4));
        assert!(matches!(
            project(&empty, &CameraGeometry::default(), 5.0),
            Err(ProjectionError::EmptyGrid)
        ));

        let buried = CameraGeometry {
            mount_height_m: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            project(&Array2::zeros((1, 1)), &buried, 5.0),
            Err(ProjectionError::InvalidMountHeight(_))
        ));
    }

    #[test]
    fn test_project_global() {
        let geom = CameraGeometry::default();
        let grid = Array2::from_elem((1, 1), 1);
        let ahead = centre_range(&geom);

        let pose = Pose {
            x_m: 1.0,
            y_m: 2.0,
            ..Default::default()
        };
        let p = project_global(&grid, &geom, &pose, 5.0).unwrap()[0];
        assert_relative_eq!(p.position.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.position.y, 2.0 + ahead, epsilon = 1e-12);

        let turned = Pose {
            heading: Angle::new(90.0),
            ..Default::default()
        };
        let p = project_global(&grid, &geom, &turned, 5.0).unwrap()[0];
        assert_relative_eq!(p.position.x, ahead, epsilon = 1e-12);
        assert_relative_eq!(p.position.y, 0.0, epsilon = 1e-12);

        // Range is unchanged by the transform
        assert_relative_eq!(p.range_m, ahead);
    }
}
