//! # Occupancy map
//!
//! A growable grid of per-class evidence built up from projected terrain observations.
//!
//! The map is stored as a 3D array indexed by `[row, col, class]`. Columns increase with world x
//! and rows increase with *decreasing* world y, so row 0 is the northern edge of the map. The
//! origin is the cell containing world `(0, 0)`.
//!
//! The map only ever grows. When a point lands outside of the current bounds new empty rows or
//! columns are added on that side, and if they are added to the top or left the origin is shifted
//! so every existing cell keeps its world position.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, warn};
use ndarray::{s, Array3, Axis};
use serde::Deserialize;

use comms_if::net::ClassGrid;

use crate::per::ClassifiedPoint;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapParams {
    /// Initial length of each side of the map.
    ///
    /// Units: meters
    pub size_m: f64,

    /// Size of a cell.
    ///
    /// Units: meters/cell
    pub scale_m: f64,

    pub num_classes: usize,

    /// Minimum number of cells added when the map grows.
    pub default_extend: usize,
}

/// Per-class evidence grid.
#[derive(Debug, Clone)]
pub struct OccupancyMap {
    scale_m: f64,

    /// Cell containing world (0, 0) as (col, row)
    origin: (usize, usize),

    data: Array3<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for MapParams {
    fn default() -> Self {
        Self {
            size_m: 5.0,
            scale_m: 0.5,
            num_classes: 4,
            default_extend: 1,
        }
    }
}

impl OccupancyMap {
    /// Create an empty square map of side `size_m` centred on the world origin.
    ///
    /// # Panics
    /// - If `scale_m` is not strictly positive or `num_classes` is zero.
    pub fn new(num_classes: usize, size_m: f64, scale_m: f64) -> Self {
        assert!(scale_m > 0.0, "Map scale must be positive, got {}", scale_m);
        assert!(num_classes > 0, "Map must have at least one class");

        let num_cells = (size_m / scale_m).ceil().max(1.0) as usize;

        Self {
            scale_m,
            origin: (num_cells / 2, num_cells / 2),
            data: Array3::zeros((num_cells, num_cells, num_classes)),
        }
    }

    pub fn from_params(params: &MapParams) -> Self {
        Self::new(params.num_classes, params.size_m, params.scale_m)
    }

    /// Accumulate a batch of world frame points.
    ///
    /// Each point adds `exp(-range)` to its cell's evidence for its class, so nearer observations
    /// count for more. Points with a class the map doesn't have are skipped.
    pub fn map_projections(&mut self, points: &[ClassifiedPoint], default_extend: usize) {
        let num_classes = self.num_classes();
        let mut num_skipped = 0;

        for p in points {
            if p.class >= num_classes {
                num_skipped += 1;
                continue;
            }

            let (col, row) = self.cell_of(p.position.x, p.position.y);
            let (rows, cols) = self.dims();

            if col < 0 {
                self.extend(Side::Left, (-col as usize).max(default_extend));
            } else if col >= cols as i64 {
                self.extend(Side::Right, ((col + 1) as usize - cols).max(default_extend));
            }

            if row < 0 {
                self.extend(Side::Top, (-row as usize).max(default_extend));
            } else if row >= rows as i64 {
                self.extend(Side::Bottom, ((row + 1) as usize - rows).max(default_extend));
            }

            // The origin may have moved
            let (col, row) = self.cell_of(p.position.x, p.position.y);

            self.data[[row as usize, col as usize, p.class]] += (-p.range_m).exp();
        }

        if num_skipped > 0 {
            warn!(
                "Skipped {} points with classes outside of the map's {} classes",
                num_skipped, num_classes
            );
        }
    }

    /// The most likely class of every cell.
    ///
    /// Where classes are tied the lowest index wins, so cells with no evidence are class 0.
    pub fn get_data(&self) -> ClassGrid {
        self.data.map_axis(Axis(2), |evidence| {
            evidence
                .iter()
                .enumerate()
                .fold((0, f64::MIN), |best, (i, &e)| if e > best.1 { (i, e) } else { best })
                .0
        })
    }

    /// Cell containing world (0, 0) as (col, row).
    pub fn get_origin(&self) -> (usize, usize) {
        self.origin
    }

    /// Size of the map as (rows, cols).
    pub fn dims(&self) -> (usize, usize) {
        let (rows, cols, _) = self.data.dim();
        (rows, cols)
    }

    pub fn num_classes(&self) -> usize {
        self.data.dim().2
    }

    /// Units: meters/cell
    pub fn scale_m(&self) -> f64 {
        self.scale_m
    }

    /// Accumulated evidence for a class in a cell, `None` if out of bounds.
    pub fn evidence(&self, row: usize, col: usize, class: usize) -> Option<f64> {
        self.data.get([row, col, class]).copied()
    }

    /// Cell of a world position as (col, row), which may lie outside of the map.
    pub fn cell_of(&self, x_m: f64, y_m: f64) -> (i64, i64) {
        let col = (x_m / self.scale_m).round() as i64 + self.origin.0 as i64;
        let row = -((y_m / self.scale_m).round() as i64) + self.origin.1 as i64;
        (col, row)
    }

    /// Grow the map by `num` empty rows or columns on the given side.
    fn extend(&mut self, side: Side, num: usize) {
        let (rows, cols, classes) = self.data.dim();

        let mut grown = match side {
            Side::Left | Side::Right => Array3::zeros((rows, cols + num, classes)),
            Side::Top | Side::Bottom => Array3::zeros((rows + num, cols, classes)),
        };

        match side {
            Side::Left => {
                grown.slice_mut(s![.., num.., ..]).assign(&self.data);
                self.origin.0 += num;
            }
            Side::Right => grown.slice_mut(s![.., ..cols, ..]).assign(&self.data),
            Side::Top => {
                grown.slice_mut(s![num.., .., ..]).assign(&self.data);
                self.origin.1 += num;
            }
            Side::Bottom => grown.slice_mut(s![..rows, .., ..]).assign(&self.data),
        }

        self.data = grown;

        debug!("Map grown {} cells to the {:?}, now {:?}", num, side, self.dims());
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
