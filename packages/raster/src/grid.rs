//! Grid geometry shared by every raster in an analysis.
//!
//! Grids are north-up and use geographic coordinates: the origin is the
//! north-west corner and pixels are square in degrees. Metric pixel sizes
//! therefore vary with latitude and are computed per row.

use bekasi_flood_spatial::{Bounds, METERS_PER_DEGREE};
use serde::{Deserialize, Serialize};

use crate::RasterError;

/// Placement and size of a north-up lon/lat grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSpec {
    /// Longitude of the western edge.
    pub west: f64,
    /// Latitude of the northern edge.
    pub north: f64,
    /// Pixel edge length in degrees.
    pub pixel_size_deg: f64,
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
}

impl GridSpec {
    /// Creates a grid, validating its dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidGrid`] if either dimension is zero or
    /// the pixel size is not a positive finite number.
    pub fn new(
        west: f64,
        north: f64,
        pixel_size_deg: f64,
        width: usize,
        height: usize,
    ) -> Result<Self, RasterError> {
        let spec = Self {
            west,
            north,
            pixel_size_deg,
            width,
            height,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Creates the smallest grid of `pixel_size_deg` pixels covering `bounds`.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidGrid`] if the bounds are empty or the
    /// pixel size is invalid.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn covering(bounds: Bounds, pixel_size_deg: f64) -> Result<Self, RasterError> {
        if !(pixel_size_deg.is_finite() && pixel_size_deg > 0.0) {
            return Err(RasterError::InvalidGrid {
                message: format!("pixel size must be positive, got {pixel_size_deg}"),
            });
        }
        // Tolerance keeps exact multiples from rounding up on float noise.
        let cells = |span: f64| ((span / pixel_size_deg) - 1e-9).ceil().max(0.0) as usize;
        let width = cells(bounds.east - bounds.west);
        let height = cells(bounds.north - bounds.south);
        Self::new(bounds.west, bounds.north, pixel_size_deg, width, height)
    }

    /// Checks the invariants enforced by [`Self::new`].
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidGrid`] on violation.
    pub fn validate(&self) -> Result<(), RasterError> {
        if self.width == 0 || self.height == 0 {
            return Err(RasterError::InvalidGrid {
                message: format!("grid is empty ({}x{})", self.width, self.height),
            });
        }
        if !(self.pixel_size_deg.is_finite() && self.pixel_size_deg > 0.0) {
            return Err(RasterError::InvalidGrid {
                message: format!("pixel size must be positive, got {}", self.pixel_size_deg),
            });
        }
        Ok(())
    }

    /// Total number of pixels.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.width * self.height
    }

    /// Whether the grid holds no pixels.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Array shape `(rows, columns)` of rasters on this grid.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Latitude of a row's pixel centres.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn row_lat(&self, row: usize) -> f64 {
        self.pixel_size_deg.mul_add(-(row as f64 + 0.5), self.north)
    }

    /// Longitude of a column's pixel centres.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn col_lon(&self, col: usize) -> f64 {
        self.pixel_size_deg.mul_add(col as f64 + 0.5, self.west)
    }

    /// Lon/lat of a pixel centre.
    #[must_use]
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (self.col_lon(col), self.row_lat(row))
    }

    /// Metric pixel size `(dx, dy)` for a row.
    #[must_use]
    pub fn pixel_spacing_m(&self, row: usize) -> (f64, f64) {
        let dy = self.pixel_size_deg * METERS_PER_DEGREE;
        let dx = dy * self.row_lat(row).to_radians().cos();
        (dx, dy)
    }

    /// Area of one pixel in a row, in square kilometres.
    #[must_use]
    pub fn pixel_area_km2(&self, row: usize) -> f64 {
        let (dx, dy) = self.pixel_spacing_m(row);
        dx * dy / 1e6
    }

    /// Lon/lat bounds of the whole grid.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bounds(&self) -> Bounds {
        Bounds {
            west: self.west,
            south: self.pixel_size_deg.mul_add(-(self.height as f64), self.north),
            east: self.pixel_size_deg.mul_add(self.width as f64, self.west),
            north: self.north,
        }
    }

    /// Rows whose pixel centres fall within `bounds`, as a half-open range.
    #[must_use]
    pub fn rows_within(&self, bounds: &Bounds) -> std::ops::Range<usize> {
        let first = (0..self.height).find(|&row| bounds.covers_lat(self.row_lat(row)));
        first.map_or(0..0, |first| {
            let last = (first..self.height)
                .take_while(|&row| bounds.covers_lat(self.row_lat(row)))
                .last()
                .unwrap_or(first);
            first..last + 1
        })
    }
}
