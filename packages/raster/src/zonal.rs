//! Region reductions and temporal compositing.

use bekasi_flood_spatial::Region;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{Raster, RasterError};

/// Statistic computed over the set pixels of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    /// Arithmetic mean.
    Mean,
    /// Sum.
    Sum,
}

impl Raster {
    /// Reduces the set pixels whose centres fall inside `region`.
    ///
    /// Returns `None` when the region covers no set pixel, so callers can
    /// tell "no samples" apart from a zero statistic.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn reduce_region(&self, region: &dyn Region, reducer: Reducer) -> Option<f64> {
        let spec = *self.spec();
        let bounds = region.bounds();
        let mut n = 0usize;
        let mut sum = 0.0;

        for row in spec.rows_within(&bounds) {
            let lat = spec.row_lat(row);
            for col in 0..spec.width {
                let lon = spec.col_lon(col);
                if lon < bounds.west || lon > bounds.east || !region.contains(lon, lat) {
                    continue;
                }
                if let Some(v) = self.values()[[row, col]] {
                    n += 1;
                    sum += v;
                }
            }
        }

        if n == 0 {
            return None;
        }
        Some(match reducer {
            Reducer::Mean => sum / n as f64,
            Reducer::Sum => sum,
        })
    }

    /// Per-pixel median over a stack of co-registered rasters.
    ///
    /// Unset pixels are ignored; a pixel unset in every layer stays unset.
    /// Even counts average the two middle values.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::EmptyStack`] for an empty stack or
    /// [`RasterError::GridMismatch`] if the grids differ.
    pub fn median_composite(
        band: impl Into<String>,
        stack: &[Self],
    ) -> Result<Self, RasterError> {
        let (first, rest) = stack.split_first().ok_or(RasterError::EmptyStack)?;
        for layer in rest {
            first.check_grid(layer)?;
        }

        let spec = *first.spec();
        let mut samples = Vec::with_capacity(stack.len());
        let pixels = Array2::from_shape_fn(spec.shape(), |(row, col)| {
            samples.clear();
            samples.extend(stack.iter().filter_map(|layer| layer.values()[[row, col]]));
            median(&mut samples)
        });
        let composite = Self::from_pixels(band, spec, pixels);

        log::debug!(
            "median composite of {} layer(s) on {}x{} grid",
            stack.len(),
            spec.width,
            spec.height
        );
        Ok(composite)
    }
}

fn median(samples: &mut [f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(f64::total_cmp);
    let mid = samples.len() / 2;
    if samples.len() % 2 == 0 {
        Some(f64::midpoint(samples[mid - 1], samples[mid]))
    } else {
        Some(samples[mid])
    }
}
