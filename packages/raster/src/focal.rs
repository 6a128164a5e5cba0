//! Neighbourhood operators: square-kernel statistics and terrain slope.

use ndarray::{Array2, s};

use crate::Raster;

/// Mean and population variance of the set pixels in a square neighbourhood.
///
/// The kernel spans `radius` pixels in every direction (`radius = 1` is
/// 3x3). Output pixels are unset wherever the centre pixel is unset; unset
/// neighbours are skipped and the kernel is truncated at the grid edge.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn focal_mean_variance(raster: &Raster, radius: usize) -> (Raster, Raster) {
    let spec = *raster.spec();
    let pixels = raster.values();
    let (height, width) = pixels.dim();

    let stats: Array2<Option<(f64, f64)>> = Array2::from_shape_fn((height, width), |(row, col)| {
        pixels[[row, col]]?;
        let window = pixels.slice(s![
            row.saturating_sub(radius)..(row + radius + 1).min(height),
            col.saturating_sub(radius)..(col + radius + 1).min(width)
        ]);
        let (n, sum, sum_sq) = window
            .iter()
            .flatten()
            .fold((0usize, 0.0, 0.0), |(n, sum, sum_sq), &v| {
                (n + 1, sum + v, v.mul_add(v, sum_sq))
            });

        let n = n as f64;
        let mean = sum / n;
        Some((mean, mean.mul_add(-mean, sum_sq / n).max(0.0)))
    });

    log::debug!(
        "focal statistics on '{}' ({width}x{height}, radius {radius})",
        raster.band()
    );

    (
        Raster::from_pixels(
            format!("{}_mean", raster.band()),
            spec,
            stats.mapv(|stat| stat.map(|(mean, _)| mean)),
        ),
        Raster::from_pixels(
            format!("{}_variance", raster.band()),
            spec,
            stats.mapv(|stat| stat.map(|(_, variance)| variance)),
        ),
    )
}

/// Terrain slope in degrees from an elevation raster in metres.
///
/// Uses central differences over the four direct neighbours, falling back
/// to a one-sided difference where a neighbour is unset or off the grid.
/// Pixels with unset elevation have unset slope.
#[must_use]
pub fn slope_degrees(elevation: &Raster) -> Raster {
    let spec = *elevation.spec();
    let dem = elevation.values();
    let at = |row: Option<usize>, col: Option<usize>| -> Option<f64> {
        dem.get((row?, col?)).copied().flatten()
    };

    let slope = Array2::from_shape_fn(dem.dim(), |(row, col)| {
        let centre = dem[[row, col]]?;
        let (dx, dy) = spec.pixel_spacing_m(row);

        let left = at(Some(row), col.checked_sub(1));
        let right = at(Some(row), Some(col + 1));
        let up = at(row.checked_sub(1), Some(col));
        let down = at(Some(row + 1), Some(col));

        let gx = gradient(left, centre, right, dx);
        let gy = gradient(up, centre, down, dy);

        Some(gx.hypot(gy).atan().to_degrees())
    });

    Raster::from_pixels("slope", spec, slope)
}

fn gradient(before: Option<f64>, centre: f64, after: Option<f64>, spacing: f64) -> f64 {
    match (before, after) {
        (Some(b), Some(a)) => (a - b) / (2.0 * spacing),
        (None, Some(a)) => (a - centre) / spacing,
        (Some(b), None) => (centre - b) / spacing,
        (None, None) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GridSpec;

    fn spec(width: usize, height: usize) -> GridSpec {
        GridSpec::new(107.0, -6.0, 0.0001, width, height).unwrap()
    }

    #[test]
    fn uniform_raster_has_zero_variance() {
        let raster = Raster::filled("vv", spec(5, 5), Some(2.0));
        let (mean, variance) = focal_mean_variance(&raster, 1);
        assert!(mean.values().iter().all(|v| *v == Some(2.0)));
        assert!(variance.values().iter().all(|v| *v == Some(0.0)));
    }

    #[test]
    fn statistics_use_the_three_by_three_window() {
        let raster = Raster::from_fn("vv", spec(3, 3), |c, r| {
            Some(if c == 1 && r == 1 { 10.0 } else { 1.0 })
        });
        let (mean, variance) = focal_mean_variance(&raster, 1);

        // Centre: 8 ones and a ten.
        let m = mean.get(1, 1).unwrap();
        assert!((m - 2.0).abs() < 1e-12);
        let v = variance.get(1, 1).unwrap();
        assert!((v - 8.0).abs() < 1e-9);

        // Corner window is truncated to 2x2: three ones and the ten.
        assert!((mean.get(0, 0).unwrap() - 13.0 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn unset_centre_stays_unset_and_neighbours_are_skipped() {
        let raster = Raster::from_fn("vv", spec(3, 1), |c, _| (c != 1).then_some(4.0));
        let (mean, _) = focal_mean_variance(&raster, 1);
        assert_eq!(mean.get(1, 0), None);
        assert_eq!(mean.get(0, 0), Some(4.0));
    }

    #[test]
    fn flat_terrain_has_zero_slope() {
        let dem = Raster::filled("elevation", spec(4, 4), Some(12.0));
        let slope = slope_degrees(&dem);
        assert!(slope.values().iter().all(|v| *v == Some(0.0)));
    }

    #[test]
    fn ramp_slope_matches_rise_over_run() {
        let spec = spec(5, 3);
        let (dx, _) = spec.pixel_spacing_m(1);
        // Rises dx metres per column: 45 degrees.
        #[allow(clippy::cast_precision_loss)]
        let dem = Raster::from_fn("elevation", spec, |c, _| Some(c as f64 * dx));
        let slope = slope_degrees(&dem);
        let s = slope.get(2, 1).unwrap();
        assert!((s - 45.0).abs() < 0.01, "slope was {s}");
    }
}
