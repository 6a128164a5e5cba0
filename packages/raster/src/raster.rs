//! The [`Raster`] value type and its pixel-wise algebra.

use bekasi_flood_spatial::Region;
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::{GridSpec, RasterError};

/// A single-band grid of optional pixel values.
///
/// Pixels are stored as an `(height, width)` array indexed `[[row, col]]`.
/// `None` marks an unset pixel. Operators never modify a raster in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RasterData", into = "RasterData")]
pub struct Raster {
    band: String,
    spec: GridSpec,
    pixels: Array2<Option<f64>>,
}

/// Wire form of a raster: the grid plus a flat row-major pixel list.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RasterData {
    band: String,
    spec: GridSpec,
    values: Vec<Option<f64>>,
}

impl TryFrom<RasterData> for Raster {
    type Error = RasterError;

    fn try_from(data: RasterData) -> Result<Self, Self::Error> {
        Self::new(data.band, data.spec, data.values)
    }
}

impl From<Raster> for RasterData {
    fn from(raster: Raster) -> Self {
        Self {
            values: raster.pixels.iter().copied().collect(),
            band: raster.band,
            spec: raster.spec,
        }
    }
}

impl Raster {
    /// Wraps a row-major pixel buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::LengthMismatch`] if the buffer does not match
    /// the grid, or [`RasterError::InvalidGrid`] for an invalid grid.
    pub fn new(
        band: impl Into<String>,
        spec: GridSpec,
        values: Vec<Option<f64>>,
    ) -> Result<Self, RasterError> {
        let band = band.into();
        spec.validate()?;
        let actual = values.len();
        let pixels = Array2::from_shape_vec(spec.shape(), values).map_err(|_| {
            RasterError::LengthMismatch {
                band: band.clone(),
                expected: spec.len(),
                actual,
            }
        })?;
        Ok(Self { band, spec, pixels })
    }

    /// A raster with every pixel set to `value`.
    #[must_use]
    pub fn filled(band: impl Into<String>, spec: GridSpec, value: Option<f64>) -> Self {
        Self::from_pixels(band, spec, Array2::from_elem(spec.shape(), value))
    }

    /// A raster whose pixels are produced by `f(col, row)`, row by row.
    #[must_use]
    pub fn from_fn(
        band: impl Into<String>,
        spec: GridSpec,
        mut f: impl FnMut(usize, usize) -> Option<f64>,
    ) -> Self {
        let pixels = Array2::from_shape_fn(spec.shape(), |(row, col)| f(col, row));
        Self::from_pixels(band, spec, pixels)
    }

    /// Wraps an array already shaped like `spec`.
    pub(crate) fn from_pixels(
        band: impl Into<String>,
        spec: GridSpec,
        pixels: Array2<Option<f64>>,
    ) -> Self {
        debug_assert_eq!(pixels.dim(), spec.shape());
        Self {
            band: band.into(),
            spec,
            pixels,
        }
    }

    /// Per-pixel area in square kilometres.
    #[must_use]
    pub fn pixel_area_km2(spec: GridSpec) -> Self {
        Self::from_fn("area_km2", spec, |_, row| Some(spec.pixel_area_km2(row)))
    }

    /// Band name.
    #[must_use]
    pub fn band(&self) -> &str {
        &self.band
    }

    /// Grid geometry.
    #[must_use]
    pub const fn spec(&self) -> &GridSpec {
        &self.spec
    }

    /// Pixel array, indexed `[[row, col]]`.
    #[must_use]
    pub const fn values(&self) -> &Array2<Option<f64>> {
        &self.pixels
    }

    /// Value at a pixel, `None` if unset or out of range.
    #[must_use]
    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        self.pixels.get((row, col)).copied().flatten()
    }

    /// Same pixels under a new band name.
    #[must_use]
    pub fn rename(&self, band: impl Into<String>) -> Self {
        Self::from_pixels(band, self.spec, self.pixels.clone())
    }

    /// Number of set pixels.
    #[must_use]
    pub fn count_set(&self) -> usize {
        self.pixels.iter().flatten().count()
    }

    /// Whether every pixel is unset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pixels.iter().all(Option::is_none)
    }

    /// Sum of all set pixels (zero when none are set).
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.pixels.iter().flatten().sum()
    }

    /// Applies `f` to every set pixel; unset pixels stay unset.
    #[must_use]
    pub fn map(&self, band: impl Into<String>, f: impl Fn(f64) -> Option<f64>) -> Self {
        Self::from_pixels(band, self.spec, self.pixels.mapv(|v| v.and_then(&f)))
    }

    /// Combines two rasters pixel by pixel, including unset pixels.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::GridMismatch`] if the grids differ.
    pub fn combine(
        &self,
        other: &Self,
        band: impl Into<String>,
        f: impl Fn(Option<f64>, Option<f64>) -> Option<f64>,
    ) -> Result<Self, RasterError> {
        self.check_grid(other)?;
        let pixels = Zip::from(&self.pixels)
            .and(&other.pixels)
            .map_collect(|a, b| f(*a, *b));
        Ok(Self::from_pixels(band, self.spec, pixels))
    }

    /// Combines two rasters where both pixels are set.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::GridMismatch`] if the grids differ.
    pub fn zip_with(
        &self,
        other: &Self,
        band: impl Into<String>,
        f: impl Fn(f64, f64) -> Option<f64>,
    ) -> Result<Self, RasterError> {
        self.combine(other, band, |a, b| match (a, b) {
            (Some(a), Some(b)) => f(a, b),
            _ => None,
        })
    }

    /// Pixel-wise product.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::GridMismatch`] if the grids differ.
    pub fn multiply(&self, other: &Self) -> Result<Self, RasterError> {
        self.zip_with(other, self.band.clone(), |a, b| Some(a * b))
    }

    /// Pixel-wise quotient; a zero divisor yields zero.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::GridMismatch`] if the grids differ.
    pub fn divide(&self, other: &Self) -> Result<Self, RasterError> {
        self.zip_with(other, self.band.clone(), |a, b| {
            Some(if b == 0.0 { 0.0 } else { a / b })
        })
    }

    /// Converts decibels to natural intensity: `10^(db / 10)`.
    #[must_use]
    pub fn db_to_natural(&self) -> Self {
        self.map(self.band.clone(), |db| Some(10f64.powf(db / 10.0)))
    }

    /// Converts natural intensity to decibels: `10 * log10(x)`.
    ///
    /// Non-positive intensities have no decibel value and become unset.
    #[must_use]
    pub fn natural_to_db(&self) -> Self {
        self.map(self.band.clone(), |x| (x > 0.0).then(|| 10.0 * x.log10()))
    }

    /// Replaces unset pixels with `value`.
    #[must_use]
    pub fn unmask(&self, value: f64) -> Self {
        Self::from_pixels(
            self.band.clone(),
            self.spec,
            self.pixels.mapv(|v| Some(v.unwrap_or(value))),
        )
    }

    /// `1.0` where the pixel exceeds `threshold`, `0.0` elsewhere.
    #[must_use]
    pub fn gt(&self, threshold: f64) -> Self {
        self.map(self.band.clone(), |v| Some(if v > threshold { 1.0 } else { 0.0 }))
    }

    /// `1.0` where the pixel is below `threshold`, `0.0` elsewhere.
    #[must_use]
    pub fn lt(&self, threshold: f64) -> Self {
        self.map(self.band.clone(), |v| Some(if v < threshold { 1.0 } else { 0.0 }))
    }

    /// `1.0` where the pixel is at or above `threshold`, `0.0` elsewhere.
    #[must_use]
    pub fn gte(&self, threshold: f64) -> Self {
        self.map(self.band.clone(), |v| Some(if v >= threshold { 1.0 } else { 0.0 }))
    }

    /// Unsets every zero pixel.
    #[must_use]
    pub fn self_mask(&self) -> Self {
        self.map(self.band.clone(), |v| (v != 0.0).then_some(v))
    }

    /// Sets pixels to `value` wherever `condition` is set and non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::GridMismatch`] if the grids differ.
    pub fn where_mask(&self, condition: &Self, value: f64) -> Result<Self, RasterError> {
        self.combine(condition, self.band.clone(), |v, c| match c {
            Some(c) if c != 0.0 && v.is_some() => Some(value),
            _ => v,
        })
    }

    /// Keeps pixels only where `mask` is set and non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::GridMismatch`] if the grids differ.
    pub fn update_mask(&self, mask: &Self) -> Result<Self, RasterError> {
        self.combine(mask, self.band.clone(), |v, m| match m {
            Some(m) if m != 0.0 => v,
            _ => None,
        })
    }

    /// Unsets pixels whose centre lies outside `region`.
    #[must_use]
    pub fn clip(&self, region: &dyn Region) -> Self {
        let spec = self.spec;
        let mut pixels = self.pixels.clone();
        for ((row, col), pixel) in pixels.indexed_iter_mut() {
            let (lon, lat) = spec.pixel_center(col, row);
            if pixel.is_some() && !region.contains(lon, lat) {
                *pixel = None;
            }
        }
        Self::from_pixels(self.band.clone(), spec, pixels)
    }

    pub(crate) fn check_grid(&self, other: &Self) -> Result<(), RasterError> {
        if self.spec == other.spec {
            Ok(())
        } else {
            Err(RasterError::GridMismatch {
                left: self.band.clone(),
                right: other.band.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use bekasi_flood_geography_models::AreaOfInterest;
    use bekasi_flood_spatial::AoiPolygon;

    use super::*;

    fn spec(width: usize, height: usize) -> GridSpec {
        GridSpec::new(0.0, 0.0, 0.001, width, height).unwrap()
    }

    #[test]
    fn rejects_wrong_buffer_length() {
        let err = Raster::new("vv", spec(2, 2), vec![Some(1.0); 3]).unwrap_err();
        assert!(matches!(
            err,
            RasterError::LengthMismatch {
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn pixels_are_row_major() {
        let raster = Raster::new(
            "vv",
            spec(3, 2),
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), None, Some(6.0)],
        )
        .unwrap();
        assert_eq!(raster.values().dim(), (2, 3));
        assert_eq!(raster.get(2, 0), Some(3.0));
        assert_eq!(raster.get(0, 1), Some(4.0));
        assert_eq!(raster.get(1, 1), None);
        assert_eq!(raster.get(3, 0), None);
        assert_eq!(raster.get(0, 2), None);
    }

    #[test]
    fn deserialization_checks_the_buffer_length() {
        let spec = spec(3, 3);
        let short = serde_json::json!({
            "band": "elevation",
            "spec": spec,
            "values": [1.0, 2.0],
        });
        let err = serde_json::from_value::<Raster>(short).unwrap_err();
        assert!(err.to_string().contains("has 2 values"), "{err}");

        let raster = Raster::filled("elevation", spec, Some(4.0));
        let value = serde_json::to_value(&raster).unwrap();
        assert_eq!(value["values"].as_array().unwrap().len(), 9);
        assert_eq!(serde_json::from_value::<Raster>(value).unwrap(), raster);
    }

    #[test]
    fn deserialization_rejects_empty_grids() {
        let data = serde_json::json!({
            "band": "elevation",
            "spec": { "west": 0.0, "north": 0.0, "pixelSizeDeg": 0.001, "width": 0, "height": 3 },
            "values": [],
        });
        assert!(serde_json::from_value::<Raster>(data).is_err());
    }

    #[test]
    fn decibel_conversion_round_trips() {
        let db = Raster::new("vv", spec(3, 1), vec![Some(-10.0), Some(0.0), None]).unwrap();
        let natural = db.db_to_natural();
        assert!((natural.get(0, 0).unwrap() - 0.1).abs() < 1e-12);
        assert!((natural.get(1, 0).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(natural.get(2, 0), None);

        let back = natural.natural_to_db();
        assert!((back.get(0, 0).unwrap() + 10.0).abs() < 1e-9);
    }

    #[test]
    fn non_positive_intensity_has_no_decibel_value() {
        let natural = Raster::new("vv", spec(2, 1), vec![Some(0.0), Some(-1.0)]).unwrap();
        assert!(natural.natural_to_db().is_empty());
    }

    #[test]
    fn division_by_zero_yields_zero() {
        let a = Raster::filled("a", spec(1, 1), Some(3.0));
        let b = Raster::filled("b", spec(1, 1), Some(0.0));
        assert_eq!(a.divide(&b).unwrap().get(0, 0), Some(0.0));
    }

    #[test]
    fn grid_mismatch_is_reported() {
        let a = Raster::filled("a", spec(2, 2), Some(1.0));
        let b = Raster::filled("b", spec(3, 2), Some(1.0));
        assert!(matches!(
            a.multiply(&b),
            Err(RasterError::GridMismatch { .. })
        ));
    }

    #[test]
    fn masking_operators_distinguish_unset_from_zero() {
        let values = Raster::new(
            "flood",
            spec(4, 1),
            vec![Some(1.0), Some(1.0), Some(0.0), None],
        )
        .unwrap();
        let condition =
            Raster::new("cond", spec(4, 1), vec![Some(1.0), None, Some(1.0), Some(1.0)]).unwrap();

        let replaced = values.where_mask(&condition, 0.0).unwrap();
        assert_eq!(
            replaced.values().row(0).to_vec(),
            [Some(0.0), Some(1.0), Some(0.0), None]
        );

        let updated = values.update_mask(&condition).unwrap();
        assert_eq!(
            updated.values().row(0).to_vec(),
            [Some(1.0), None, Some(0.0), None]
        );

        assert_eq!(values.self_mask().count_set(), 2);
        assert_eq!(values.unmask(0.0).count_set(), 4);
    }

    #[test]
    fn clip_unsets_pixels_outside_region() {
        let raster = Raster::filled("vv", spec(4, 4), Some(1.0));
        let area = AreaOfInterest::rectangle("half", 0.0, -0.004, 0.002, 0.0);
        let aoi = AoiPolygon::from_area(&area).unwrap();
        let clipped = raster.clip(&aoi);
        assert_eq!(clipped.count_set(), 8);
        assert_eq!(clipped.get(0, 3), Some(1.0));
        assert_eq!(clipped.get(3, 0), None);
    }
}
