#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Vector regions used to clip and summarise rasters.
//!
//! Provides the [`Region`] trait plus its two implementations: the study
//! polygon ([`AoiPolygon`]) and the circular sampling buffer around a
//! subarea point ([`PointBuffer`]). Rasters ask a region whether a pixel
//! centre falls inside it; the bounding box lets them skip whole rows.

use bekasi_flood_geography_models::{AreaOfInterest, Subarea};
use geo::{BoundingRect, Contains, Distance, Haversine, LineString, MultiPolygon, Point, Polygon};
use geojson::GeoJson;
use thiserror::Error;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Metres per degree of latitude on the mean sphere.
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// Errors raised while building regions.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// The polygon ring cannot form an area.
    #[error("area of interest '{name}' needs at least 3 vertices, got {count}")]
    DegenerateRing {
        /// Region name.
        name: String,
        /// Number of vertices supplied.
        count: usize,
    },

    /// `GeoJSON` could not be parsed into a polygon.
    #[error("GeoJSON error: {message}")]
    GeoJson {
        /// Description of what went wrong.
        message: String,
    },
}

/// Axis-aligned lon/lat bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum longitude.
    pub west: f64,
    /// Minimum latitude.
    pub south: f64,
    /// Maximum longitude.
    pub east: f64,
    /// Maximum latitude.
    pub north: f64,
}

impl Bounds {
    /// Whether the latitude lies within the box (inclusive).
    #[must_use]
    pub fn covers_lat(&self, lat: f64) -> bool {
        lat >= self.south && lat <= self.north
    }

    /// Whether the point lies within the box (inclusive).
    #[must_use]
    pub fn covers(&self, lon: f64, lat: f64) -> bool {
        self.covers_lat(lat) && lon >= self.west && lon <= self.east
    }
}

/// A vector region that can answer point-membership queries.
pub trait Region {
    /// Whether the given lon/lat point lies inside the region.
    fn contains(&self, lon: f64, lat: f64) -> bool;

    /// Bounding box enclosing the region.
    fn bounds(&self) -> Bounds;
}

/// The study polygon, indexed for point-in-polygon lookups.
#[derive(Debug, Clone)]
pub struct AoiPolygon {
    name: String,
    polygon: MultiPolygon<f64>,
    bounds: Bounds,
}

impl AoiPolygon {
    /// Builds the polygon from configured reference data.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::DegenerateRing`] if the ring has fewer than
    /// three vertices.
    pub fn from_area(area: &AreaOfInterest) -> Result<Self, SpatialError> {
        if area.ring.len() < 3 {
            return Err(SpatialError::DegenerateRing {
                name: area.name.clone(),
                count: area.ring.len(),
            });
        }

        let exterior: LineString<f64> = area
            .ring
            .iter()
            .map(|[lon, lat]| (*lon, *lat))
            .collect::<Vec<_>>()
            .into();
        let polygon = MultiPolygon(vec![Polygon::new(exterior, vec![])]);

        Ok(Self::from_multipolygon(area.name.clone(), polygon))
    }

    /// Parses a `GeoJSON` document into a polygon.
    ///
    /// Accepts a bare geometry, a feature, or a feature collection (the
    /// first feature with a geometry is used).
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::GeoJson`] if the document is invalid or has
    /// no polygonal geometry.
    pub fn from_geojson(name: &str, geojson_str: &str) -> Result<Self, SpatialError> {
        let polygon =
            parse_geojson_to_multipolygon(geojson_str).ok_or_else(|| SpatialError::GeoJson {
                message: format!("no Polygon or MultiPolygon geometry found for '{name}'"),
            })?;
        log::info!(
            "Loaded area of interest '{name}' with {} polygon(s)",
            polygon.0.len()
        );
        Ok(Self::from_multipolygon(name.to_string(), polygon))
    }

    fn from_multipolygon(name: String, polygon: MultiPolygon<f64>) -> Self {
        let bounds = compute_bounds(&polygon);
        Self {
            name,
            polygon,
            bounds,
        }
    }

    /// Region name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Region for AoiPolygon {
    fn contains(&self, lon: f64, lat: f64) -> bool {
        self.bounds.covers(lon, lat) && self.polygon.contains(&Point::new(lon, lat))
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }
}

/// A circular sampling region of fixed radius around a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointBuffer {
    lon: f64,
    lat: f64,
    radius_m: f64,
}

impl PointBuffer {
    /// Creates a buffer of `radius_m` metres around `lon`/`lat`.
    #[must_use]
    pub const fn new(lon: f64, lat: f64, radius_m: f64) -> Self {
        Self { lon, lat, radius_m }
    }

    /// Creates a buffer around a subarea point.
    #[must_use]
    pub const fn around(subarea: &Subarea, radius_m: f64) -> Self {
        Self::new(subarea.lon, subarea.lat, radius_m)
    }

    /// Buffer radius in metres.
    #[must_use]
    pub const fn radius_m(&self) -> f64 {
        self.radius_m
    }
}

impl Region for PointBuffer {
    fn contains(&self, lon: f64, lat: f64) -> bool {
        haversine_m(self.lon, self.lat, lon, lat) <= self.radius_m
    }

    fn bounds(&self) -> Bounds {
        let dlat = self.radius_m / METERS_PER_DEGREE;
        let cos_lat = self.lat.to_radians().cos().abs().max(1e-9);
        let dlon = dlat / cos_lat;
        Bounds {
            west: self.lon - dlon,
            south: self.lat - dlat,
            east: self.lon + dlon,
            north: self.lat + dlat,
        }
    }
}

/// Great-circle distance between two lon/lat points, in metres, on geo's
/// mean-radius sphere.
#[must_use]
pub fn haversine_m(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    Haversine.distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}

/// Parse a `GeoJSON` string into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn parse_geojson_to_multipolygon(geojson_str: &str) -> Option<MultiPolygon<f64>> {
    let geojson: GeoJson = geojson_str.parse().ok()?;
    let geometry = match geojson {
        GeoJson::Geometry(geom) => Some(geom),
        GeoJson::Feature(feature) => feature.geometry,
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .find_map(|feature| feature.geometry),
    }?;

    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Compute the bounding box for a [`MultiPolygon`].
fn compute_bounds(mp: &MultiPolygon<f64>) -> Bounds {
    mp.bounding_rect().map_or(
        Bounds {
            west: 0.0,
            south: 0.0,
            east: 0.0,
            north: 0.0,
        },
        |rect| Bounds {
            west: rect.min().x,
            south: rect.min().y,
            east: rect.max().x,
            north: rect.max().y,
        },
    )
}
