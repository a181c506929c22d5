//! Geographic and planar value types
//!
//! Coordinates are in degrees; map points and map rects are in the units of a
//! [`ProjectionContext`](crate::ProjectionContext), with the origin at the north-west
//! corner of the world and y growing southwards.

use crate::{MapViewError, Result};
use geo::{Coord, Point, Rect};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Angular extent of a region in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoordinateSpan {
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

/// A region described by its center and angular span
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoordinateRegion {
    pub center: GeoCoordinate,
    pub span: CoordinateSpan,
}

/// A point in projected map units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MapPoint {
    pub x: f64,
    pub y: f64,
}

/// A rectangle in projected map units (origin is the north-west corner)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MapRect {
    pub origin: MapPoint,
    pub width: f64,
    pub height: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl GeoCoordinate {
    #[inline]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite and inside their degree ranges
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Check the coordinate, naming it `what` in the error
    pub fn validate(&self, what: &str) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(MapViewError::InvalidGeometry(format!(
                "{what} ({}, {}) is outside [-90, 90] x [-180, 180]",
                self.latitude, self.longitude
            )))
        }
    }

    /// Component-wise comparison with an absolute tolerance in degrees
    pub fn approx_eq(&self, other: &GeoCoordinate, epsilon: f64) -> bool {
        (self.latitude - other.latitude).abs() <= epsilon
            && (self.longitude - other.longitude).abs() <= epsilon
    }
}

impl From<GeoCoordinate> for Point<f64> {
    fn from(coordinate: GeoCoordinate) -> Self {
        Point::new(coordinate.longitude, coordinate.latitude)
    }
}

impl From<Point<f64>> for GeoCoordinate {
    fn from(point: Point<f64>) -> Self {
        GeoCoordinate::new(point.y(), point.x())
    }
}

impl CoordinateSpan {
    #[inline]
    pub const fn new(latitude_delta: f64, longitude_delta: f64) -> Self {
        Self {
            latitude_delta,
            longitude_delta,
        }
    }

    /// Spans must be finite and non-negative; zero is legal
    pub fn validate(&self) -> Result<()> {
        let valid = |delta: f64| delta.is_finite() && delta >= 0.0;
        if valid(self.latitude_delta) && valid(self.longitude_delta) {
            Ok(())
        } else {
            Err(MapViewError::InvalidGeometry(format!(
                "span ({}, {}) must be finite and non-negative",
                self.latitude_delta, self.longitude_delta
            )))
        }
    }
}

impl CoordinateRegion {
    #[inline]
    pub const fn new(center: GeoCoordinate, span: CoordinateSpan) -> Self {
        Self { center, span }
    }

    pub fn validate(&self) -> Result<()> {
        self.center.validate("region center")?;
        self.span.validate()
    }

    /// Same span, new center
    #[inline]
    pub fn recentered(&self, center: GeoCoordinate) -> Self {
        Self {
            center,
            span: self.span,
        }
    }

    pub fn approx_eq(&self, other: &CoordinateRegion, epsilon: f64) -> bool {
        self.center.approx_eq(&other.center, epsilon)
            && (self.span.latitude_delta - other.span.latitude_delta).abs() <= epsilon
            && (self.span.longitude_delta - other.span.longitude_delta).abs() <= epsilon
    }
}

impl MapPoint {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl MapRect {
    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: MapPoint { x, y },
            width,
            height,
        }
    }

    /// Dimensions must be finite and non-negative; the origin must be finite
    pub fn validate(&self) -> Result<()> {
        let finite = self.origin.x.is_finite()
            && self.origin.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite();
        if finite && self.width >= 0.0 && self.height >= 0.0 {
            Ok(())
        } else {
            Err(MapViewError::InvalidGeometry(format!(
                "map rect ({}, {}, {}x{}) must be finite with non-negative size",
                self.origin.x, self.origin.y, self.width, self.height
            )))
        }
    }

    #[inline]
    pub fn max_x(&self) -> f64 {
        self.origin.x + self.width
    }

    #[inline]
    pub fn max_y(&self) -> f64 {
        self.origin.y + self.height
    }

    #[inline]
    pub fn mid_x(&self) -> f64 {
        self.origin.x + self.width / 2.0
    }

    #[inline]
    pub fn mid_y(&self) -> f64 {
        self.origin.y + self.height / 2.0
    }

    #[inline]
    pub fn center(&self) -> MapPoint {
        MapPoint::new(self.mid_x(), self.mid_y())
    }

    /// Same size, centered on `center`
    pub fn centered_at(&self, center: MapPoint) -> Self {
        Self::new(
            center.x - self.width / 2.0,
            center.y - self.height / 2.0,
            self.width,
            self.height,
        )
    }

    /// Convert to a `geo::Rect` in the same units
    pub fn to_geo_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.origin.x,
                y: self.origin.y,
            },
            Coord {
                x: self.max_x(),
                y: self.max_y(),
            },
        )
    }

    pub fn approx_eq(&self, other: &MapRect, epsilon: f64) -> bool {
        (self.origin.x - other.origin.x).abs() <= epsilon
            && (self.origin.y - other.origin.y).abs() <= epsilon
            && (self.width - other.width).abs() <= epsilon
            && (self.height - other.height).abs() <= epsilon
    }
}

impl From<Rect<f64>> for MapRect {
    fn from(rect: Rect<f64>) -> Self {
        MapRect::new(rect.min().x, rect.min().y, rect.width(), rect.height())
    }
}
