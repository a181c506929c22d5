//! Viewport transform between coordinate regions and map rects
//!
//! Both directions are pure functions of their inputs and a [`ProjectionContext`].
//! The projection is spherical Web Mercator laid onto a square world of
//! `world_size` map points with its north-west corner at `origin`.

use crate::{CoordinateRegion, CoordinateSpan, GeoCoordinate, MapPoint, MapRect, Result};
use std::f64::consts::PI;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Side length of the default world in map points (2^28)
pub const DEFAULT_WORLD_SIZE: f64 = 268_435_456.0;

/// Scale and origin of the planar map space
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProjectionContext {
    /// Width and height of the whole world in map points
    pub world_size: f64,
    /// Map point of the world's north-west corner
    pub origin: MapPoint,
}

impl Default for ProjectionContext {
    fn default() -> Self {
        Self {
            world_size: DEFAULT_WORLD_SIZE,
            origin: MapPoint::new(0.0, 0.0),
        }
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ProjectionContext {
    pub fn new(world_size: f64, origin: MapPoint) -> Self {
        Self { world_size, origin }
    }

    #[inline(always)]
    fn longitude_to_x(&self, longitude: f64) -> f64 {
        self.origin.x + (longitude + 180.0) / 360.0 * self.world_size
    }

    #[inline(always)]
    fn latitude_to_y(&self, latitude: f64) -> f64 {
        // Clamp latitude to valid Web Mercator range
        let lat_rad = latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let northing = (PI / 4.0 + lat_rad / 2.0).tan().ln();
        self.origin.y + (0.5 - northing / (2.0 * PI)) * self.world_size
    }

    #[inline(always)]
    fn x_to_longitude(&self, x: f64) -> f64 {
        (x - self.origin.x) / self.world_size * 360.0 - 180.0
    }

    #[inline(always)]
    fn y_to_latitude(&self, y: f64) -> f64 {
        let northing = PI * (1.0 - 2.0 * (y - self.origin.y) / self.world_size);
        (2.0 * northing.exp().atan() - PI / 2.0).to_degrees()
    }

    /// Project a coordinate onto the map plane
    pub fn project(&self, coordinate: GeoCoordinate) -> MapPoint {
        MapPoint::new(
            self.longitude_to_x(coordinate.longitude),
            self.latitude_to_y(coordinate.latitude),
        )
    }

    /// Inverse of [`project`](Self::project) for points inside the world
    pub fn unproject(&self, point: MapPoint) -> GeoCoordinate {
        GeoCoordinate::new(
            self.y_to_latitude(point.y),
            wrap_longitude(self.x_to_longitude(point.x)),
        )
    }
}

/// Bring a longitude back into [-180, 180], leaving in-range values untouched
#[inline]
fn wrap_longitude(longitude: f64) -> f64 {
    if (-180.0..=180.0).contains(&longitude) {
        longitude
    } else {
        (longitude + 180.0).rem_euclid(360.0) - 180.0
    }
}

/// Convert a region to the map rect covering it
///
/// # Errors
/// `InvalidGeometry` if the span is negative or non-finite or the center is out of range.
pub fn region_to_rect(region: &CoordinateRegion, context: &ProjectionContext) -> Result<MapRect> {
    #[cfg(feature = "profiling")]
    profiling::scope!("transform::region_to_rect");
    region.validate()?;

    let CoordinateRegion { center, span } = *region;
    let west = center.longitude - span.longitude_delta / 2.0;
    let north = center.latitude + span.latitude_delta / 2.0;
    let south = center.latitude - span.latitude_delta / 2.0;

    let x = context.longitude_to_x(west);
    let y = context.latitude_to_y(north);
    let width = span.longitude_delta / 360.0 * context.world_size;
    let height = context.latitude_to_y(south) - y;

    Ok(MapRect::new(x, y, width, height))
}

/// Convert a map rect to the region it displays
///
/// # Errors
/// `InvalidGeometry` if the size is negative or any component is non-finite.
pub fn rect_to_region(rect: &MapRect, context: &ProjectionContext) -> Result<CoordinateRegion> {
    #[cfg(feature = "profiling")]
    profiling::scope!("transform::rect_to_region");
    rect.validate()?;

    let west = context.x_to_longitude(rect.origin.x);
    let longitude_delta = rect.width / context.world_size * 360.0;
    let north = context.y_to_latitude(rect.origin.y);
    let south = context.y_to_latitude(rect.max_y());

    Ok(CoordinateRegion::new(
        GeoCoordinate::new(
            (north + south) / 2.0,
            wrap_longitude(west + longitude_delta / 2.0),
        ),
        CoordinateSpan::new(north - south, longitude_delta),
    ))
}
