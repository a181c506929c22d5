//! Renderer side of the map view on top of walkers
//!
//! [`WalkersRenderer`] receives each frame from the map view, keeps a drawable [`Scene`]
//! for the plugin and moves the walkers camera when the map view asks for it. In the
//! other direction, [`screen_viewport_to_rect`] turns what walkers displays into the map
//! rect reported with gestures.

use crate::app::state::ViewerAnnotation;
use mapview_lib::{
    Anchor, AnnotationContent, AnnotationForm, GeoCoordinate, InteractionModes, MapPoint,
    MapRect, ProjectionContext, RenderFrame, Renderer, TrackingMode,
};
use walkers::{MapMemory, Position};

/// Walkers tiles are 256 px wide at zoom 0
const TILE_SIZE: f64 = 256.0;

/// Highest zoom the OpenStreetMap tile server provides
pub const MAX_ZOOM: f64 = 19.0;

/// One annotation ready to paint
#[derive(Debug, Clone)]
pub struct Drawable {
    pub position: Position,
    pub anchor: Anchor,
    pub form: AnnotationForm,
    pub label: Option<String>,
}

/// Everything the plugin paints, as last handed over by the map view
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub drawables: Vec<Drawable>,
    pub user_location: Option<Position>,
    pub tracking_mode: TrackingMode,
    pub interaction_modes: InteractionModes,
}

/// Zoom level at which `longitude_delta` degrees fill `screen_width` pixels
pub fn zoom_for_span(longitude_delta: f64, screen_width: f32) -> f64 {
    if longitude_delta <= 0.0 || screen_width <= 0.0 {
        return MAX_ZOOM;
    }
    let world_width = screen_width as f64 * 360.0 / longitude_delta;
    (world_width / TILE_SIZE).log2().clamp(0.0, MAX_ZOOM)
}

/// Map rect spanned by the screen corners, given as unprojected positions
pub fn screen_viewport_to_rect(
    north_west: Position,
    south_east: Position,
    context: &ProjectionContext,
) -> MapRect {
    let min = context.project(GeoCoordinate::new(north_west.y(), north_west.x()));
    let max = context.project(GeoCoordinate::new(south_east.y(), south_east.x()));
    MapRect {
        origin: MapPoint::new(min.x.min(max.x), min.y.min(max.y)),
        width: (max.x - min.x).abs(),
        height: (max.y - min.y).abs(),
    }
}

/// Map view renderer that feeds a walkers map
pub struct WalkersRenderer<'a> {
    pub memory: &'a mut MapMemory,
    pub scene: &'a mut Scene,
    /// Width of the map widget last frame, for span to zoom conversion
    pub screen_width: f32,
}

impl Renderer<String, ViewerAnnotation> for WalkersRenderer<'_> {
    fn render(&mut self, frame: &RenderFrame<'_, String, ViewerAnnotation>) {
        profiling::scope!("WalkersRenderer::render");

        if !frame.diff.is_empty() {
            tracing::debug!(
                "Annotations: {} added, {} updated, {} removed",
                frame.diff.added.len(),
                frame.diff.updated.len(),
                frame.diff.removed.len()
            );
            self.scene.drawables = frame
                .placements
                .iter()
                .map(|placement| Drawable {
                    position: walkers::lat_lon(
                        placement.coordinate.latitude,
                        placement.coordinate.longitude,
                    ),
                    anchor: placement.anchor,
                    form: placement.content.form(),
                    label: placement.content.content().cloned(),
                })
                .collect();
        }

        if frame.camera_changed {
            let center = walkers::lat_lon(
                frame.region.center.latitude,
                frame.region.center.longitude,
            );
            let zoom = zoom_for_span(frame.region.span.longitude_delta, self.screen_width);
            self.memory.center_at(center);
            if self.memory.set_zoom(zoom).is_err() {
                tracing::warn!("Cannot apply zoom {zoom:.2}");
            }
            tracing::trace!("Camera moved to {center:?} at zoom {zoom:.2}");
        }

        self.scene.user_location = frame
            .user_location
            .map(|fix| walkers::lat_lon(fix.latitude, fix.longitude));
        self.scene.tracking_mode = frame.tracking_mode;
        self.scene.interaction_modes = frame.interaction_modes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_for_span() {
        // The whole world in one tile
        assert!((zoom_for_span(360.0, 256.0) - 0.0).abs() < 1e-9);
        assert!((zoom_for_span(360.0, 512.0) - 1.0).abs() < 1e-9);
        assert!((zoom_for_span(180.0, 512.0) - 2.0).abs() < 1e-9);

        // Degenerate spans fall back to the closest zoom
        assert_eq!(zoom_for_span(0.0, 800.0), MAX_ZOOM);
        assert_eq!(zoom_for_span(1e-12, 800.0), MAX_ZOOM);
        assert_eq!(zoom_for_span(1000.0, 10.0), 0.0);
    }

    #[test]
    fn test_screen_viewport_to_rect() {
        let context = ProjectionContext::default();
        let rect = screen_viewport_to_rect(
            walkers::lat_lon(10.0, -10.0),
            walkers::lat_lon(-10.0, 10.0),
            &context,
        );
        assert!(rect.width > 0.0);
        assert!(rect.height > 0.0);

        let region = mapview_lib::transform::rect_to_region(&rect, &context).unwrap();
        assert!(region.center.approx_eq(&GeoCoordinate::new(0.0, 0.0), 1e-9));
        assert!((region.span.longitude_delta - 20.0).abs() < 1e-9);
    }
}
