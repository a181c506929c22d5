//! Renderer collaborator: what the map view hands over each frame and what comes back

use crate::{
    AnnotationDiff, AnnotationPlacement, CoordinateRegion, GeoCoordinate, InteractionModes,
    MapRect, TrackingMode,
};

/// Which viewport-changing gesture the user performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureKind {
    Pan,
    Zoom,
}

/// Intermediate frame or the end of a discrete gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GesturePhase {
    Changed,
    Ended,
}

/// A user-driven viewport change reported by the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureEvent {
    pub kind: GestureKind,
    pub phase: GesturePhase,
    /// Viewport the renderer displays after this step of the gesture
    pub viewport: MapRect,
}

impl GestureEvent {
    pub fn new(kind: GestureKind, phase: GesturePhase, viewport: MapRect) -> Self {
        Self {
            kind,
            phase,
            viewport,
        }
    }

    pub fn pan(phase: GesturePhase, viewport: MapRect) -> Self {
        Self::new(GestureKind::Pan, phase, viewport)
    }

    pub fn zoom(phase: GesturePhase, viewport: MapRect) -> Self {
        Self::new(GestureKind::Zoom, phase, viewport)
    }

    #[inline]
    pub fn is_end(&self) -> bool {
        self.phase == GesturePhase::Ended
    }
}

/// Everything the renderer needs for one frame
#[derive(Debug)]
pub struct RenderFrame<'a, K, A> {
    /// Viewport to display, in map points
    pub viewport: MapRect,
    /// The same viewport as a coordinate region
    pub region: CoordinateRegion,
    /// The camera must be moved to `viewport` (the change did not come from the renderer)
    pub camera_changed: bool,
    /// Annotation changes since the previous frame
    pub diff: &'a AnnotationDiff<K, A>,
    /// Full annotation snapshot, for renderers that redraw everything
    pub placements: &'a [AnnotationPlacement<K, A>],
    /// Gestures the renderer may turn into viewport changes
    pub interaction_modes: InteractionModes,
    /// Authorized user location, when it should be displayed
    pub user_location: Option<GeoCoordinate>,
    pub tracking_mode: TrackingMode,
}

/// Draws the map
pub trait Renderer<K, A> {
    fn render(&mut self, frame: &RenderFrame<'_, K, A>);
}
