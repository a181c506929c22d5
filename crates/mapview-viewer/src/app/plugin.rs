//! Walkers plugin that paints the map view's annotations and user location
//!
//! The plugin also reports back which geographic area walkers actually displayed, which
//! is what gestures hand to the map view.

use crate::app::renderer::{Drawable, Scene};
use egui::{Align2, Color32, FontId, Pos2, Rect, Shape, Stroke, Vec2};
use mapview_lib::{AnnotationForm, Tint, TrackingMode};
use std::sync::Arc;
use tokio::sync::RwLock;
use walkers::{Plugin, Position, Projector};

/// Default fill when an annotation carries no tint
const DEFAULT_TINT: Color32 = Color32::from_rgb(220, 60, 60);

const USER_LOCATION_COLOR: Color32 = Color32::from_rgb(30, 120, 255);

/// What walkers displayed last frame
#[derive(Debug, Clone, Copy)]
pub struct ScreenViewport {
    pub north_west: Position,
    pub south_east: Position,
    /// Width of the map widget in points
    pub width: f32,
}

/// Plugin drawing one frame of the scene
pub struct AnnotationPlugin {
    scene: Scene,
    displayed: Arc<RwLock<Option<ScreenViewport>>>,
}

impl AnnotationPlugin {
    pub fn new(scene: Scene, displayed: Arc<RwLock<Option<ScreenViewport>>>) -> Self {
        Self { scene, displayed }
    }
}

fn tint_color(tint: Option<Tint>) -> Color32 {
    match tint {
        Some(t) => Color32::from_rgba_unmultiplied(t.r, t.g, t.b, t.a),
        None => DEFAULT_TINT,
    }
}

/// Top-left corner of a `size` box whose anchor point lies on `at`
fn anchored(at: Pos2, size: Vec2, drawable: &Drawable) -> Rect {
    let offset = Vec2::new(
        size.x * drawable.anchor.x as f32,
        size.y * drawable.anchor.y as f32,
    );
    Rect::from_min_size(at - offset, size)
}

fn paint_drawable(painter: &egui::Painter, at: Pos2, drawable: &Drawable) {
    match drawable.form {
        AnnotationForm::Marker { tint } => {
            // Balloon: round head with a point at the bottom
            let rect = anchored(at, Vec2::new(18.0, 26.0), drawable);
            let head = Pos2::new(rect.center().x, rect.min.y + 9.0);
            let color = tint_color(tint);
            painter.add(Shape::convex_polygon(
                vec![
                    Pos2::new(head.x - 7.5, head.y + 3.0),
                    Pos2::new(head.x + 7.5, head.y + 3.0),
                    Pos2::new(rect.center().x, rect.max.y),
                ],
                color,
                Stroke::NONE,
            ));
            painter.circle_filled(head, 9.0, color);
            painter.circle_filled(head, 3.5, Color32::WHITE);
        }
        AnnotationForm::Pin { tint } => {
            let rect = anchored(at, Vec2::new(12.0, 24.0), drawable);
            let head = Pos2::new(rect.center().x, rect.min.y + 6.0);
            painter.line_segment(
                [head, Pos2::new(rect.center().x, rect.max.y)],
                Stroke::new(2.0, Color32::from_gray(60)),
            );
            painter.circle_filled(head, 6.0, tint_color(tint));
            painter.circle_stroke(head, 6.0, Stroke::new(1.0, Color32::from_black_alpha(120)));
        }
        AnnotationForm::Custom => {
            let text = drawable.label.as_deref().unwrap_or("?");
            let galley = painter.layout_no_wrap(
                text.to_owned(),
                FontId::proportional(13.0),
                Color32::BLACK,
            );
            let size = galley.size() + Vec2::new(10.0, 6.0);
            let rect = anchored(at, size, drawable);
            painter.rect_filled(rect, 4.0, Color32::from_white_alpha(230));
            painter.rect_stroke(
                rect,
                4.0,
                Stroke::new(1.0, Color32::from_gray(90)),
                egui::StrokeKind::Inside,
            );
            painter.galley(rect.min + Vec2::new(5.0, 3.0), galley, Color32::BLACK);
        }
    }
}

fn paint_user_location(painter: &egui::Painter, at: Pos2, tracking: TrackingMode) {
    painter.circle_filled(at, 14.0, USER_LOCATION_COLOR.gamma_multiply(0.2));
    painter.circle_filled(at, 7.0, Color32::WHITE);
    painter.circle_filled(at, 5.0, USER_LOCATION_COLOR);
    if tracking == TrackingMode::Follow {
        painter.circle_stroke(at, 14.0, Stroke::new(1.5, USER_LOCATION_COLOR));
    }
}

impl Plugin for AnnotationPlugin {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        response: &egui::Response,
        projector: &Projector,
        _map_memory: &walkers::MapMemory,
    ) {
        profiling::scope!("AnnotationPlugin::run");

        let painter = ui.painter().with_clip_rect(response.rect);
        let viewport_rect = response.rect;

        let north_west = projector.unproject(viewport_rect.min.to_vec2());
        let south_east = projector.unproject(viewport_rect.max.to_vec2());
        if let Ok(mut displayed) = self.displayed.try_write() {
            *displayed = Some(ScreenViewport {
                north_west,
                south_east,
                width: viewport_rect.width(),
            });
        }

        {
            profiling::scope!("paint_annotations");
            for drawable in &self.scene.drawables {
                let screen = projector.project(drawable.position);
                let at = Pos2::new(screen.x, screen.y);
                // Skip what is clearly off screen, with room for labels
                if !viewport_rect.expand(200.0).contains(at) {
                    continue;
                }
                paint_drawable(&painter, at, drawable);
            }
        }

        if let Some(position) = self.scene.user_location {
            let screen = projector.project(position);
            paint_user_location(
                &painter,
                Pos2::new(screen.x, screen.y),
                self.scene.tracking_mode,
            );
        }

        if !self.scene.interaction_modes.contains(mapview_lib::InteractionModes::ALL) {
            painter.text(
                viewport_rect.left_top() + Vec2::new(8.0, 8.0),
                Align2::LEFT_TOP,
                format!("Gestures: {:?}", self.scene.interaction_modes),
                FontId::proportional(11.0),
                Color32::from_black_alpha(180),
            );
        }
    }
}
