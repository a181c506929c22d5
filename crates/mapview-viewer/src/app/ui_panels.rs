//! UI panels for the application
//!
//! The sidebar edits the state bound to the map view from the outside, the way any other
//! owner of that state would: writes go through the bindings and the map view picks them
//! up on its next cycle.

use crate::app::location::LocationFeed;
use crate::app::state::{AppState, ViewerMapView, ViewportSource};
use egui::{Color32, RichText, Ui};
use mapview_lib::{InteractionModes, LocationUnavailable, TrackingMode, TrackingStatus};

/// Render the sidebar toggle button (overlaid on top-right of map)
pub fn sidebar_toggle_button(ui: &mut Ui, state: &mut AppState) {
    let button_size = egui::vec2(40.0, 40.0);
    let margin = 10.0;

    let rect = ui.max_rect();
    let button_pos = rect.right_top() + egui::vec2(-button_size.x - margin, margin);
    let button_rect = egui::Rect::from_min_size(button_pos, button_size);

    let response = ui.allocate_rect(button_rect, egui::Sense::click());
    if response.clicked() {
        state.ui_settings.sidebar_open = !state.ui_settings.sidebar_open;
    }

    let bg_color = if response.hovered() {
        ui.visuals().widgets.hovered.bg_fill
    } else {
        ui.visuals().widgets.inactive.bg_fill
    };
    ui.painter().rect_filled(button_rect, 5.0, bg_color);

    let icon = if state.ui_settings.sidebar_open {
        "✕"
    } else {
        "☰"
    };
    ui.painter().text(
        button_rect.center(),
        egui::Align2::CENTER_CENTER,
        icon,
        egui::FontId::proportional(20.0),
        ui.visuals().text_color(),
    );
}

/// Render the main sidebar
pub fn render_sidebar(
    ctx: &egui::Context,
    state: &mut AppState,
    view: &mut ViewerMapView,
    feed: Option<&LocationFeed>,
) {
    if !state.ui_settings.sidebar_open {
        return;
    }

    egui::SidePanel::right("main_sidebar")
        .default_width(300.0)
        .min_width(260.0)
        .max_width(450.0)
        .resizable(true)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    render_viewport_section(ui, state, view);
                    ui.separator();
                    render_tracking_section(ui, state, view, feed);
                    ui.separator();
                    render_gestures_section(ui, view);
                    ui.separator();
                    render_stats_section(ui, state, view);
                    ui.separator();
                    render_files_section(ui, state);
                });
        });
}

/// Bound viewport editor
fn render_viewport_section(ui: &mut Ui, state: &mut AppState, view: &ViewerMapView) {
    let bound_as = match state.viewport {
        ViewportSource::Region(_) => "coordinate region",
        ViewportSource::Rect(_) => "map rect",
    };
    ui.label(RichText::new("🗺 Viewport").strong());
    ui.label(RichText::new(format!("Bound as a {bound_as}")).small());
    ui.add_space(4.0);

    let draft = &mut state.region_draft;
    egui::Grid::new("viewport_grid")
        .num_columns(2)
        .spacing([12.0, 4.0])
        .show(ui, |ui| {
            ui.label("Latitude:");
            ui.add(
                egui::DragValue::new(&mut draft.center.latitude)
                    .speed(0.001)
                    .range(-90.0..=90.0)
                    .max_decimals(6),
            );
            ui.end_row();

            ui.label("Longitude:");
            ui.add(
                egui::DragValue::new(&mut draft.center.longitude)
                    .speed(0.001)
                    .range(-180.0..=180.0)
                    .max_decimals(6),
            );
            ui.end_row();

            ui.label("Latitude span:");
            ui.add(
                egui::DragValue::new(&mut draft.span.latitude_delta)
                    .speed(0.001)
                    .range(0.0..=180.0)
                    .max_decimals(6),
            );
            ui.end_row();

            ui.label("Longitude span:");
            ui.add(
                egui::DragValue::new(&mut draft.span.longitude_delta)
                    .speed(0.001)
                    .range(0.0..=360.0)
                    .max_decimals(6),
            );
            ui.end_row();
        });

    ui.horizontal(|ui| {
        if ui.button("Apply").clicked() {
            let context = view.config().projection;
            match state.viewport.write_region(state.region_draft, &context) {
                Ok(()) => tracing::debug!("Viewport set from the sidebar"),
                Err(e) => {
                    tracing::warn!("Rejected viewport: {e}");
                    state.stats.last_error = Some(e.to_string());
                }
            }
        }
        if ui.button("Use current view").clicked() {
            state.region_draft = view.viewport_region();
        }
    });
}

fn tracking_status_text(status: TrackingStatus) -> (&'static str, Color32) {
    match status {
        TrackingStatus::Idle => ("Idle", Color32::GRAY),
        TrackingStatus::Following => ("Following", Color32::GREEN),
        TrackingStatus::Stalled(LocationUnavailable::NoFix) => {
            ("Waiting for a location fix", Color32::YELLOW)
        }
        TrackingStatus::Stalled(LocationUnavailable::NotAuthorized) => {
            ("Location not authorized", Color32::RED)
        }
    }
}

/// Tracking mode and simulated location controls
fn render_tracking_section(
    ui: &mut Ui,
    state: &mut AppState,
    view: &mut ViewerMapView,
    feed: Option<&LocationFeed>,
) {
    ui.label(RichText::new("🧭 Tracking").strong());
    ui.add_space(4.0);

    let mut mode = state.tracking.get();
    ui.horizontal(|ui| {
        ui.radio_value(&mut mode, TrackingMode::None, "None");
        ui.radio_value(&mut mode, TrackingMode::Follow, "Follow");
    });
    if mode != state.tracking.get() {
        state.tracking.set(mode);
    }

    let (text, color) = tracking_status_text(view.tracking_status());
    ui.label(RichText::new(text).color(color));

    let mut shows = view.shows_user_location();
    if ui.checkbox(&mut shows, "Show user location").changed() {
        view.set_shows_user_location(shows);
    }

    match feed {
        Some(feed) => {
            if ui
                .checkbox(
                    &mut state.ui_settings.location_authorized,
                    "Location access authorized",
                )
                .changed()
            {
                feed.set_authorized(state.ui_settings.location_authorized);
            }
        }
        None => {
            ui.label(
                RichText::new("Location simulation unavailable")
                    .small()
                    .color(ui.visuals().warn_fg_color),
            );
        }
    }
}

/// Interaction mask toggles
fn render_gestures_section(ui: &mut Ui, view: &mut ViewerMapView) {
    ui.label(RichText::new("✋ Gestures").strong());
    ui.add_space(4.0);

    let modes = view.interaction_modes();
    let mut pan = modes.contains(InteractionModes::PAN);
    let mut zoom = modes.contains(InteractionModes::ZOOM);
    let changed = ui.horizontal(|ui| {
        ui.checkbox(&mut pan, "Pan").changed() | ui.checkbox(&mut zoom, "Zoom").changed()
    });

    if changed.inner {
        let mut modes = InteractionModes::EMPTY;
        if pan {
            modes |= InteractionModes::PAN;
        }
        if zoom {
            modes |= InteractionModes::ZOOM;
        }
        view.set_interaction_modes(modes);
    }
}

/// Render statistics section
fn render_stats_section(ui: &mut Ui, state: &AppState, view: &ViewerMapView) {
    ui.label(RichText::new("📊 Statistics").strong());
    ui.add_space(4.0);

    egui::Grid::new("stats_grid")
        .num_columns(2)
        .spacing([12.0, 4.0])
        .show(ui, |ui| {
            ui.label("Annotations:");
            ui.label(RichText::new(format!("{}", view.registry().len())).strong());
            ui.end_row();

            ui.label("Location updates:");
            ui.label(RichText::new(format!("{}", state.stats.location_updates)).strong());
            ui.end_row();

            ui.label("Cycle Time:");
            let time_color = if state.stats.last_cycle_ms < 1.0 {
                Color32::GREEN
            } else if state.stats.last_cycle_ms < 8.0 {
                Color32::YELLOW
            } else {
                Color32::RED
            };
            ui.label(
                RichText::new(format!("{:.2} ms", state.stats.last_cycle_ms)).color(time_color),
            );
            ui.end_row();

            if let Some(report) = state.stats.last_report {
                ui.label("Last cycle:");
                ui.label(
                    RichText::new(format!(
                        "{}{}{}{} changes",
                        if report.viewport_read { "read, " } else { "" },
                        if report.viewport_written { "written, " } else { "" },
                        if report.recentered { "recentered, " } else { "" },
                        report.annotation_changes
                    ))
                    .small(),
                );
                ui.end_row();
            }
        });

    if let Some(error) = &state.stats.last_error {
        ui.add_space(4.0);
        ui.label(RichText::new(format!("⚠ {error}")).small().color(Color32::RED));
    }
}

/// Loaded GPX files and load errors
fn render_files_section(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal(|ui| {
        ui.label(RichText::new("📂 Annotation files").strong());
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.small_button("🗑 Clear All").clicked() {
                state.clear_items();
            }
        });
    });
    ui.label(RichText::new("Drop GPX files on the map to add their waypoints").small());
    ui.add_space(4.0);

    if !state.file_loader.errors.is_empty() {
        egui::ScrollArea::vertical()
            .id_salt("errors_scroll")
            .max_height(100.0)
            .show(ui, |ui| {
                for (file, error) in &state.file_loader.errors {
                    ui.label(
                        RichText::new(format!(
                            "• {}: {}",
                            file.file_name().unwrap_or_default().to_string_lossy(),
                            error
                        ))
                        .small()
                        .color(Color32::RED),
                    );
                }
            });
        if ui.button("Clear Errors").clicked() {
            state.file_loader.errors.clear();
        }
        ui.add_space(4.0);
    }

    let mut to_remove = None;
    for (idx, (path, count)) in state.file_loader.loaded_files.iter().enumerate() {
        ui.horizontal(|ui| {
            ui.label(
                RichText::new(format!(
                    "📄 {} ({count})",
                    path.file_name().unwrap_or_default().to_string_lossy()
                ))
                .small(),
            );
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.small_button("🗑").clicked() {
                    to_remove = Some(idx);
                }
            });
        });
    }
    if let Some(idx) = to_remove {
        state.remove_file(idx);
    }
}

/// Handle drag and drop of GPX files
pub fn handle_drag_and_drop(ctx: &egui::Context, state: &mut AppState) {
    let hovered_files = ctx.input(|i| !i.raw.hovered_files.is_empty());
    let dropped_files: Vec<_> = ctx.input(|i| i.raw.dropped_files.clone());

    if hovered_files {
        let painter = ctx.layer_painter(egui::LayerId::new(
            egui::Order::Foreground,
            egui::Id::new("drop_preview"),
        ));
        let screen_rect = ctx.content_rect();
        let bg_rect = egui::Rect::from_center_size(screen_rect.center(), egui::vec2(340.0, 80.0));
        painter.rect_filled(bg_rect, 16.0, egui::Color32::from_black_alpha(180));
        painter.text(
            screen_rect.center(),
            egui::Align2::CENTER_CENTER,
            "📂 Drop GPX files here",
            egui::FontId::proportional(32.0),
            egui::Color32::WHITE,
        );
    }

    for path in dropped_files.into_iter().filter_map(|file| file.path) {
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("gpx")) {
            state.queue_file(path);
        } else {
            tracing::warn!("Ignoring dropped file {}", path.display());
        }
    }
}
