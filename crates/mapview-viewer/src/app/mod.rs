//! Application module
//!
//! This module hosts one map view on a full-screen walkers map:
//! - The map view's renderer feeds a walkers plugin and moves the walkers camera
//! - Drags and zooms on the map become gestures handed back to the map view
//! - A sidebar edits the bound viewport and tracking mode from the outside
//! - A simulated location feed drives user tracking
//! - GPX waypoints (from the CLI or drag-and-drop) become annotations

mod location;
mod plugin;
mod renderer;
pub(crate) mod settings;
mod state;
mod ui_panels;

use crate::app::location::LocationFeed;
use crate::app::plugin::{AnnotationPlugin, ScreenViewport};
use crate::app::renderer::{Scene, WalkersRenderer, screen_viewport_to_rect};
use crate::app::settings::Settings;
use crate::app::state::{
    AppState, ViewerError, ViewerMapView, ViewportSource, waypoint_annotation,
};
use eframe::egui;
use mapview_lib::{
    CoordinateRegion, GestureEvent, GestureKind, GestureOutcome, GesturePhase, InteractionModes,
    ProjectionContext, TrackingMode,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use walkers::{HttpTiles, Map, MapMemory, sources::OpenStreetMap};

const PERSISTED_KEY: &str = "persisted_settings";

/// Persisted settings (lightweight, no annotation data)
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct PersistedSettings {
    region: CoordinateRegion,
    tracking_mode: TrackingMode,
    sidebar_open: bool,
    /// File paths that were loaded (will need to be reloaded)
    loaded_file_paths: Vec<String>,
}

/// Load persisted settings from storage, if any were saved
fn load_persisted_settings(storage: &dyn eframe::Storage) -> Option<PersistedSettings> {
    if let Some(json) = storage.get_string(PERSISTED_KEY)
        && !json.is_empty()
    {
        match serde_json::from_str::<PersistedSettings>(&json) {
            Ok(settings) => {
                tracing::info!("Restored settings, will reload files");
                return Some(settings);
            }
            Err(e) => tracing::warn!("Discarding unreadable persisted settings: {e}"),
        }
    }
    tracing::info!("No persisted settings found, starting fresh");
    None
}

/// Main application structure
pub struct MapViewerApp {
    /// Bindings, files and UI settings
    state: AppState,

    /// The map view driven by this application
    view: ViewerMapView,

    /// Simulated location source, when a tokio runtime is available
    feed: Option<LocationFeed>,

    /// Map tiles provider (OpenStreetMap)
    tiles: HttpTiles,

    /// Walkers camera state
    map_memory: MapMemory,

    /// What the plugin paints, kept up to date by the renderer
    scene: Scene,

    /// Area walkers displayed last frame (written by the plugin)
    displayed: Arc<RwLock<Option<ScreenViewport>>>,

    /// Width of the map widget, zero until the first frame was laid out
    screen_width: f32,
}

impl MapViewerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: Settings) -> Result<Self, ViewerError> {
        let context = ProjectionContext::default();

        let persisted = if settings.ignore_persisted {
            tracing::info!("Ignoring persisted state (--ignore-persisted flag)");
            None
        } else {
            cc.storage.and_then(load_persisted_settings)
        };

        let restored = persisted
            .as_ref()
            .map(|persisted| (persisted.region, persisted.tracking_mode));
        let mut state = AppState::new(&settings, restored, &context)?;
        if let Some(persisted) = &persisted {
            state.ui_settings.sidebar_open = persisted.sidebar_open;
            for path in persisted.loaded_file_paths.iter().map(PathBuf::from) {
                if path.exists() {
                    state.queue_file(path);
                }
            }
        }

        let origin = state
            .viewport
            .region(&context)
            .map(|region| region.center)
            .unwrap_or_default();
        let feed = LocationFeed::spawn(origin);

        let mut modes = InteractionModes::ALL;
        if settings.no_pan {
            modes &= InteractionModes::ZOOM;
        }
        if settings.no_zoom {
            modes &= InteractionModes::PAN;
        }

        let mut builder = ViewerMapView::builder(waypoint_annotation)
            .user_tracking_mode(state.tracking.clone())
            .annotation_items(state.items.clone())
            .interaction_modes(modes)
            .shows_user_location(settings.shows_user_location || settings.follow);
        builder = match &state.viewport {
            ViewportSource::Region(binding) => builder.coordinate_region(binding.clone()),
            ViewportSource::Rect(binding) => builder.map_rect(binding.clone()),
        };
        if let Some(feed) = &feed {
            builder = builder.location_service(feed.service());
        }
        let mut view = builder.build()?;
        view.mount();

        tracing::info!(
            "Initialized with {} files to load, tracking {:?}",
            state.file_loader.pending_files.len(),
            view.tracking_mode()
        );

        Ok(Self {
            state,
            view,
            feed,
            tiles: HttpTiles::new(OpenStreetMap, cc.egui_ctx.clone()),
            map_memory: MapMemory::default(),
            scene: Scene::default(),
            displayed: Arc::new(RwLock::new(None)),
            screen_width: 0.0,
        })
    }

    /// Run one map view cycle, rendering into the walkers scene
    fn run_cycle(&mut self) {
        // The camera zoom depends on the widget width, so wait for the first layout
        if self.screen_width <= 0.0 {
            return;
        }

        let start = instant::Instant::now();
        let mut renderer = WalkersRenderer {
            memory: &mut self.map_memory,
            scene: &mut self.scene,
            screen_width: self.screen_width,
        };
        match self.view.process(&mut renderer) {
            Ok(report) => {
                if report.viewport_read || report.viewport_written {
                    self.state.region_draft = self.view.viewport_region();
                }
                self.state.stats.last_report = Some(report);
                self.state.stats.last_error = None;
            }
            Err(e) => {
                tracing::warn!("Map view cycle failed: {e}");
                self.state.stats.last_error = Some(e.to_string());
            }
        }
        self.state.stats.last_cycle_ms = start.elapsed().as_secs_f64() * 1000.0;
    }

    /// Turn what walkers did with the input this frame into a gesture
    fn handle_gestures(&mut self, response: &egui::Response, zoomed: bool) {
        let (kind, phase) = if response.dragged() {
            (GestureKind::Pan, GesturePhase::Changed)
        } else if response.drag_stopped() {
            (GestureKind::Pan, GesturePhase::Ended)
        } else if zoomed {
            (GestureKind::Zoom, GesturePhase::Ended)
        } else {
            return;
        };

        // Use try_read for non-blocking UI polling.
        let Some(displayed) = self.displayed.try_read().ok().and_then(|guard| *guard) else {
            return;
        };
        let rect = screen_viewport_to_rect(
            displayed.north_west,
            displayed.south_east,
            &self.view.config().projection,
        );

        match self.view.handle_gesture(GestureEvent::new(kind, phase, rect)) {
            Ok(GestureOutcome::Committed) => {
                self.state.region_draft = self.view.viewport_region();
            }
            Ok(outcome) => tracing::trace!("{kind:?} gesture: {outcome:?}"),
            Err(e) => {
                tracing::warn!("Rejected {kind:?} gesture: {e}");
                self.state.stats.last_error = Some(e.to_string());
            }
        }
    }
}

#[profiling::all_functions]
impl eframe::App for MapViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // One file per frame keeps the UI responsive
        if self.state.file_loader.is_busy() {
            self.state.process_pending_files();
            ctx.request_repaint();
        }
        ui_panels::handle_drag_and_drop(ctx, &mut self.state);

        if let Some(feed) = self.feed.as_mut() {
            self.state.stats.location_updates += feed.pump();
            ctx.request_repaint_after(Duration::from_millis(250));
        }

        self.run_cycle();

        ui_panels::render_sidebar(ctx, &mut self.state, &mut self.view, self.feed.as_ref());

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                profiling::scope!("map_panel");

                let plugin = AnnotationPlugin::new(self.scene.clone(), self.displayed.clone());
                let center = self.view.viewport_region().center;
                let zoom_before = self.map_memory.zoom();

                let map = Map::new(
                    Some(&mut self.tiles),
                    &mut self.map_memory,
                    walkers::lat_lon(center.latitude, center.longitude),
                )
                .with_plugin(plugin);
                let response = ui.add(map);

                let zoomed = (self.map_memory.zoom() - zoom_before).abs() > 1e-6;
                self.handle_gestures(&response, zoomed);

                if let Ok(displayed) = self.displayed.try_read()
                    && let Some(displayed) = *displayed
                {
                    self.screen_width = displayed.width;
                }

                ui_panels::sidebar_toggle_button(ui, &mut self.state);

                let screen_rect = ui.max_rect();
                ui.painter().text(
                    screen_rect.center_bottom() + egui::vec2(0.0, -5.0),
                    egui::Align2::CENTER_BOTTOM,
                    "© OpenStreetMap contributors",
                    egui::FontId::proportional(10.0),
                    egui::Color32::from_black_alpha(180),
                );
            });
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        // Include pending files so nothing is lost when closing mid-load
        let mut loaded_file_paths: Vec<String> = self
            .state
            .file_loader
            .loaded_files
            .iter()
            .map(|(path, _)| path.to_string_lossy().to_string())
            .collect();
        for path in &self.state.file_loader.pending_files {
            let path = path.to_string_lossy().to_string();
            if !loaded_file_paths.contains(&path) {
                loaded_file_paths.push(path);
            }
        }

        let settings = PersistedSettings {
            region: self.view.viewport_region(),
            tracking_mode: self.state.tracking.get(),
            sidebar_open: self.state.ui_settings.sidebar_open,
            loaded_file_paths,
        };

        match serde_json::to_string(&settings) {
            Ok(json) => {
                storage.set_string(PERSISTED_KEY, json);
                tracing::debug!("Saved settings");
            }
            Err(e) => tracing::warn!("Failed to save settings: {e}"),
        }
    }
}
