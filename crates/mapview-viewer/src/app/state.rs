//! Application state management
//!
//! This module owns the bindings shared with the map view (viewport, tracking mode and
//! annotation items), the GPX file loading that feeds the items, and UI settings.

use crate::app::settings::Settings;
use mapview_lib::transform::{rect_to_region, region_to_rect};
use mapview_lib::{
    Anchor, Annotation, Binding, CoordinateRegion, CoordinateSpan, CycleReport, GeoCoordinate,
    Identifiable, MapAnnotation, MapMarker, MapPin, MapRect, MapView, MapViewError,
    ProjectionContext, Tint, TrackingMode,
};
use std::path::{Path, PathBuf};

/// Annotation content drawn by the viewer: markers, pins and text labels
pub type ViewerAnnotation = Annotation<String>;

/// The map view hosted by the viewer
pub type ViewerMapView = MapView<WaypointItem, ViewerAnnotation>;

/// Errors raised while loading annotation sources
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("Failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse GPX {}: {source}", path.display())]
    Gpx {
        path: PathBuf,
        source: gpx::errors::GpxError,
    },

    #[error(transparent)]
    MapView(#[from] MapViewError),
}

/// How a waypoint item is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaypointKind {
    /// Named waypoint, drawn as a text label
    Labeled,
    /// Unnamed waypoint
    Plain,
    /// First point of a track
    TrackStart,
}

/// One annotation item loaded from a GPX file
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointItem {
    /// `<file>#w<index>` or `<file>#t<index>`, stable across reloads of the same file
    pub key: String,
    pub name: Option<String>,
    pub coordinate: GeoCoordinate,
    pub kind: WaypointKind,
    pub tint: Tint,
}

impl Identifiable for WaypointItem {
    type Id = String;

    fn id(&self) -> String {
        self.key.clone()
    }
}

/// Content function handed to the map view
pub fn waypoint_annotation(item: &WaypointItem) -> ViewerAnnotation {
    match (item.kind, &item.name) {
        (WaypointKind::Labeled, Some(name)) => MapAnnotation::new(item.coordinate, name.clone())
            .with_anchor(Anchor::new(0.5, 1.0))
            .into(),
        (WaypointKind::TrackStart, _) => MapPin::new(item.coordinate).with_tint(item.tint).into(),
        _ => MapMarker::new(item.coordinate)
            .with_tint(item.tint)
            .into(),
    }
}

/// Extract annotation items from a parsed GPX document
pub fn waypoint_items(source: &Path, file_index: usize, gpx: &gpx::Gpx) -> Vec<WaypointItem> {
    let tint = file_tint(file_index);
    let prefix = source.to_string_lossy();

    let waypoints = gpx.waypoints.iter().enumerate().map(|(index, waypoint)| {
        let point = waypoint.point();
        let name = waypoint.name.clone().filter(|name| !name.trim().is_empty());
        WaypointItem {
            key: format!("{prefix}#w{index}"),
            kind: if name.is_some() {
                WaypointKind::Labeled
            } else {
                WaypointKind::Plain
            },
            name,
            coordinate: GeoCoordinate::new(point.y(), point.x()),
            tint,
        }
    });

    let track_starts = gpx.tracks.iter().enumerate().filter_map(|(index, track)| {
        let first = track.segments.iter().find_map(|s| s.points.first())?;
        let point = first.point();
        Some(WaypointItem {
            key: format!("{prefix}#t{index}"),
            name: track.name.clone(),
            coordinate: GeoCoordinate::new(point.y(), point.x()),
            kind: WaypointKind::TrackStart,
            tint,
        })
    });

    waypoints
        .chain(track_starts)
        .filter(|item| {
            let valid = item.coordinate.is_valid();
            if !valid {
                tracing::warn!("Skipping {} with out of range coordinate", item.key);
            }
            valid
        })
        .collect()
}

/// Generate a distinct tint for a file based on its index
pub fn file_tint(index: usize) -> Tint {
    // Golden angle for better distribution
    let hue = (index as f32 * 137.508) % 360.0;
    let saturation = 0.7;
    let value = 0.9;

    let c = value * saturation;
    let x = c * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
    let m = value - c;

    let (r, g, b) = if hue < 60.0 {
        (c, x, 0.0)
    } else if hue < 120.0 {
        (x, c, 0.0)
    } else if hue < 180.0 {
        (0.0, c, x)
    } else if hue < 240.0 {
        (0.0, x, c)
    } else if hue < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    Tint::rgb(
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    )
}

/// The viewport binding in whichever representation was chosen at startup
#[derive(Debug, Clone)]
pub enum ViewportSource {
    Region(Binding<CoordinateRegion>),
    Rect(Binding<MapRect>),
}

impl ViewportSource {
    /// Current bound viewport as a region
    pub fn region(&self, context: &ProjectionContext) -> Option<CoordinateRegion> {
        match self {
            ViewportSource::Region(binding) => Some(binding.get()),
            ViewportSource::Rect(binding) => rect_to_region(&binding.get(), context).ok(),
        }
    }

    /// Write a region from outside the map view, converting when bound as a rect
    pub fn write_region(
        &self,
        region: CoordinateRegion,
        context: &ProjectionContext,
    ) -> Result<(), MapViewError> {
        match self {
            ViewportSource::Region(binding) => {
                region.validate()?;
                binding.set(region);
            }
            ViewportSource::Rect(binding) => binding.set(region_to_rect(&region, context)?),
        }
        Ok(())
    }

    pub fn version(&self) -> u64 {
        match self {
            ViewportSource::Region(binding) => binding.version(),
            ViewportSource::Rect(binding) => binding.version(),
        }
    }
}

/// UI-specific settings that can be adjusted at runtime
#[derive(Clone)]
pub struct UiSettings {
    /// Whether sidebar is open
    pub sidebar_open: bool,

    /// Whether the simulated location service reports authorized fixes
    pub location_authorized: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            sidebar_open: true,
            location_authorized: true,
        }
    }
}

/// File loading state and operations
#[derive(Default)]
pub struct FileLoader {
    /// Files pending load
    pub pending_files: Vec<PathBuf>,

    /// Load errors
    pub errors: Vec<(PathBuf, String)>,

    /// Successfully loaded files with the number of items each produced
    pub loaded_files: Vec<(PathBuf, usize)>,

    /// Monotonic counter so each file keeps its tint after removals
    next_file_index: usize,
}

impl FileLoader {
    /// Check if any files are waiting to be loaded
    pub fn is_busy(&self) -> bool {
        !self.pending_files.is_empty()
    }
}

/// Statistics about the last processing cycles
#[derive(Default)]
pub struct Stats {
    /// Report of the last successful cycle
    pub last_report: Option<CycleReport>,

    /// Time spent in the last cycle in milliseconds
    pub last_cycle_ms: f64,

    /// Last error raised by the map view, if it has not recovered yet
    pub last_error: Option<String>,

    /// Location readings received from the simulation so far
    pub location_updates: usize,
}

/// Main application state
pub struct AppState {
    /// Bound viewport, shared with the map view
    pub viewport: ViewportSource,

    /// Bound tracking mode, shared with the map view
    pub tracking: Binding<TrackingMode>,

    /// Bound annotation items, shared with the map view
    pub items: Binding<Vec<WaypointItem>>,

    /// Region being edited in the sidebar
    pub region_draft: CoordinateRegion,

    pub ui_settings: UiSettings,

    pub file_loader: FileLoader,

    pub stats: Stats,
}

impl AppState {
    /// Create new application state from CLI settings and an optional restored region
    pub fn new(
        settings: &Settings,
        restored: Option<(CoordinateRegion, TrackingMode)>,
        context: &ProjectionContext,
    ) -> Result<Self, MapViewError> {
        let (mut region, mut tracking_mode) = restored.unwrap_or((
            CoordinateRegion::new(
                GeoCoordinate::new(51.5074, -0.1278),
                CoordinateSpan::new(settings.span, settings.span),
            ),
            TrackingMode::None,
        ));

        // Explicit CLI values take priority over persisted ones
        if let Some(latitude) = settings.latitude {
            region.center.latitude = latitude;
        }
        if let Some(longitude) = settings.longitude {
            region.center.longitude = longitude;
        }
        if settings.latitude.is_some() || settings.longitude.is_some() {
            region.span = CoordinateSpan::new(settings.span, settings.span);
        }
        if settings.follow {
            tracking_mode = TrackingMode::Follow;
        }
        region.validate()?;

        let viewport = if settings.map_rect {
            ViewportSource::Rect(Binding::new(region_to_rect(&region, context)?))
        } else {
            ViewportSource::Region(Binding::new(region))
        };

        Ok(Self {
            viewport,
            tracking: Binding::new(tracking_mode),
            items: Binding::new(Vec::new()),
            region_draft: region,
            ui_settings: UiSettings::default(),
            file_loader: FileLoader {
                pending_files: settings.gpx_files.clone(),
                ..Default::default()
            },
            stats: Stats::default(),
        })
    }

    /// Add a file to the pending load queue
    pub fn queue_file(&mut self, path: PathBuf) {
        let already_loaded = self
            .file_loader
            .loaded_files
            .iter()
            .any(|(p, _)| p == &path);
        if !self.file_loader.pending_files.contains(&path) && !already_loaded {
            self.file_loader.pending_files.push(path);
        }
    }

    /// Process one pending file load
    pub fn process_pending_files(&mut self) {
        if let Some(path) = self.file_loader.pending_files.pop() {
            if let Err(e) = self.load_gpx_file(&path) {
                tracing::warn!("{e}");
                self.file_loader.errors.push((path, e.to_string()));
            }
        }
    }

    /// Load a GPX file and append its items
    pub fn load_gpx_file(&mut self, path: &Path) -> Result<usize, ViewerError> {
        profiling::scope!("load_gpx_file");

        let file = std::fs::File::open(path).map_err(|source| ViewerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let gpx = gpx::read(std::io::BufReader::new(file)).map_err(|source| ViewerError::Gpx {
            path: path.to_path_buf(),
            source,
        })?;

        let file_index = self.file_loader.next_file_index;
        self.file_loader.next_file_index += 1;

        let new_items = waypoint_items(path, file_index, &gpx);
        let count = new_items.len();
        self.items.update(|items| items.extend(new_items));
        self.file_loader
            .loaded_files
            .push((path.to_path_buf(), count));

        tracing::info!("Loaded {} annotations from {}", count, path.display());
        Ok(count)
    }

    /// Remove a loaded file and its items by index
    pub fn remove_file(&mut self, index: usize) {
        if index >= self.file_loader.loaded_files.len() {
            return;
        }
        let (path, _) = self.file_loader.loaded_files.remove(index);
        let prefix = format!("{}#", path.to_string_lossy());
        self.items
            .update(|items| items.retain(|item| !item.key.starts_with(&prefix)));
    }

    /// Clear all loaded items
    pub fn clear_items(&mut self) {
        self.items.set(Vec::new());
        self.file_loader.loaded_files.clear();
        self.file_loader.errors.clear();
        self.file_loader.pending_files.clear();
    }

    /// Total number of items across loaded files
    pub fn item_count(&self) -> usize {
        self.items.with(Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <wpt lat="48.8584" lon="2.2945"><name>Eiffel Tower</name></wpt>
  <wpt lat="48.8606" lon="2.3376"></wpt>
  <trk>
    <name>Walk</name>
    <trkseg>
      <trkpt lat="48.8530" lon="2.3499"></trkpt>
      <trkpt lat="48.8540" lon="2.3510"></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    fn sample() -> gpx::Gpx {
        gpx::read(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn test_waypoint_items() {
        let items = waypoint_items(Path::new("paris.gpx"), 0, &sample());
        assert_eq!(items.len(), 3);

        assert_eq!(items[0].key, "paris.gpx#w0");
        assert_eq!(items[0].kind, WaypointKind::Labeled);
        assert_eq!(items[0].name.as_deref(), Some("Eiffel Tower"));
        assert_eq!(items[0].coordinate, GeoCoordinate::new(48.8584, 2.2945));

        assert_eq!(items[1].kind, WaypointKind::Plain);
        assert_eq!(items[2].key, "paris.gpx#t0");
        assert_eq!(items[2].kind, WaypointKind::TrackStart);
    }

    #[test]
    fn test_annotation_forms() {
        let items = waypoint_items(Path::new("paris.gpx"), 0, &sample());
        assert_eq!(
            waypoint_annotation(&items[0]).content().map(String::as_str),
            Some("Eiffel Tower")
        );
        assert!(matches!(waypoint_annotation(&items[1]), Annotation::Marker(_)));
        assert!(matches!(waypoint_annotation(&items[2]), Annotation::Pin(_)));
    }

    #[test]
    fn test_file_tints_differ() {
        assert_ne!(file_tint(0), file_tint(1));
        assert_eq!(file_tint(3), file_tint(3));
    }

    #[test]
    fn test_cli_overrides_restored_region() {
        let context = ProjectionContext::default();
        let restored = CoordinateRegion::new(
            GeoCoordinate::new(10.0, 20.0),
            CoordinateSpan::new(1.0, 1.0),
        );

        let settings = Settings::parse_from(["mapview-viewer"]);
        let state = AppState::new(&settings, Some((restored, TrackingMode::Follow)), &context)
            .unwrap();
        assert_eq!(state.viewport.region(&context), Some(restored));
        assert_eq!(state.tracking.get(), TrackingMode::Follow);

        let settings =
            Settings::parse_from(["mapview-viewer", "--latitude", "1.0", "--span", "0.5"]);
        let state = AppState::new(&settings, Some((restored, TrackingMode::None)), &context)
            .unwrap();
        let region = state.viewport.region(&context).unwrap();
        assert_eq!(region.center, GeoCoordinate::new(1.0, 20.0));
        assert_eq!(region.span, CoordinateSpan::new(0.5, 0.5));
    }

    #[test]
    fn test_invalid_cli_region_fails() {
        let settings = Settings::parse_from(["mapview-viewer", "--latitude", "91"]);
        let result = AppState::new(&settings, None, &ProjectionContext::default());
        assert!(matches!(result, Err(MapViewError::InvalidGeometry(_))));
    }

    #[test]
    fn test_missing_file_is_recorded() {
        let settings = Settings::parse_from(["mapview-viewer", "-g", "/nonexistent/missing.gpx"]);
        let mut state = AppState::new(&settings, None, &ProjectionContext::default()).unwrap();
        assert!(state.file_loader.is_busy());

        state.process_pending_files();
        assert!(!state.file_loader.is_busy());
        assert_eq!(state.file_loader.errors.len(), 1);
        assert_eq!(state.item_count(), 0);
    }

    #[test]
    fn test_rect_source_round_trip() {
        let context = ProjectionContext::default();
        let settings = Settings::parse_from(["mapview-viewer", "--map-rect"]);
        let state = AppState::new(&settings, None, &context).unwrap();
        assert!(matches!(state.viewport, ViewportSource::Rect(_)));

        let target = CoordinateRegion::new(
            GeoCoordinate::new(-33.86, 151.21),
            CoordinateSpan::new(0.2, 0.2),
        );
        state.viewport.write_region(target, &context).unwrap();
        assert_eq!(state.viewport.version(), 1);
        assert!(
            state
                .viewport
                .region(&context)
                .unwrap()
                .approx_eq(&target, 1e-9)
        );
    }
}
