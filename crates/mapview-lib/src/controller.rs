//! MapView - the controller tying viewport, annotations and tracking together
//!
//! The host drives a [`MapView`] from its UI update cycle:
//!
//! 1. [`mount`](MapView::mount) once, which subscribes the location service
//! 2. [`handle_gesture`](MapView::handle_gesture) for every gesture the renderer reports
//! 3. [`process`](MapView::process) once per frame, which reads external state, applies
//!    location updates, writes back at most once and hands a frame to the renderer
//! 4. [`unmount`](MapView::unmount) (or drop) on teardown
//!
//! External state is only read when its binding version moved since the view last read
//! or wrote it, so the view's own write-backs never come back as external changes.

use crate::annotation::unique_ids;
use crate::transform::{rect_to_region, region_to_rect};
use crate::{
    AnnotationContent, AnnotationDiff, AnnotationRegistry, Binding, Config, CoordinateRegion,
    GeoCoordinate, GestureEvent, GestureKind, GesturePhase, Identifiable, InteractionModes,
    LocationService, LocationSink, MapMarker, MapRect, MapViewError, RenderFrame, Renderer,
    Result, TrackingController, TrackingEffect, TrackingMode, TrackingStatus,
};

/// Item type of a map view without annotations
#[derive(Debug, Clone)]
pub enum NoItem {}

impl Identifiable for NoItem {
    type Id = ();

    fn id(&self) -> Self::Id {
        match *self {}
    }
}

/// The externally bound source of truth for the viewport
#[derive(Debug, Clone)]
enum ViewportBinding {
    Region(Binding<CoordinateRegion>),
    Rect(Binding<MapRect>),
}

impl ViewportBinding {
    fn version(&self) -> u64 {
        match self {
            ViewportBinding::Region(binding) => binding.version(),
            ViewportBinding::Rect(binding) => binding.version(),
        }
    }
}

/// The displayed viewport in both representations
#[derive(Debug, Clone, Copy, PartialEq)]
struct Viewport {
    rect: MapRect,
    region: CoordinateRegion,
}

/// Where the gesture reported by the renderer stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureState {
    Idle,
    Active(GestureKind),
    /// An external viewport write took over; the rest of this gesture is dropped
    Cancelled(GestureKind),
}

/// What happened to a gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    /// Not permitted, or cancelled by an external write; the viewport did not move
    Ignored,
    /// Intermediate step applied; nothing written yet
    Applied,
    /// Gesture finished and the viewport was written back
    Committed,
}

/// Summary of one processing cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    /// The bound viewport changed externally and was re-read
    pub viewport_read: bool,
    /// The viewport was written back to its binding
    pub viewport_written: bool,
    /// A location update moved the viewport center
    pub recentered: bool,
    /// Number of annotation changes handed to the renderer
    pub annotation_changes: usize,
    pub tracking_status: TrackingStatus,
}

/// Builder for [`MapView`]
pub struct MapViewBuilder<T: Identifiable, A> {
    registry: AnnotationRegistry<T, A>,
    region: Option<Binding<CoordinateRegion>>,
    rect: Option<Binding<MapRect>>,
    tracking: Option<Binding<TrackingMode>>,
    items: Option<Binding<Vec<T>>>,
    location: Option<Box<dyn LocationService>>,
    config: Config,
}

/// Map view controller
pub struct MapView<T: Identifiable, A> {
    config: Config,
    viewport_binding: ViewportBinding,
    /// Viewport binding version last read or written here
    viewport_seen: u64,
    viewport: Viewport,
    /// The renderer must move its camera on the next frame
    camera_changed: bool,
    gesture: GestureState,
    items: Option<Binding<Vec<T>>>,
    items_seen: Option<u64>,
    registry: AnnotationRegistry<T, A>,
    tracking: TrackingController,
    /// External binding, or an internal one when the caller did not bind the mode
    tracking_binding: Binding<TrackingMode>,
    tracking_seen: u64,
    location: Option<Box<dyn LocationService>>,
    sink: LocationSink,
    mounted: bool,
}

impl<T, A> MapViewBuilder<T, A>
where
    T: Identifiable,
    A: AnnotationContent + Clone + PartialEq,
{
    fn new(content: impl Fn(&T) -> A + 'static) -> Self {
        Self {
            registry: AnnotationRegistry::new(content),
            region: None,
            rect: None,
            tracking: None,
            items: None,
            location: None,
            config: Config::default(),
        }
    }

    /// Bind the viewport to a coordinate region
    pub fn coordinate_region(mut self, binding: Binding<CoordinateRegion>) -> Self {
        self.region = Some(binding);
        self
    }

    /// Bind the viewport to a map rect
    pub fn map_rect(mut self, binding: Binding<MapRect>) -> Self {
        self.rect = Some(binding);
        self
    }

    pub fn interaction_modes(mut self, modes: InteractionModes) -> Self {
        self.config.interaction_modes = modes;
        self
    }

    pub fn shows_user_location(mut self, shows: bool) -> Self {
        self.config.shows_user_location = shows;
        self
    }

    /// Bind the tracking mode; the binding owner becomes authoritative
    pub fn user_tracking_mode(mut self, binding: Binding<TrackingMode>) -> Self {
        self.tracking = Some(binding);
        self
    }

    /// Bind the items annotations are derived from
    pub fn annotation_items(mut self, items: Binding<Vec<T>>) -> Self {
        self.items = Some(items);
        self
    }

    pub fn location_service(mut self, service: impl LocationService + 'static) -> Self {
        self.location = Some(Box::new(service));
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Validate the bindings and create the view
    ///
    /// # Errors
    /// - `ConflictingViewport` / `MissingViewport` unless exactly one viewport is bound
    /// - `InvalidGeometry` if the bound viewport is malformed
    /// - `DuplicateIdentity` if the bound items repeat an identity
    pub fn build(self) -> Result<MapView<T, A>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("map_view::build");

        let viewport_binding = match (self.region, self.rect) {
            (Some(region), None) => ViewportBinding::Region(region),
            (None, Some(rect)) => ViewportBinding::Rect(rect),
            (Some(_), Some(_)) => return Err(MapViewError::ConflictingViewport),
            (None, None) => return Err(MapViewError::MissingViewport),
        };
        let viewport = read_viewport(&viewport_binding, &self.config)?;

        if let Some(items) = &self.items {
            items.with(|items| unique_ids(items))?;
        }

        let tracking_binding = self
            .tracking
            .unwrap_or_else(|| Binding::new(TrackingMode::None));
        let initial_mode = tracking_binding.get();

        tracing::debug!(
            "Map view bound to {} at ({:.5}, {:.5}), tracking {:?}",
            match viewport_binding {
                ViewportBinding::Region(_) => "region",
                ViewportBinding::Rect(_) => "map rect",
            },
            viewport.region.center.latitude,
            viewport.region.center.longitude,
            initial_mode
        );

        Ok(MapView {
            viewport_seen: viewport_binding.version(),
            viewport_binding,
            viewport,
            camera_changed: true,
            gesture: GestureState::Idle,
            items: self.items,
            items_seen: None,
            registry: self.registry,
            tracking: TrackingController::new(initial_mode),
            tracking_seen: tracking_binding.version(),
            tracking_binding,
            location: self.location,
            sink: LocationSink::new(),
            mounted: false,
            config: self.config,
        })
    }
}

impl<T, A> MapView<T, A>
where
    T: Identifiable,
    A: AnnotationContent + Clone + PartialEq,
{
    /// Start building a view whose annotations are produced by `content`
    pub fn builder(content: impl Fn(&T) -> A + 'static) -> MapViewBuilder<T, A> {
        MapViewBuilder::new(content)
    }
}

impl MapView<NoItem, MapMarker> {
    /// Start building a view without annotations
    pub fn builder_without_annotations() -> MapViewBuilder<NoItem, MapMarker> {
        MapViewBuilder::new(|item: &NoItem| -> MapMarker { match *item {} })
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<T, A> MapView<T, A>
where
    T: Identifiable,
    A: AnnotationContent + Clone + PartialEq,
{
    /// Run one processing cycle and render the result
    ///
    /// # Errors
    /// `InvalidGeometry` if the bound viewport was externally set to a malformed value,
    /// `DuplicateIdentity` if the bound items repeat an identity. Nothing is rendered and
    /// the previous state is kept; the next cycle re-reads the offending binding. Location
    /// updates queued meanwhile collapse to the latest one.
    pub fn process(&mut self, renderer: &mut dyn Renderer<T::Id, A>) -> Result<CycleReport> {
        // 1. Externally bound viewport
        let viewport_read = self.sync_viewport().inspect_err(|_| self.sink.keep_latest())?;

        // 2. The interaction mask travels with the frame and gates `handle_gesture`

        // 3. Annotations
        let diff = self
            .sync_annotations()
            .inspect_err(|_| self.sink.keep_latest())?;

        // 4. Tracking
        let recenter = self.sync_tracking();

        // 5. Write-back, at most once per cycle
        let recentered = match recenter {
            Some(center) => {
                self.recenter(center)?;
                self.write_viewport();
                true
            }
            None => false,
        };

        let frame = RenderFrame {
            viewport: self.viewport.rect,
            region: self.viewport.region,
            camera_changed: self.camera_changed,
            diff: &diff,
            placements: self.registry.placements(),
            interaction_modes: self.config.interaction_modes,
            user_location: self.user_location(),
            tracking_mode: self.tracking.mode(),
        };
        renderer.render(&frame);
        self.camera_changed = false;

        let report = CycleReport {
            viewport_read,
            viewport_written: recentered,
            recentered,
            annotation_changes: diff.len(),
            tracking_status: self.tracking.status(),
        };
        tracing::trace!("Map view cycle: {report:?}");
        Ok(report)
    }

    /// Apply a gesture reported by the renderer
    ///
    /// Intermediate steps move the internal viewport only; the end of the gesture writes
    /// the viewport back once. Any permitted gesture turns following off first.
    ///
    /// # Errors
    /// `InvalidGeometry` if the reported viewport is malformed.
    pub fn handle_gesture(&mut self, event: GestureEvent) -> Result<GestureOutcome> {
        if !self.config.interaction_modes.allows(event.kind) {
            tracing::debug!(
                "Ignoring {:?} gesture, permitted: {:?}",
                event.kind,
                self.config.interaction_modes
            );
            // Have the renderer snap back to the controlled viewport
            self.camera_changed = true;
            return Ok(GestureOutcome::Ignored);
        }

        if let GestureState::Cancelled(kind) = self.gesture
            && kind == event.kind
        {
            if event.is_end() {
                self.gesture = GestureState::Idle;
            }
            self.camera_changed = true;
            tracing::trace!("Dropping {kind:?} gesture cancelled by an external write");
            return Ok(GestureOutcome::Ignored);
        }

        let region = rect_to_region(&event.viewport, &self.config.projection)?;

        if self.tracking.user_override() {
            self.tracking_binding.set(TrackingMode::None);
            self.tracking_seen = self.tracking_binding.version();
        }

        self.viewport = Viewport {
            rect: event.viewport,
            region,
        };

        match event.phase {
            GesturePhase::Changed => {
                self.gesture = GestureState::Active(event.kind);
                Ok(GestureOutcome::Applied)
            }
            GesturePhase::Ended => {
                self.gesture = GestureState::Idle;
                self.write_viewport();
                Ok(GestureOutcome::Committed)
            }
        }
    }

    /// Step 1: re-read the bound viewport if it changed outside the view
    fn sync_viewport(&mut self) -> Result<bool> {
        let version = self.viewport_binding.version();
        if version == self.viewport_seen {
            return Ok(false);
        }

        let viewport = read_viewport(&self.viewport_binding, &self.config)?;
        if let GestureState::Active(kind) = self.gesture {
            tracing::debug!(
                "External viewport write during a {kind:?} gesture; external state wins"
            );
            self.gesture = GestureState::Cancelled(kind);
        }
        self.viewport = viewport;
        self.viewport_seen = version;
        self.camera_changed = true;
        Ok(true)
    }

    /// Step 3: reconcile annotations if the item binding changed
    fn sync_annotations(&mut self) -> Result<AnnotationDiff<T::Id, A>> {
        let Some(items) = &self.items else {
            return Ok(AnnotationDiff::default());
        };
        let version = items.version();
        if self.items_seen == Some(version) {
            return Ok(AnnotationDiff::default());
        }

        let registry = &mut self.registry;
        let diff = items.with(|items| registry.reconcile(items))?;
        self.items_seen = Some(version);
        Ok(diff)
    }

    /// Step 4: apply external mode changes and queued location updates
    ///
    /// Returns the center to move to, if any. Only the latest recenter of a cycle counts.
    fn sync_tracking(&mut self) -> Option<GeoCoordinate> {
        let mut recenter = None;

        let version = self.tracking_binding.version();
        if version != self.tracking_seen {
            self.tracking_seen = version;
            let current = match (&self.location, self.mounted) {
                (Some(service), true) => service.last_known(),
                _ => None,
            };
            let mode = self.tracking_binding.get();
            if let TrackingEffect::Recenter(center) = self.tracking.set_mode(mode, current) {
                recenter = Some(center);
            }
        }

        if self.mounted {
            for update in self.sink.drain() {
                if let TrackingEffect::Recenter(center) = self.tracking.location_update(update) {
                    recenter = Some(center);
                }
            }
        }

        recenter
    }

    /// Move the center, keeping the span
    ///
    /// A rect-bound view keeps the region its rect actually shows, which differs from the
    /// requested one where the projection clamps latitudes near the poles.
    fn recenter(&mut self, center: GeoCoordinate) -> Result<()> {
        let mut region = self.viewport.region.recentered(center);
        let rect = region_to_rect(&region, &self.config.projection)?;
        if let ViewportBinding::Rect(_) = self.viewport_binding {
            region = rect_to_region(&rect, &self.config.projection)?;
        }
        tracing::debug!(
            "Recentered on user location ({:.5}, {:.5})",
            center.latitude,
            center.longitude
        );
        self.viewport = Viewport { rect, region };
        self.camera_changed = true;
        Ok(())
    }

    /// Write the viewport to its binding in the bound representation
    fn write_viewport(&mut self) {
        match &self.viewport_binding {
            ViewportBinding::Region(binding) => binding.set(self.viewport.region),
            ViewportBinding::Rect(binding) => binding.set(self.viewport.rect),
        }
        self.viewport_seen = self.viewport_binding.version();
        tracing::debug!(
            "Wrote back viewport centered at ({:.5}, {:.5})",
            self.viewport.region.center.latitude,
            self.viewport.region.center.longitude
        );
    }

    fn user_location(&self) -> Option<GeoCoordinate> {
        if self.config.shows_user_location && self.mounted {
            self.tracking.last_fix()
        } else {
            None
        }
    }
}

impl<T: Identifiable, A> MapView<T, A> {
    /// Subscribe to the location service; idempotent
    pub fn mount(&mut self) {
        if self.mounted {
            return;
        }
        self.mounted = true;
        self.sink.reopen();

        if let Some(service) = self.location.as_mut() {
            service.subscribe(self.sink.clone());
            // Start from whatever the service already knows
            if let Some(update) = service.last_known() {
                self.sink.deliver(update);
            }
            tracing::debug!("Map view mounted, subscribed to location updates");
        } else {
            tracing::debug!("Map view mounted without a location service");
        }
    }

    /// Unsubscribe and drop queued location updates; idempotent
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        if let Some(service) = self.location.as_mut() {
            service.unsubscribe();
        }
        self.sink.close();
        self.tracking.forget_fix();
        tracing::debug!("Map view unmounted");
    }

    #[inline]
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Viewport as a map rect
    #[inline]
    pub fn viewport_rect(&self) -> MapRect {
        self.viewport.rect
    }

    /// Viewport as a coordinate region
    #[inline]
    pub fn viewport_region(&self) -> CoordinateRegion {
        self.viewport.region
    }

    #[inline]
    pub fn tracking_mode(&self) -> TrackingMode {
        self.tracking.mode()
    }

    #[inline]
    pub fn tracking_status(&self) -> TrackingStatus {
        self.tracking.status()
    }

    /// Propose a tracking mode; takes effect on the next cycle
    ///
    /// With a bound mode this writes the binding, whose owner stays authoritative.
    pub fn set_tracking_mode(&self, mode: TrackingMode) {
        self.tracking_binding.set(mode);
    }

    #[inline]
    pub fn interaction_modes(&self) -> InteractionModes {
        self.config.interaction_modes
    }

    pub fn set_interaction_modes(&mut self, modes: InteractionModes) {
        self.config.interaction_modes = modes;
    }

    #[inline]
    pub fn shows_user_location(&self) -> bool {
        self.config.shows_user_location
    }

    pub fn set_shows_user_location(&mut self, shows: bool) {
        self.config.shows_user_location = shows;
    }

    #[inline]
    pub fn registry(&self) -> &AnnotationRegistry<T, A> {
        &self.registry
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl<T: Identifiable, A> Drop for MapView<T, A> {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Read and validate the bound viewport
fn read_viewport(binding: &ViewportBinding, config: &Config) -> Result<Viewport> {
    match binding {
        ViewportBinding::Region(binding) => {
            let region = binding.get();
            let rect = region_to_rect(&region, &config.projection)?;
            Ok(Viewport { rect, region })
        }
        ViewportBinding::Rect(binding) => {
            let rect = binding.get();
            let region = rect_to_region(&rect, &config.projection)?;
            Ok(Viewport { rect, region })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::MAX_LATITUDE;
    use crate::{
        CoordinateSpan, LocationUnavailable, ManualLocationService, ProjectionContext,
    };

    const EPSILON: f64 = 1e-9;

    #[derive(Clone, Debug)]
    struct Poi {
        id: u32,
        lat: f64,
        lon: f64,
    }

    impl Identifiable for Poi {
        type Id = u32;

        fn id(&self) -> u32 {
            self.id
        }
    }

    fn poi(id: u32, lat: f64, lon: f64) -> Poi {
        Poi { id, lat, lon }
    }

    /// Owned copy of what a frame carried
    #[derive(Debug, Clone)]
    struct Recorded {
        viewport: MapRect,
        camera_changed: bool,
        added: Vec<u32>,
        updated: Vec<u32>,
        removed: Vec<u32>,
        placements: usize,
        interaction_modes: InteractionModes,
        user_location: Option<GeoCoordinate>,
        tracking_mode: TrackingMode,
    }

    #[derive(Default)]
    struct RecordingRenderer {
        frames: Vec<Recorded>,
    }

    impl RecordingRenderer {
        fn last(&self) -> &Recorded {
            self.frames.last().expect("no frame rendered")
        }
    }

    impl Renderer<u32, MapMarker> for RecordingRenderer {
        fn render(&mut self, frame: &RenderFrame<'_, u32, MapMarker>) {
            self.frames.push(Recorded {
                viewport: frame.viewport,
                camera_changed: frame.camera_changed,
                added: frame.diff.added.iter().map(|p| p.id).collect(),
                updated: frame.diff.updated.iter().map(|p| p.id).collect(),
                removed: frame.diff.removed.clone(),
                placements: frame.placements.len(),
                interaction_modes: frame.interaction_modes,
                user_location: frame.user_location,
                tracking_mode: frame.tracking_mode,
            });
        }
    }

    fn start_region() -> CoordinateRegion {
        CoordinateRegion::new(
            GeoCoordinate::new(10.0, 10.0),
            CoordinateSpan::new(0.5, 0.25),
        )
    }

    fn marker(poi: &Poi) -> MapMarker {
        MapMarker::new(GeoCoordinate::new(poi.lat, poi.lon))
    }

    /// Region-bound view with items, a bound tracking mode and a manual location service
    struct Fixture {
        view: MapView<Poi, MapMarker>,
        region: Binding<CoordinateRegion>,
        tracking: Binding<TrackingMode>,
        items: Binding<Vec<Poi>>,
        location: ManualLocationService,
        renderer: RecordingRenderer,
    }

    fn fixture(mode: TrackingMode) -> Fixture {
        let region = Binding::new(start_region());
        let tracking = Binding::new(mode);
        let items = Binding::new(vec![poi(1, 10.0, 10.0), poi(2, 10.1, 10.1)]);
        let location = ManualLocationService::new();

        let mut view = MapView::builder(marker)
            .coordinate_region(region.clone())
            .user_tracking_mode(tracking.clone())
            .annotation_items(items.clone())
            .location_service(location.clone())
            .shows_user_location(true)
            .build()
            .unwrap();
        view.mount();

        Fixture {
            view,
            region,
            tracking,
            items,
            location,
            renderer: RecordingRenderer::default(),
        }
    }

    fn process(f: &mut Fixture) -> CycleReport {
        f.view.process(&mut f.renderer).unwrap()
    }

    fn rect_centered_at(f: &Fixture, lat: f64, lon: f64) -> MapRect {
        let region = start_region().recentered(GeoCoordinate::new(lat, lon));
        region_to_rect(&region, &f.view.config().projection).unwrap()
    }

    #[test]
    fn test_build_requires_exactly_one_viewport() {
        let result = MapView::builder_without_annotations().build();
        assert!(matches!(result, Err(MapViewError::MissingViewport)));

        let result = MapView::builder_without_annotations()
            .coordinate_region(Binding::new(start_region()))
            .map_rect(Binding::new(MapRect::new(0.0, 0.0, 10.0, 10.0)))
            .build();
        assert!(matches!(result, Err(MapViewError::ConflictingViewport)));
    }

    #[test]
    fn test_build_rejects_invalid_geometry() {
        let bad = CoordinateRegion::new(
            GeoCoordinate::new(0.0, 0.0),
            CoordinateSpan::new(-1.0, 1.0),
        );
        let result = MapView::builder_without_annotations()
            .coordinate_region(Binding::new(bad))
            .build();
        assert!(matches!(result, Err(MapViewError::InvalidGeometry(_))));

        let result = MapView::builder_without_annotations()
            .map_rect(Binding::new(MapRect::new(0.0, 0.0, -5.0, 10.0)))
            .build();
        assert!(matches!(result, Err(MapViewError::InvalidGeometry(_))));
    }

    #[test]
    fn test_build_rejects_duplicate_items() {
        let result = MapView::builder(marker)
            .coordinate_region(Binding::new(start_region()))
            .annotation_items(Binding::new(vec![poi(7, 0.0, 0.0), poi(7, 1.0, 1.0)]))
            .build();
        assert!(matches!(
            result,
            Err(MapViewError::DuplicateIdentity { id }) if id == "7"
        ));
    }

    #[test]
    fn test_defaults() {
        let view = MapView::builder_without_annotations()
            .coordinate_region(Binding::new(start_region()))
            .build()
            .unwrap();
        assert_eq!(view.interaction_modes(), InteractionModes::ALL);
        assert!(!view.shows_user_location());
        assert_eq!(view.tracking_mode(), TrackingMode::None);
        assert!(!view.is_mounted());
        assert!(view.viewport_region().approx_eq(&start_region(), EPSILON));
    }

    #[test]
    fn test_first_frame_moves_camera_and_adds_annotations() {
        let mut f = fixture(TrackingMode::None);

        let report = process(&mut f);
        assert_eq!(report.annotation_changes, 2);
        assert!(!report.viewport_read);

        let frame = f.renderer.last();
        assert!(frame.camera_changed);
        assert_eq!(frame.added, vec![1, 2]);
        assert_eq!(frame.placements, 2);
        assert_eq!(frame.interaction_modes, InteractionModes::ALL);

        // Nothing changed: empty diff, camera stays put
        let report = process(&mut f);
        assert_eq!(report.annotation_changes, 0);
        let frame = f.renderer.last();
        assert!(!frame.camera_changed);
        assert!(frame.added.is_empty());
        assert_eq!(frame.placements, 2);
    }

    #[test]
    fn test_item_changes_reach_renderer() {
        let mut f = fixture(TrackingMode::None);
        process(&mut f);

        f.items
            .set(vec![poi(2, 10.2, 10.1), poi(3, 11.0, 11.0)]);
        let report = process(&mut f);
        assert_eq!(report.annotation_changes, 3);

        let frame = f.renderer.last();
        assert_eq!(frame.added, vec![3]);
        assert_eq!(frame.updated, vec![2]);
        assert_eq!(frame.removed, vec![1]);
    }

    #[test]
    fn test_duplicate_items_surface_from_process() {
        let mut f = fixture(TrackingMode::None);
        process(&mut f);

        f.items.set(vec![poi(1, 0.0, 0.0), poi(1, 0.0, 0.0)]);
        let result = f.view.process(&mut f.renderer);
        assert!(matches!(result, Err(MapViewError::DuplicateIdentity { .. })));
        assert_eq!(f.view.registry().len(), 2);
    }

    #[test]
    fn test_pan_in_follow_disables_tracking_and_writes_once() {
        let mut f = fixture(TrackingMode::Follow);
        process(&mut f);
        let region_version = f.region.version();
        let tracking_version = f.tracking.version();

        for step in 1..=3 {
            let rect = rect_centered_at(&f, 10.0 + step as f64 * 0.01, 10.0);
            let outcome = f
                .view
                .handle_gesture(GestureEvent::pan(GesturePhase::Changed, rect))
                .unwrap();
            assert_eq!(outcome, GestureOutcome::Applied);
            assert_eq!(f.view.tracking_mode(), TrackingMode::None);
        }
        // Intermediate frames never reach external state
        assert_eq!(f.region.version(), region_version);

        let end = rect_centered_at(&f, 10.05, 10.02);
        let outcome = f
            .view
            .handle_gesture(GestureEvent::pan(GesturePhase::Ended, end))
            .unwrap();
        assert_eq!(outcome, GestureOutcome::Committed);

        assert_eq!(f.region.version(), region_version + 1);
        assert!(
            f.region
                .get()
                .center
                .approx_eq(&GeoCoordinate::new(10.05, 10.02), EPSILON)
        );
        assert_eq!(f.tracking.get(), TrackingMode::None);
        assert_eq!(f.tracking.version(), tracking_version + 1);

        // The write-back is not read back as an external change
        let report = process(&mut f);
        assert!(!report.viewport_read);
        assert!(!report.viewport_written);
        assert!(!f.renderer.last().camera_changed);
        assert_eq!(f.region.version(), region_version + 1);
        assert_eq!(f.renderer.last().tracking_mode, TrackingMode::None);
    }

    #[test]
    fn test_location_updates_after_pan_do_not_recenter() {
        let mut f = fixture(TrackingMode::Follow);
        process(&mut f);

        let end = rect_centered_at(&f, 10.5, 10.5);
        f.view
            .handle_gesture(GestureEvent::pan(GesturePhase::Ended, end))
            .unwrap();
        let written = f.region.get();

        f.location.push_fix(GeoCoordinate::new(37.0, -122.0));
        let report = process(&mut f);
        assert!(!report.recentered);
        assert_eq!(f.region.get(), written);
    }

    #[test]
    fn test_follow_then_update_recenters_with_same_span() {
        let mut f = fixture(TrackingMode::None);
        process(&mut f);

        f.tracking.set(TrackingMode::Follow);
        let report = process(&mut f);
        assert!(!report.recentered);
        assert_eq!(
            report.tracking_status,
            TrackingStatus::Stalled(LocationUnavailable::NoFix)
        );

        assert!(f.location.push_fix(GeoCoordinate::new(37.0, -122.0)));
        let version = f.region.version();
        let report = process(&mut f);
        assert!(report.recentered);
        assert!(report.viewport_written);
        assert_eq!(report.tracking_status, TrackingStatus::Following);
        assert_eq!(f.region.version(), version + 1);

        let region = f.region.get();
        assert_eq!(region.center, GeoCoordinate::new(37.0, -122.0));
        assert_eq!(region.span, start_region().span);

        let frame = f.renderer.last();
        assert!(frame.camera_changed);
        assert_eq!(frame.user_location, Some(GeoCoordinate::new(37.0, -122.0)));
        assert_eq!(frame.tracking_mode, TrackingMode::Follow);
    }

    #[test]
    fn test_burst_of_updates_writes_once() {
        let mut f = fixture(TrackingMode::Follow);
        process(&mut f);

        let version = f.region.version();
        f.location.push_fix(GeoCoordinate::new(1.0, 1.0));
        f.location.push_fix(GeoCoordinate::new(2.0, 2.0));
        f.location.push_fix(GeoCoordinate::new(3.0, 3.0));
        process(&mut f);

        assert_eq!(f.region.version(), version + 1);
        assert_eq!(f.region.get().center, GeoCoordinate::new(3.0, 3.0));
    }

    #[test]
    fn test_follow_without_updates_leaves_viewport_alone() {
        let mut f = fixture(TrackingMode::Follow);
        let before = f.region.get();
        let version = f.region.version();

        for _ in 0..10 {
            let report = process(&mut f);
            assert!(!report.recentered);
            assert_eq!(
                report.tracking_status,
                TrackingStatus::Stalled(LocationUnavailable::NoFix)
            );
        }
        assert_eq!(f.region.get(), before);
        assert_eq!(f.region.version(), version);
        assert_eq!(f.view.tracking_mode(), TrackingMode::Follow);
    }

    #[test]
    fn test_denied_location_stalls_follow() {
        let mut f = fixture(TrackingMode::Follow);
        f.location.push_denied();
        let report = process(&mut f);
        assert!(!report.recentered);
        assert_eq!(
            report.tracking_status,
            TrackingStatus::Stalled(LocationUnavailable::NotAuthorized)
        );
        assert_eq!(f.renderer.last().user_location, None);
        assert_eq!(f.view.tracking_mode(), TrackingMode::Follow);
    }

    #[test]
    fn test_updates_in_none_do_not_move_viewport() {
        let mut f = fixture(TrackingMode::None);
        process(&mut f);
        let version = f.region.version();

        f.location.push_fix(GeoCoordinate::new(37.0, -122.0));
        let report = process(&mut f);
        assert!(!report.recentered);
        assert_eq!(f.region.version(), version);
        // Still shown as the user's location
        assert_eq!(
            f.renderer.last().user_location,
            Some(GeoCoordinate::new(37.0, -122.0))
        );

        // Entering follow uses the fix already known
        f.tracking.set(TrackingMode::Follow);
        let report = process(&mut f);
        assert!(report.recentered);
        assert_eq!(f.region.get().center, GeoCoordinate::new(37.0, -122.0));
    }

    #[test]
    fn test_external_none_stops_recentering() {
        let mut f = fixture(TrackingMode::Follow);
        f.location.push_fix(GeoCoordinate::new(1.0, 1.0));
        process(&mut f);

        f.tracking.set(TrackingMode::None);
        f.location.push_fix(GeoCoordinate::new(2.0, 2.0));
        let report = process(&mut f);
        assert!(!report.recentered);
        assert_eq!(f.region.get().center, GeoCoordinate::new(1.0, 1.0));
    }

    #[test]
    fn test_external_viewport_write_is_read() {
        let mut f = fixture(TrackingMode::None);
        process(&mut f);

        let moved = start_region().recentered(GeoCoordinate::new(-33.0, 151.0));
        f.region.set(moved);
        let version = f.region.version();

        let report = process(&mut f);
        assert!(report.viewport_read);
        assert!(!report.viewport_written);
        assert!(f.renderer.last().camera_changed);
        assert!(f.view.viewport_region().approx_eq(&moved, EPSILON));
        assert_eq!(f.region.version(), version);
    }

    #[test]
    fn test_external_write_mid_gesture_wins() {
        let mut f = fixture(TrackingMode::None);
        process(&mut f);

        let dragging = rect_centered_at(&f, 10.5, 10.5);
        let outcome = f
            .view
            .handle_gesture(GestureEvent::pan(GesturePhase::Changed, dragging))
            .unwrap();
        assert_eq!(outcome, GestureOutcome::Applied);

        let external = start_region().recentered(GeoCoordinate::new(48.0, 2.0));
        f.region.set(external);
        let report = process(&mut f);
        assert!(report.viewport_read);
        assert!(f.renderer.last().camera_changed);
        assert!(f.view.viewport_region().approx_eq(&external, EPSILON));
        assert_eq!(f.renderer.last().viewport, f.view.viewport_rect());

        // The rest of the cancelled drag neither moves nor commits anything
        let version = f.region.version();
        let outcome = f
            .view
            .handle_gesture(GestureEvent::pan(GesturePhase::Changed, dragging))
            .unwrap();
        assert_eq!(outcome, GestureOutcome::Ignored);
        let outcome = f
            .view
            .handle_gesture(GestureEvent::pan(GesturePhase::Ended, dragging))
            .unwrap();
        assert_eq!(outcome, GestureOutcome::Ignored);
        assert_eq!(f.region.version(), version);
        assert!(f.region.get().approx_eq(&external, EPSILON));
        assert!(f.view.viewport_region().approx_eq(&external, EPSILON));
        process(&mut f);
        assert!(f.renderer.last().camera_changed);

        // A fresh gesture is honored again
        let outcome = f
            .view
            .handle_gesture(GestureEvent::pan(GesturePhase::Ended, dragging))
            .unwrap();
        assert_eq!(outcome, GestureOutcome::Committed);
        assert_eq!(f.region.version(), version + 1);
    }

    #[test]
    fn test_external_invalid_viewport_surfaces() {
        let mut f = fixture(TrackingMode::None);
        process(&mut f);

        f.region.update(|r| r.span.latitude_delta = -1.0);
        let result = f.view.process(&mut f.renderer);
        assert!(matches!(result, Err(MapViewError::InvalidGeometry(_))));
        assert!(f.view.viewport_region().approx_eq(&start_region(), EPSILON));
    }

    #[test]
    fn test_masked_gesture_is_ignored() {
        let region = Binding::new(start_region());
        let mut view = MapView::builder_without_annotations()
            .coordinate_region(region.clone())
            .interaction_modes(InteractionModes::PAN)
            .build()
            .unwrap();
        let mut renderer = NullRenderer;
        view.process(&mut renderer).unwrap();

        let context = ProjectionContext::default();
        let zoomed = CoordinateRegion::new(
            start_region().center,
            CoordinateSpan::new(0.1, 0.05),
        );
        let rect = region_to_rect(&zoomed, &context).unwrap();

        let outcome = view
            .handle_gesture(GestureEvent::zoom(GesturePhase::Ended, rect))
            .unwrap();
        assert_eq!(outcome, GestureOutcome::Ignored);
        assert_eq!(region.version(), 0);
        assert!(view.viewport_region().approx_eq(&start_region(), EPSILON));

        // Pan is still allowed
        let outcome = view
            .handle_gesture(GestureEvent::pan(GesturePhase::Ended, rect))
            .unwrap();
        assert_eq!(outcome, GestureOutcome::Committed);
        assert_eq!(region.version(), 1);

        view.set_interaction_modes(InteractionModes::EMPTY);
        let outcome = view
            .handle_gesture(GestureEvent::pan(GesturePhase::Ended, rect))
            .unwrap();
        assert_eq!(outcome, GestureOutcome::Ignored);
    }

    #[test]
    fn test_invalid_gesture_viewport_fails() {
        let mut f = fixture(TrackingMode::Follow);
        let result = f.view.handle_gesture(GestureEvent::pan(
            GesturePhase::Ended,
            MapRect::new(0.0, 0.0, -1.0, 1.0),
        ));
        assert!(matches!(result, Err(MapViewError::InvalidGeometry(_))));
        // A rejected gesture does not count as user intent
        assert_eq!(f.view.tracking_mode(), TrackingMode::Follow);
    }

    #[test]
    fn test_rect_binding_round_trip() {
        let context = ProjectionContext::default();
        let start = region_to_rect(&start_region(), &context).unwrap();
        let rect = Binding::new(start);
        let location = ManualLocationService::new();
        let mut view = MapView::builder_without_annotations()
            .map_rect(rect.clone())
            .location_service(location.clone())
            .build()
            .unwrap();
        view.mount();
        view.set_tracking_mode(TrackingMode::Follow);
        let mut renderer = NullRenderer;
        view.process(&mut renderer).unwrap();

        location.push_fix(GeoCoordinate::new(37.0, -122.0));
        view.process(&mut renderer).unwrap();

        let written = rect_to_region(&rect.get(), &context).unwrap();
        assert!(
            written
                .center
                .approx_eq(&GeoCoordinate::new(37.0, -122.0), EPSILON)
        );
        assert!((written.span.latitude_delta - 0.5).abs() < EPSILON);
        assert!((written.span.longitude_delta - 0.25).abs() < EPSILON);

        // Gestures write the rect verbatim
        let panned = MapRect::new(
            start.origin.x + 100.0,
            start.origin.y,
            start.width,
            start.height,
        );
        view.handle_gesture(GestureEvent::pan(GesturePhase::Ended, panned))
            .unwrap();
        assert_eq!(rect.get(), panned);
        assert_eq!(view.tracking_mode(), TrackingMode::None);
    }

    #[test]
    fn test_mount_seeds_last_known_location() {
        let region = Binding::new(start_region());
        let location = ManualLocationService::new();
        location.push_fix(GeoCoordinate::new(48.8566, 2.3522));

        let mut view = MapView::builder_without_annotations()
            .coordinate_region(region.clone())
            .user_tracking_mode(Binding::new(TrackingMode::Follow))
            .location_service(location.clone())
            .build()
            .unwrap();
        view.mount();
        let report = view.process(&mut NullRenderer).unwrap();

        assert!(report.recentered);
        assert_eq!(region.get().center, GeoCoordinate::new(48.8566, 2.3522));
    }

    #[test]
    fn test_unmount_stops_location_updates() {
        let mut f = fixture(TrackingMode::Follow);
        assert!(f.location.is_subscribed());
        process(&mut f);

        f.view.unmount();
        assert!(!f.view.is_mounted());
        assert!(!f.location.is_subscribed());
        assert!(!f.location.push_fix(GeoCoordinate::new(37.0, -122.0)));

        let version = f.region.version();
        let report = process(&mut f);
        assert!(!report.recentered);
        assert_eq!(f.region.version(), version);
        assert_eq!(f.renderer.last().user_location, None);

        // Unmounting twice is harmless
        f.view.unmount();
    }

    #[test]
    fn test_follow_after_unmount_ignores_stale_fix() {
        let mut f = fixture(TrackingMode::None);
        f.location.push_fix(GeoCoordinate::new(37.0, -122.0));
        process(&mut f);

        f.view.unmount();
        f.tracking.set(TrackingMode::Follow);
        let report = process(&mut f);

        assert!(!report.recentered);
        assert_eq!(f.region.get().center, GeoCoordinate::new(10.0, 10.0));
        assert_eq!(
            report.tracking_status,
            TrackingStatus::Stalled(LocationUnavailable::NoFix)
        );
    }

    #[test]
    fn test_failed_cycles_keep_only_latest_update() {
        let mut f = fixture(TrackingMode::Follow);
        process(&mut f);

        f.items.set(vec![poi(1, 0.0, 0.0), poi(1, 1.0, 1.0)]);
        for i in 0..100 {
            f.location.push_fix(GeoCoordinate::new(i as f64 * 0.1, 0.0));
            let result = f.view.process(&mut f.renderer);
            assert!(matches!(result, Err(MapViewError::DuplicateIdentity { .. })));
            assert!(f.view.sink.pending() <= 1);
        }

        // Once the items are fixed the latest reading still applies
        f.items.set(vec![poi(1, 0.0, 0.0)]);
        let report = process(&mut f);
        assert!(report.recentered);
        assert!(
            f.region
                .get()
                .center
                .approx_eq(&GeoCoordinate::new(9.9, 0.0), EPSILON)
        );
    }

    #[test]
    fn test_rect_bound_recenter_near_pole_stays_consistent() {
        let context = ProjectionContext::default();
        let rect = Binding::new(region_to_rect(&start_region(), &context).unwrap());
        let location = ManualLocationService::new();
        let mut view = MapView::builder_without_annotations()
            .map_rect(rect.clone())
            .location_service(location.clone())
            .build()
            .unwrap();
        view.mount();
        view.set_tracking_mode(TrackingMode::Follow);
        view.process(&mut NullRenderer).unwrap();

        location.push_fix(GeoCoordinate::new(85.0, 0.0));
        let report = view.process(&mut NullRenderer).unwrap();
        assert!(report.recentered);

        let bound = rect_to_region(&rect.get(), &context).unwrap();
        assert_eq!(view.viewport_rect(), rect.get());
        assert!(view.viewport_region().approx_eq(&bound, EPSILON));
        let north = bound.center.latitude + bound.span.latitude_delta / 2.0;
        assert!(north <= MAX_LATITUDE + EPSILON);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let f = fixture(TrackingMode::None);
        let location = f.location.clone();
        assert!(location.is_subscribed());
        drop(f);
        assert!(!location.is_subscribed());
    }

    #[test]
    fn test_user_location_hidden_unless_enabled() {
        let mut f = fixture(TrackingMode::None);
        f.view.set_shows_user_location(false);
        f.location.push_fix(GeoCoordinate::new(1.0, 1.0));
        process(&mut f);
        assert_eq!(f.renderer.last().user_location, None);

        f.view.set_shows_user_location(true);
        process(&mut f);
        assert_eq!(
            f.renderer.last().user_location,
            Some(GeoCoordinate::new(1.0, 1.0))
        );
    }

    struct NullRenderer;

    impl<K, A> Renderer<K, A> for NullRenderer {
        fn render(&mut self, _frame: &RenderFrame<'_, K, A>) {}
    }
}
