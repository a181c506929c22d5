//! Map View Library - Viewport, Annotation and Tracking State Model
//!
//! This library implements the state model behind a declarative map view: the two-way
//! binding between a displayed viewport and externally owned state, a reconciled set of
//! annotations keyed by stable identity, the permitted-gesture mask and the user tracking
//! state machine. Rendering, location services and the host UI are collaborators reached
//! through the [`Renderer`] and [`LocationService`] traits.
//!
//! # Architecture
//!
//! - **[`transform`]**: Pure conversions between [`CoordinateRegion`] and [`MapRect`]
//! - **[`InteractionModes`]**: Bitmask of permitted gestures
//! - **[`AnnotationRegistry`]**: Identity-keyed diffing of annotation placements
//! - **[`TrackingController`]**: Follow/none state machine fed by location updates
//! - **[`MapView`]**: The controller composing all of the above, driven once per frame
//!
//! # Processing Model
//!
//! Everything runs on the host's UI thread. External state is shared through [`Binding`]
//! handles that the controller reads at the start of a cycle and writes at most once at
//! the end of it, so a write-back never triggers another read.

pub mod annotation;
pub mod binding;
mod config;
pub mod controller;
pub mod geometry;
pub mod interaction;
pub mod location;
pub mod renderer;
pub mod tracking;
pub mod transform;

// Public API exports
pub use annotation::{
    Anchor, Annotation, AnnotationContent, AnnotationDiff, AnnotationForm, AnnotationPlacement,
    AnnotationRegistry, Identifiable, MapAnnotation, MapMarker, MapPin, Tint,
};
pub use binding::Binding;
pub use config::Config;
pub use controller::{CycleReport, GestureOutcome, MapView, MapViewBuilder, NoItem};
pub use geometry::{CoordinateRegion, CoordinateSpan, GeoCoordinate, MapPoint, MapRect};
pub use interaction::InteractionModes;
pub use location::{LocationService, LocationSink, LocationUpdate, ManualLocationService};
pub use renderer::{GestureEvent, GestureKind, GesturePhase, RenderFrame, Renderer};
pub use tracking::{
    LocationUnavailable, TrackingController, TrackingEffect, TrackingMode, TrackingStatus,
};
pub use transform::ProjectionContext;

/// Error types for the map view
#[derive(Debug, thiserror::Error)]
pub enum MapViewError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Duplicate annotation identity: {id}")]
    DuplicateIdentity { id: String },

    #[error("Both a coordinate region and a map rect are bound; exactly one is allowed")]
    ConflictingViewport,

    #[error("No viewport binding: bind a coordinate region or a map rect")]
    MissingViewport,
}

pub type Result<T> = std::result::Result<T, MapViewError>;
