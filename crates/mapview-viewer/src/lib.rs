//! Map View Viewer - Application Library
//!
//! Hosts a `mapview-lib` map view on an eframe/walkers slippy map, with a simulated
//! location feed and GPX waypoints as annotations.

mod app;

pub use app::MapViewerApp;
pub use app::settings::Settings;
