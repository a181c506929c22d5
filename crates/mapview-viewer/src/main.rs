#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use mapview_viewer::{MapViewerApp, Settings};
use tracing_subscriber::EnvFilter;

const APP_NAME: &str = "Map View Viewer";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mapview_lib=debug,mapview_viewer=debug")),
        )
        .init();

    let settings = Settings::from_cli();
    tracing::info!("Starting {} {}", APP_NAME, env!("CARGO_PKG_VERSION"));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let native_options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([1280.0, 720.0])
                .with_title(APP_NAME)
                .with_drag_and_drop(true),
            ..Default::default()
        };

        eframe::run_native(
            APP_NAME,
            native_options,
            Box::new(move |cc| {
                let app: Box<dyn eframe::App> =
                    Box::new(MapViewerApp::new(cc, settings).map_err(|e| e.to_string())?);
                Ok(app)
            }),
        )
    })?;

    Ok(())
}
