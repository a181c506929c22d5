use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Map View Viewer - A desktop host for the mapview controller on a walkers slippy map
pub struct Settings {
    /// GPX files whose waypoints are shown as annotations
    #[clap(short, long, value_name = "FILE")]
    pub gpx_files: Vec<PathBuf>,

    /// Initial center latitude (overrides the persisted region)
    #[clap(long, allow_negative_numbers = true)]
    pub latitude: Option<f64>,

    /// Initial center longitude (overrides the persisted region)
    #[clap(long, allow_negative_numbers = true)]
    pub longitude: Option<f64>,

    /// Initial span in degrees, used for both latitude and longitude
    #[clap(long, default_value = "0.05")]
    pub span: f64,

    /// Start following the (simulated) user location
    #[clap(long, default_value = "false")]
    pub follow: bool,

    /// Draw the user location on the map
    #[clap(long, default_value = "false")]
    pub shows_user_location: bool,

    /// Disallow panning the map by hand
    #[clap(long, default_value = "false")]
    pub no_pan: bool,

    /// Disallow zooming the map by hand
    #[clap(long, default_value = "false")]
    pub no_zoom: bool,

    /// Bind the viewport as a map rect instead of a coordinate region
    #[clap(long, default_value = "false")]
    pub map_rect: bool,

    /// Ignore previously persisted state and start fresh
    #[clap(long, default_value = "false")]
    pub ignore_persisted: bool,
}

impl Settings {
    pub fn from_cli() -> Self {
        Settings::try_parse().unwrap_or_else(|e| e.exit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::parse_from(["mapview-viewer"]);
        assert!(settings.gpx_files.is_empty());
        assert_eq!(settings.latitude, None);
        assert_eq!(settings.span, 0.05);
        assert!(!settings.follow);
        assert!(!settings.map_rect);
    }

    #[test]
    fn test_flags() {
        let settings = Settings::parse_from([
            "mapview-viewer",
            "--latitude",
            "-33.86",
            "--longitude",
            "151.21",
            "--follow",
            "--no-zoom",
            "-g",
            "a.gpx",
        ]);
        assert_eq!(settings.latitude, Some(-33.86));
        assert_eq!(settings.longitude, Some(151.21));
        assert!(settings.follow);
        assert!(settings.no_zoom);
        assert!(!settings.no_pan);
        assert_eq!(settings.gpx_files, vec![PathBuf::from("a.gpx")]);
    }
}
