//! Map view configuration

use crate::{InteractionModes, ProjectionContext};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for a map view
///
/// The builder's `interaction_modes` and `shows_user_location` setters write through to
/// this struct, so either can be used.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Map plane used for the region/rect conversions.
    /// Default: a 2^28 point Web Mercator world at (0, 0)
    pub projection: ProjectionContext,
    /// Gestures allowed to change the viewport. Default: all
    pub interaction_modes: InteractionModes,
    /// Whether the renderer is given the user's location to draw.
    /// Only takes effect once location access is authorized. Default: false
    pub shows_user_location: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            projection: ProjectionContext::default(),
            interaction_modes: InteractionModes::ALL,
            shows_user_location: false,
        }
    }
}
