//! User tracking state machine
//!
//! Two modes, `None` and `Follow`. User intent always wins: a manual pan or zoom drops
//! back to `None` at once. While following, every authorized fix recenters the map.
//! Missing or unauthorized fixes never fail anything; they only stall recentering, and
//! the stall is visible through [`TrackingController::status`].

use crate::{GeoCoordinate, LocationUpdate};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the map responds to user location updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrackingMode {
    #[default]
    None,
    Follow,
}

/// Why following cannot recenter right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationUnavailable {
    /// No authorized fix has arrived yet
    NoFix,
    /// The user has not authorized location access
    NotAuthorized,
}

/// Reported tracking condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackingStatus {
    /// Mode is `None`
    Idle,
    /// Following a known fix
    Following,
    /// Mode is `Follow` but there is nothing to follow
    Stalled(LocationUnavailable),
}

/// What the map view must do after a tracking input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackingEffect {
    /// Leave the viewport alone
    Hold,
    /// Move the viewport center here, keeping the span
    Recenter(GeoCoordinate),
}

/// Tracking mode plus the latest location knowledge
#[derive(Debug, Clone, Default)]
pub struct TrackingController {
    mode: TrackingMode,
    /// Latest authorized fix
    last_fix: Option<GeoCoordinate>,
    /// `None` until the first update arrives
    authorized: Option<bool>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl TrackingController {
    pub fn new(initial: TrackingMode) -> Self {
        Self {
            mode: initial,
            last_fix: None,
            authorized: None,
        }
    }

    #[inline]
    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    #[inline]
    pub fn last_fix(&self) -> Option<GeoCoordinate> {
        self.last_fix
    }

    pub fn status(&self) -> TrackingStatus {
        match self.mode {
            TrackingMode::None => TrackingStatus::Idle,
            TrackingMode::Follow if self.authorized == Some(false) => {
                TrackingStatus::Stalled(LocationUnavailable::NotAuthorized)
            }
            TrackingMode::Follow if self.last_fix.is_some() => TrackingStatus::Following,
            TrackingMode::Follow => TrackingStatus::Stalled(LocationUnavailable::NoFix),
        }
    }

    /// The user moved the map by hand; returns whether the mode changed
    pub fn user_override(&mut self) -> bool {
        if self.mode == TrackingMode::Follow {
            tracing::debug!("Tracking disabled by user gesture");
            self.mode = TrackingMode::None;
            true
        } else {
            false
        }
    }

    /// Apply a mode chosen by the binding owner
    ///
    /// `current` is the location service's latest reading, if it has one. Entering
    /// `Follow` recenters on the best known fix right away.
    pub fn set_mode(
        &mut self,
        mode: TrackingMode,
        current: Option<LocationUpdate>,
    ) -> TrackingEffect {
        if let Some(update) = current {
            self.absorb(update);
        }
        if mode == self.mode {
            return TrackingEffect::Hold;
        }

        tracing::debug!("Tracking mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        match (mode, self.last_fix) {
            (TrackingMode::Follow, Some(fix)) => TrackingEffect::Recenter(fix),
            (TrackingMode::Follow, None) => {
                tracing::debug!("Following without a fix, waiting for the next update");
                TrackingEffect::Hold
            }
            (TrackingMode::None, _) => TrackingEffect::Hold,
        }
    }

    /// Drop everything learned from the location service
    ///
    /// Used when the service goes away; following then waits for a fresh reading.
    pub fn forget_fix(&mut self) {
        self.last_fix = None;
        self.authorized = None;
    }

    /// Feed one location reading
    pub fn location_update(&mut self, update: LocationUpdate) -> TrackingEffect {
        if !self.absorb(update) {
            return TrackingEffect::Hold;
        }
        match (self.mode, self.last_fix) {
            (TrackingMode::Follow, Some(fix)) => TrackingEffect::Recenter(fix),
            _ => TrackingEffect::Hold,
        }
    }

    /// Record a reading; returns whether it produced a usable fix
    fn absorb(&mut self, update: LocationUpdate) -> bool {
        if !update.authorized {
            if self.authorized != Some(false) {
                tracing::info!("Location access not authorized; recentering paused");
            }
            self.authorized = Some(false);
            self.last_fix = None;
            return false;
        }
        if !update.coordinate.is_valid() {
            tracing::warn!(
                "Ignoring location update outside valid range: ({}, {})",
                update.coordinate.latitude,
                update.coordinate.longitude
            );
            return false;
        }
        self.authorized = Some(true);
        self.last_fix = Some(update.coordinate);
        true
    }
}
