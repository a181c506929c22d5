//! Simulated location feed
//!
//! A tokio task walks a small circle around a starting point and sends one reading per
//! tick over an mpsc channel. The UI thread pumps the channel into a
//! [`ManualLocationService`] each frame, so the map view only ever sees updates on its
//! own thread.

use mapview_lib::{GeoCoordinate, LocationUpdate, ManualLocationService};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Radius of the simulated walk, in degrees
const WALK_RADIUS: f64 = 0.004;

/// Steps for one full lap
const STEPS_PER_LAP: u32 = 120;

const TICK: Duration = Duration::from_millis(500);

/// Position after `step` ticks of the simulated walk
pub fn simulated_fix(origin: GeoCoordinate, step: u32) -> GeoCoordinate {
    let angle = (step % STEPS_PER_LAP) as f64 / STEPS_PER_LAP as f64 * std::f64::consts::TAU;
    let latitude = (origin.latitude + WALK_RADIUS * angle.sin()).clamp(-90.0, 90.0);
    // Keep the circle round on screen away from the equator
    let scale = origin.latitude.to_radians().cos().max(0.01);
    let longitude = origin.longitude + WALK_RADIUS * (angle.cos() - 1.0) / scale;
    // The walk may cross the antimeridian
    let longitude = (longitude + 180.0).rem_euclid(360.0) - 180.0;
    GeoCoordinate::new(latitude, longitude)
}

/// Owns the simulation task and the UI side of its channel
pub struct LocationFeed {
    receiver: mpsc::Receiver<LocationUpdate>,
    service: ManualLocationService,
    authorized: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<()>,
}

impl LocationFeed {
    /// Spawn the simulation on the current tokio runtime, if there is one
    pub fn spawn(origin: GeoCoordinate) -> Option<Self> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("No tokio runtime, location simulation disabled: {e}");
                return None;
            }
        };

        let (sender, receiver) = mpsc::channel(64);
        let authorized = Arc::new(AtomicBool::new(true));
        let task = handle.spawn(simulate(origin, sender, authorized.clone()));
        tracing::info!(
            "Simulating user location around ({:.5}, {:.5})",
            origin.latitude,
            origin.longitude
        );

        Some(Self {
            receiver,
            service: ManualLocationService::new(),
            authorized,
            task,
        })
    }

    /// Handle to hand to the map view
    pub fn service(&self) -> ManualLocationService {
        self.service.clone()
    }

    /// Whether the simulated user grants location access
    pub fn set_authorized(&self, authorized: bool) {
        self.authorized.store(authorized, Ordering::Relaxed);
    }

    /// Move every received reading into the location service; returns how many arrived
    pub fn pump(&mut self) -> usize {
        let mut received = 0;
        while let Ok(update) = self.receiver.try_recv() {
            self.service.push(update);
            received += 1;
        }
        received
    }
}

impl Drop for LocationFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn simulate(
    origin: GeoCoordinate,
    sender: mpsc::Sender<LocationUpdate>,
    authorized: Arc<AtomicBool>,
) {
    let mut interval = tokio::time::interval(TICK);
    let mut step = 0u32;
    loop {
        interval.tick().await;
        let update = if authorized.load(Ordering::Relaxed) {
            step = step.wrapping_add(1);
            LocationUpdate::fix(simulated_fix(origin, step))
        } else {
            LocationUpdate::denied()
        };
        if sender.send(update).await.is_err() {
            tracing::debug!("Location receiver dropped, stopping simulation");
            break;
        }
    }
}
