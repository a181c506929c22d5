//! Location service collaborator and update marshaling
//!
//! Location services may produce updates at any time. They never touch the map view
//! directly: they deliver into a [`LocationSink`], a FIFO queue the map view drains on
//! its own processing cycle.

use crate::GeoCoordinate;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// One reading from a location service
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationUpdate {
    pub coordinate: GeoCoordinate,
    /// False when the user has not (or no longer) authorized location access
    pub authorized: bool,
}

impl LocationUpdate {
    /// An authorized fix
    pub fn fix(coordinate: GeoCoordinate) -> Self {
        Self {
            coordinate,
            authorized: true,
        }
    }

    /// Access denied; the coordinate carries no information
    pub fn denied() -> Self {
        Self {
            coordinate: GeoCoordinate::default(),
            authorized: false,
        }
    }
}

#[derive(Debug, Default)]
struct SinkState {
    pending: VecDeque<LocationUpdate>,
    open: bool,
}

/// Queue end handed to a [`LocationService`] on subscription
#[derive(Debug, Clone)]
pub struct LocationSink {
    state: Rc<RefCell<SinkState>>,
}

impl LocationSink {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SinkState {
                pending: VecDeque::new(),
                open: true,
            })),
        }
    }

    /// Queue an update; returns false (and drops it) once the sink is closed
    pub fn deliver(&self, update: LocationUpdate) -> bool {
        let mut state = self.state.borrow_mut();
        if state.open {
            state.pending.push_back(update);
        }
        state.open
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.state.borrow().open
    }

    /// Number of queued updates
    #[inline]
    pub fn pending(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Take every queued update in arrival order
    pub(crate) fn drain(&self) -> Vec<LocationUpdate> {
        self.state.borrow_mut().pending.drain(..).collect()
    }

    /// Drop every queued update but the most recent one
    pub(crate) fn keep_latest(&self) {
        let mut state = self.state.borrow_mut();
        let excess = state.pending.len().saturating_sub(1);
        state.pending.drain(..excess);
    }

    /// Stop accepting updates and drop anything queued
    pub(crate) fn close(&self) {
        let mut state = self.state.borrow_mut();
        state.open = false;
        state.pending.clear();
    }

    pub(crate) fn reopen(&self) {
        self.state.borrow_mut().open = true;
    }
}

impl Default for LocationSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Source of device location readings
pub trait LocationService {
    /// Start delivering updates into `sink`
    fn subscribe(&mut self, sink: LocationSink);

    /// Stop delivering updates
    fn unsubscribe(&mut self);

    /// Most recent reading, if the service has one
    fn last_known(&self) -> Option<LocationUpdate> {
        None
    }
}

#[derive(Debug, Default)]
struct ManualState {
    sink: Option<LocationSink>,
    last: Option<LocationUpdate>,
}

/// A location service driven by its owner
///
/// Clones share state, so the host can keep one handle and push readings (from a
/// simulation, a channel, a test) while the map view owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualLocationService {
    state: Rc<RefCell<ManualState>>,
}

impl ManualLocationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and forward a reading; returns whether a subscriber received it
    pub fn push(&self, update: LocationUpdate) -> bool {
        let mut state = self.state.borrow_mut();
        state.last = Some(update);
        match &state.sink {
            Some(sink) => sink.deliver(update),
            None => false,
        }
    }

    pub fn push_fix(&self, coordinate: GeoCoordinate) -> bool {
        self.push(LocationUpdate::fix(coordinate))
    }

    pub fn push_denied(&self) -> bool {
        self.push(LocationUpdate::denied())
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.borrow().sink.is_some()
    }
}

impl LocationService for ManualLocationService {
    fn subscribe(&mut self, sink: LocationSink) {
        self.state.borrow_mut().sink = Some(sink);
    }

    fn unsubscribe(&mut self) {
        self.state.borrow_mut().sink = None;
    }

    fn last_known(&self) -> Option<LocationUpdate> {
        self.state.borrow().last
    }
}
