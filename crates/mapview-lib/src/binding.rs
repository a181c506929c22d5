//! Shared handles to externally owned state
//!
//! A [`Binding`] is a cheap, cloneable handle: the owner keeps one clone and hands
//! another to the map view. Every write bumps a version counter so readers can tell
//! whether anything changed since they last looked, without observing the write as it
//! happens. Bindings are single-threaded (`Rc`), matching the host UI's update cycle.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct Slot<T> {
    value: T,
    version: u64,
}

/// A versioned, shared handle to a value owned outside the map view
pub struct Binding<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Binding<T> {
    pub fn new(value: T) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot { value, version: 0 })),
        }
    }

    /// Replace the value (last write wins)
    pub fn set(&self, value: T) {
        let mut slot = self.slot.borrow_mut();
        slot.value = value;
        slot.version += 1;
    }

    /// Mutate the value in place; counts as one write
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut slot = self.slot.borrow_mut();
        slot.version += 1;
        f(&mut slot.value)
    }

    /// Read the value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.slot.borrow().value)
    }

    /// Number of writes so far
    #[inline]
    pub fn version(&self) -> u64 {
        self.slot.borrow().version
    }

    /// Whether both handles point at the same state
    #[inline]
    pub fn ptr_eq(&self, other: &Binding<T>) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<T: Clone> Binding<T> {
    pub fn get(&self) -> T {
        self.slot.borrow().value.clone()
    }
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T: Default> Default for Binding<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.borrow();
        f.debug_struct("Binding")
            .field("value", &slot.value)
            .field("version", &slot.version)
            .finish()
    }
}
