//! Permitted-gesture bitmask

use crate::GestureKind;
use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Set of user gestures the map view currently permits
///
/// Any integer is accepted on construction and kept as-is, but queries only look at
/// the defined flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct InteractionModes(u32);

impl InteractionModes {
    pub const EMPTY: Self = Self(0);
    pub const PAN: Self = Self(1 << 0);
    pub const ZOOM: Self = Self(1 << 1);
    pub const ALL: Self = Self(Self::PAN.0 | Self::ZOOM.0);

    /// Build from a raw value, preserving undefined bits
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw value including any undefined bits
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    const fn defined(self) -> u32 {
        self.0 & Self::ALL.0
    }

    /// Whether every defined flag of `other` is set in `self`
    ///
    /// Undefined bits are ignored on both sides, so a value without defined flags
    /// (such as `EMPTY`) is contained in every mask.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        let wanted = other.defined();
        self.defined() & wanted == wanted
    }

    /// True when no defined flag is set
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.defined() == 0
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Whether a gesture of this kind may change the viewport
    pub fn allows(self, kind: GestureKind) -> bool {
        match kind {
            GestureKind::Pan => self.contains(Self::PAN),
            GestureKind::Zoom => self.contains(Self::ZOOM),
        }
    }
}

impl Default for InteractionModes {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for InteractionModes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for InteractionModes {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl BitAnd for InteractionModes {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl BitAndAssign for InteractionModes {
    fn bitand_assign(&mut self, rhs: Self) {
        *self = self.intersection(rhs);
    }
}

impl fmt::Debug for InteractionModes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::PAN) {
            names.push("PAN");
        }
        if self.contains(Self::ZOOM) {
            names.push("ZOOM");
        }
        write!(f, "InteractionModes({}; {:#x})", names.join(" | "), self.0)
    }
}
