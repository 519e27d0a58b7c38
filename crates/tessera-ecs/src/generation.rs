//! Store generations.
//!
//! A [`GenerationTracker`] is the single authority for "has the world moved
//! on". Every [`View`](crate::view::View) captures the tracker's
//! [`Generation`] when it is minted and compares it against the tracker on
//! every access. The tracker advances once per simulation step (and once per
//! structural removal on the [`World`](crate::world::World)), which turns every
//! previously minted view stale.
//!
//! One tracker exists per store instance. It is created with the store and
//! dropped with it; two worlds never share a tracker.

use std::cell::Cell;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// A generation token captured from a [`GenerationTracker`].
///
/// Tokens are only ever compared for equality against the tracker's current
/// value. Ordering is provided for diagnostics.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Generation(u64);

impl Generation {
    /// The generation of a freshly created store.
    pub const ZERO: Generation = Generation(0);

    /// Raw counter value.
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Generation({})", self.0)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen {}", self.0)
    }
}

// ---------------------------------------------------------------------------
// GenerationTracker
// ---------------------------------------------------------------------------

/// Monotonic per-store generation counter.
///
/// A `u64` bumped once per step never wraps in practice (at 1 MHz it would
/// take over half a million years).
#[derive(Debug, Default)]
pub struct GenerationTracker {
    current: Cell<u64>,
}

impl GenerationTracker {
    /// Create a tracker at [`Generation::ZERO`].
    pub fn new() -> Self {
        Self {
            current: Cell::new(0),
        }
    }

    /// The present generation. No side effects.
    #[inline]
    pub fn current(&self) -> Generation {
        Generation(self.current.get())
    }

    /// Advance by one and return the new generation.
    pub fn advance(&self) -> Generation {
        let next = self.current.get() + 1;
        self.current.set(next);
        Generation(next)
    }

    /// Whether `generation` is the tracker's current value.
    #[inline]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.current.get() == generation.0
    }
}
