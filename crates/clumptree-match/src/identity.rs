//! Clump identifiers and the identity counter.
//!
//! A [`ClumpId`] names one physical clump across every snapshot it appears
//! in. Identifiers are positive, handed out in strictly increasing order by
//! an [`IdentityCounter`], and never reused once their clump disappears.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ClumpId
// ---------------------------------------------------------------------------

/// A persistent clump identifier. The first identifier ever minted is `1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClumpId(u64);

impl ClumpId {
    /// Wrap a raw identifier value.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ClumpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClumpId({})", self.0)
    }
}

impl fmt::Display for ClumpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// ---------------------------------------------------------------------------
// IdentityCounter
// ---------------------------------------------------------------------------

/// Hands out fresh [`ClumpId`]s in strictly increasing order.
///
/// The counter holds the *next* identifier to mint. A fresh counter starts at
/// `1`, so minting `n` identifiers for the first snapshot yields `1..=n` and
/// leaves the counter at `n + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityCounter {
    next: u64,
}

impl IdentityCounter {
    /// Create a counter whose first mint is `ClumpId(1)`.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Create a counter that continues after `last`, i.e. its first mint is
    /// `last + 1`.
    pub fn continuing_after(last: ClumpId) -> Self {
        Self { next: last.0 + 1 }
    }

    /// Mint a fresh identifier and advance the counter.
    pub fn mint(&mut self) -> ClumpId {
        let id = ClumpId(self.next);
        self.next += 1;
        tracing::trace!(clump_id = id.0, "minted clump identifier");
        id
    }

    /// The identifier the next call to [`mint`](Self::mint) will return.
    pub fn peek(&self) -> ClumpId {
        ClumpId(self.next)
    }

    /// The largest identifier minted so far, or `None` if nothing was minted.
    pub fn last_minted(&self) -> Option<ClumpId> {
        (self.next > 1).then(|| ClumpId(self.next - 1))
    }

    /// Number of identifiers minted so far.
    pub fn minted_count(&self) -> u64 {
        self.next - 1
    }
}

impl Default for IdentityCounter {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
