//! Clumptree Match -- cross-snapshot quality scoring and identity assignment.
//!
//! This crate is the matching core of the clumptree workspace. Given two
//! consecutive [`Snapshot`](snapshot::Snapshot)s of density clumps it builds
//! a dense quality matrix (every previous clump against every current clump)
//! and turns that matrix into one [`ClumpId`](identity::ClumpId) per current
//! clump, either reusing a previous identifier or minting a fresh one.
//!
//! The driver that walks a whole sequence of snapshots and accumulates tracks
//! lives in the `clumptree-engine` crate.
//!
//! # Quick Start
//!
//! ```
//! use clumptree_match::prelude::*;
//!
//! let clump = Clump {
//!     label: 7,
//!     position: [0.0, 0.0, 0.0],
//!     velocity: [0.0, 0.0, 0.0],
//!     mass: 1.0,
//!     radius: 1.0,
//! };
//! let before = Snapshot::new(0.0, vec![clump.clone()]).unwrap();
//! let after = Snapshot::new(1.0, vec![clump]).unwrap();
//!
//! let scorer = QualityScorer::default();
//! let quality = scorer.score(&before, &after).unwrap();
//! assert_eq!(quality.get(0, 0), 1.0);
//!
//! let mut counter = IdentityCounter::new();
//! let previous = vec![counter.mint()];
//! let assignment = Assigner::default()
//!     .assign(&quality, &previous, &mut counter)
//!     .unwrap();
//! assert_eq!(assignment.ids, previous);
//! ```

#![deny(unsafe_code)]

pub mod assign;
pub mod identity;
pub mod quality;
pub mod snapshot;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while building or validating a [`Snapshot`](snapshot::Snapshot).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SnapshotError {
    /// A required named field is absent from the raw snapshot.
    #[error("snapshot is missing required field '{field}'")]
    MissingField { field: String },

    /// A field is present but has the wrong kind of value.
    #[error("field '{field}' has the wrong shape: expected {expected}")]
    WrongShape {
        field: String,
        expected: &'static str,
    },

    /// A per-clump array does not line up with the label array.
    #[error("field '{field}' has {found} entries but the snapshot has {expected} clumps")]
    LengthMismatch {
        field: String,
        expected: usize,
        found: usize,
    },

    /// A value is NaN or infinite.
    #[error("field '{field}' holds a non-finite value at clump {index:?}")]
    NonFinite { field: String, index: Option<usize> },

    /// Mass or radius is zero or negative.
    #[error("field '{field}' must be positive, got {value} at clump {index}")]
    NonPositive {
        field: String,
        index: usize,
        value: f64,
    },
}

/// Errors produced by scoring and assignment.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    /// The current snapshot is not strictly later than the previous one, so
    /// drift prediction is undefined.
    #[error("snapshot time must increase: previous t={previous}, current t={current}")]
    NonIncreasingTime { previous: f64, current: f64 },

    /// The previous identifier list does not line up with the matrix rows.
    #[error("{ids} previous identifiers supplied for a quality matrix with {rows} rows")]
    IdentifierCountMismatch { ids: usize, rows: usize },

    /// A scoring coefficient is unusable.
    #[error("scoring parameter '{name}' must be finite and positive, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::assign::{Assigner, Assignment, AssignmentStrategy};
    pub use crate::identity::{ClumpId, IdentityCounter};
    pub use crate::quality::{MassTerm, QualityMatrix, QualityScorer, ScoringParams};
    pub use crate::snapshot::{fields, Clump, FieldValue, RawSnapshot, Snapshot, Vec3};
    pub use crate::{MatchError, SnapshotError};
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    fn clump(label: u64, x: f64, mass: f64, radius: f64) -> Clump {
        Clump {
            label,
            position: [x, 0.0, 0.0],
            velocity: [0.0, 0.0, 0.0],
            mass,
            radius,
        }
    }

    #[test]
    fn score_then_assign_keeps_identity_of_stationary_clumps() {
        let before = Snapshot::new(0.0, vec![clump(0, 0.0, 2.0, 1.0), clump(1, 50.0, 1.0, 1.0)])
            .unwrap();
        let after = Snapshot::new(1.0, vec![clump(0, 0.0, 2.0, 1.0), clump(1, 50.0, 1.0, 1.0)])
            .unwrap();

        let quality = QualityScorer::default().score(&before, &after).unwrap();
        let mut counter = IdentityCounter::new();
        let previous: Vec<ClumpId> = (0..2).map(|_| counter.mint()).collect();
        let assignment = Assigner::default()
            .assign(&quality, &previous, &mut counter)
            .unwrap();

        assert_eq!(assignment.ids, previous);
        assert_eq!(assignment.minted, 0);
        assert_eq!(counter.peek(), ClumpId::from_raw(3));
    }

    #[test]
    fn far_away_clump_mints_fresh_identifier() {
        let before = Snapshot::new(0.0, vec![clump(0, 0.0, 1.0, 1.0)]).unwrap();
        let after = Snapshot::new(1.0, vec![clump(0, 100.0, 1.0, 1.0)]).unwrap();

        let quality = QualityScorer::default().score(&before, &after).unwrap();
        assert_eq!(quality.get(0, 0), 0.0);

        let mut counter = IdentityCounter::new();
        let previous = vec![counter.mint()];
        let assignment = Assigner::default()
            .assign(&quality, &previous, &mut counter)
            .unwrap();
        assert_eq!(assignment.ids, vec![ClumpId::from_raw(2)]);
        assert_eq!(assignment.sources, vec![None]);
    }

    #[test]
    fn errors_render_offending_values() {
        let err = MatchError::NonIncreasingTime {
            previous: 2.0,
            current: 1.5,
        };
        assert_eq!(
            err.to_string(),
            "snapshot time must increase: previous t=2, current t=1.5"
        );

        let err = SnapshotError::MissingField {
            field: "mass_cl".to_owned(),
        };
        assert!(err.to_string().contains("mass_cl"));
    }
}
