//! Clumptree Engine -- snapshot-stream driver for clump identity tracking.
//!
//! This crate builds on [`clumptree_match`] to follow density clumps across a
//! whole simulation: it pulls snapshots from a [`SnapshotSource`](source::SnapshotSource),
//! advances a [`Matcher`](tracker::Matcher) one snapshot at a time, and
//! accumulates one [`Track`](track::Track) per identifier. A finished run
//! becomes a hashed [`TrackingRecord`](record::TrackingRecord).
//!
//! # Quick Start
//!
//! ```
//! use clumptree_engine::prelude::*;
//!
//! let big = Clump {
//!     label: 0,
//!     position: [0.0, 0.0, 0.0],
//!     velocity: [0.0, 0.0, 0.0],
//!     mass: 4.0,
//!     radius: 2.0,
//! };
//! let small = Clump {
//!     label: 1,
//!     position: [40.0, 0.0, 0.0],
//!     mass: 1.0,
//!     radius: 1.0,
//!     ..big.clone()
//! };
//!
//! let source = MemorySource::from_snapshots([
//!     Snapshot::new(0.0, vec![big.clone()]).unwrap(),
//!     Snapshot::new(1.0, vec![big, small]).unwrap(),
//! ]);
//!
//! let mut tracker = Tracker::with_defaults();
//! assert_eq!(tracker.run(&source).unwrap(), 2);
//!
//! let ids: Vec<u64> = tracker.history()[1].ids.iter().map(|id| id.get()).collect();
//! assert_eq!(ids, vec![1, 2]);
//! assert_eq!(tracker.max_id(), Some(ClumpId::from_raw(2)));
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod record;
pub mod source;
pub mod track;
pub mod tracker;

use clumptree_match::MatchError;

use crate::record::RecordError;
use crate::source::SourceError;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the matching crate for convenience.
pub use clumptree_match;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while tracking a snapshot stream.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Record(#[from] RecordError),

    /// Matching failed at a step of a source. Earlier steps remain
    /// processed.
    #[error("step {step}: {source}")]
    AtStep {
        step: u64,
        #[source]
        source: Box<TrackError>,
    },
}

impl TrackError {
    /// The innermost error, with step context stripped.
    pub fn root(&self) -> &TrackError {
        match self {
            TrackError::AtStep { source, .. } => source.root(),
            other => other,
        }
    }

    /// The step at which a source-driven run failed, if known.
    pub fn step(&self) -> Option<u64> {
        match self {
            TrackError::AtStep { step, .. } => Some(*step),
            TrackError::Source(err) => Some(err.step()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use clumptree_match::prelude::*;

    pub use crate::config::{ConfigError, TrackerConfig};
    pub use crate::record::{RecordError, TrackingRecord};
    pub use crate::source::{MemorySource, SnapshotSource, SourceError};
    pub use crate::track::{Sample, Track};
    pub use crate::tracker::{Matcher, StepOutcome, StepRecord, Tracker};
    pub use crate::TrackError;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_step_exposes_step_and_root_cause() {
        let err = TrackError::AtStep {
            step: 12,
            source: Box::new(TrackError::Match(MatchError::NonIncreasingTime {
                previous: 3.0,
                current: 3.0,
            })),
        };
        assert_eq!(err.step(), Some(12));
        assert!(matches!(
            err.root(),
            TrackError::Match(MatchError::NonIncreasingTime { .. })
        ));
        assert_eq!(
            err.to_string(),
            "step 12: snapshot time must increase: previous t=3, current t=3"
        );
    }
}
