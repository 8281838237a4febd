//! Snapshot-by-snapshot identity tracking.
//!
//! The [`Matcher`] owns the match state (previous snapshot, previous
//! identifiers, identity counter) and advances it one snapshot at a time:
//!
//! 1. **Init** -- the first snapshot's `n` clumps get identifiers `1..=n` in
//!    snapshot order.
//! 2. **Step** -- every later snapshot is scored against the previous one
//!    and identifiers are assigned from the quality matrix. The snapshot and
//!    its identifiers then become the new previous state.
//!
//! The [`Tracker`] drives a [`Matcher`] over a snapshot stream and
//! accumulates one [`Track`] per identifier plus the per-step identifier
//! history.
//!
//! # Example
//!
//! ```
//! use clumptree_engine::prelude::*;
//!
//! let clump = Clump {
//!     label: 0,
//!     position: [0.0, 0.0, 0.0],
//!     velocity: [1.0, 0.0, 0.0],
//!     mass: 2.0,
//!     radius: 1.0,
//! };
//! let mut moved = clump.clone();
//! moved.position = [1.0, 0.0, 0.0];
//!
//! let mut tracker = Tracker::with_defaults();
//! tracker.push(Snapshot::new(0.0, vec![clump]).unwrap()).unwrap();
//! let ids = tracker.push(Snapshot::new(1.0, vec![moved]).unwrap()).unwrap();
//!
//! assert_eq!(ids, &[ClumpId::from_raw(1)]);
//! assert_eq!(tracker.track(ClumpId::from_raw(1)).unwrap().len(), 1);
//! ```
//!
//! Steps are strictly sequential: each depends on the identifiers produced by
//! the one before it.

use std::collections::BTreeMap;

use clumptree_match::assign::Assigner;
use clumptree_match::identity::{ClumpId, IdentityCounter};
use clumptree_match::quality::QualityScorer;
use clumptree_match::snapshot::Snapshot;
use clumptree_match::MatchError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::record::TrackingRecord;
use crate::source::SnapshotSource;
use crate::track::Track;
use crate::TrackError;

// ---------------------------------------------------------------------------
// StepOutcome / StepRecord
// ---------------------------------------------------------------------------

/// What one call to [`Matcher::advance`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// One identifier per clump, in snapshot order.
    pub ids: Vec<ClumpId>,
    /// Identifiers carried over from the previous snapshot.
    pub reused: usize,
    /// Identifiers minted for new clumps.
    pub minted: usize,
}

/// The identifiers assigned to one processed snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Snapshot time.
    pub time: f64,
    /// One identifier per clump, in snapshot order.
    pub ids: Vec<ClumpId>,
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// The previous snapshot together with the identifiers it was given.
#[derive(Debug, Clone)]
struct Previous {
    snapshot: Snapshot,
    ids: Vec<ClumpId>,
}

/// Matches each snapshot against the one before it and hands out
/// identifiers.
#[derive(Debug, Clone)]
pub struct Matcher {
    scorer: QualityScorer,
    assigner: Assigner,
    counter: IdentityCounter,
    previous: Option<Previous>,
}

impl Matcher {
    pub fn new(scorer: QualityScorer, assigner: Assigner) -> Self {
        Self {
            scorer,
            assigner,
            counter: IdentityCounter::new(),
            previous: None,
        }
    }

    /// Build a matcher from the scoring and strategy parts of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidParameter`] for unusable coefficients.
    pub fn from_config(config: &TrackerConfig) -> Result<Self, MatchError> {
        Ok(Self::new(
            QualityScorer::new(config.scoring)?,
            Assigner::new(config.strategy),
        ))
    }

    /// Returns `true` once the first snapshot has been processed.
    pub fn is_started(&self) -> bool {
        self.previous.is_some()
    }

    /// Process the next snapshot.
    ///
    /// The first call initialises identifiers `1..=n`; later calls score the
    /// snapshot against the previous one and assign. On error the match
    /// state is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::NonIncreasingTime`] if `snapshot` is not
    /// strictly later than the previous snapshot.
    pub fn advance(&mut self, snapshot: Snapshot) -> Result<StepOutcome, MatchError> {
        let Some(previous) = &self.previous else {
            return Ok(self.start(snapshot));
        };

        let quality = self.scorer.score(&previous.snapshot, &snapshot)?;
        let mut counter = self.counter.clone();
        let assignment = self.assigner.assign(&quality, &previous.ids, &mut counter)?;

        self.counter = counter;
        let outcome = StepOutcome {
            reused: assignment.reused(),
            minted: assignment.minted,
            ids: assignment.ids,
        };
        self.previous = Some(Previous {
            snapshot,
            ids: outcome.ids.clone(),
        });
        Ok(outcome)
    }

    fn start(&mut self, first: Snapshot) -> StepOutcome {
        let ids: Vec<ClumpId> = (0..first.len()).map(|_| self.counter.mint()).collect();
        let outcome = StepOutcome {
            reused: 0,
            minted: ids.len(),
            ids: ids.clone(),
        };
        self.previous = Some(Previous {
            snapshot: first,
            ids,
        });
        outcome
    }

    /// The largest identifier handed out so far.
    pub fn max_id(&self) -> Option<ClumpId> {
        self.counter.last_minted()
    }

    /// The most recently processed snapshot.
    pub fn previous_snapshot(&self) -> Option<&Snapshot> {
        self.previous.as_ref().map(|p| &p.snapshot)
    }

    /// Identifiers of the most recently processed snapshot.
    pub fn previous_ids(&self) -> &[ClumpId] {
        self.previous
            .as_ref()
            .map(|p| p.ids.as_slice())
            .unwrap_or_default()
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(QualityScorer::default(), Assigner::default())
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Drives a [`Matcher`] over a snapshot sequence and accumulates tracks.
#[derive(Debug, Clone)]
pub struct Tracker {
    config: TrackerConfig,
    matcher: Matcher,
    tracks: BTreeMap<ClumpId, Track>,
    history: Vec<StepRecord>,
}

impl Tracker {
    /// Create a tracker.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::Match`] if the scoring coefficients are invalid.
    pub fn new(config: TrackerConfig) -> Result<Self, TrackError> {
        let matcher = Matcher::from_config(&config)?;
        Ok(Self {
            config,
            matcher,
            tracks: BTreeMap::new(),
            history: Vec::new(),
        })
    }

    /// Create a tracker with default configuration.
    pub fn with_defaults() -> Self {
        Self {
            config: TrackerConfig::default(),
            matcher: Matcher::default(),
            tracks: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    /// Process the next snapshot and return the identifiers assigned to its
    /// clumps, in snapshot order.
    ///
    /// Every clump appends one sample to the track of its identifier (the
    /// first snapshot only if `record_first_snapshot` is set). A failed step
    /// changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::Match`] if the snapshot time does not increase.
    pub fn push(&mut self, snapshot: Snapshot) -> Result<&[ClumpId], TrackError> {
        if self.config.check_mass_order && !snapshot.is_mass_sorted() {
            warn!(
                time = snapshot.time(),
                clumps = snapshot.len(),
                "snapshot is not sorted by descending mass; matching priority follows source order"
            );
        }

        let is_first = !self.matcher.is_started();
        let time = snapshot.time();
        let outcome = self.matcher.advance(snapshot)?;
        debug!(
            step = self.history.len(),
            clumps = outcome.ids.len(),
            reused = outcome.reused,
            minted = outcome.minted,
            "assigned clump identifiers"
        );

        if !is_first || self.config.record_first_snapshot {
            if let Some(current) = self.matcher.previous_snapshot() {
                for (id, clump) in outcome.ids.iter().zip(current.clumps()) {
                    self.tracks
                        .entry(*id)
                        .or_insert_with(|| Track::new(*id))
                        .add(time, clump.position, clump.mass, clump.radius);
                }
            }
        }

        self.history.push(StepRecord {
            time,
            ids: outcome.ids,
        });
        Ok(self
            .history
            .last()
            .map(|r| r.ids.as_slice())
            .unwrap_or_default())
    }

    /// Process every step of `source` in ascending step order.
    ///
    /// Returns the number of snapshots processed by this call.
    ///
    /// # Errors
    ///
    /// Stops at the first failing step. Source errors already name their
    /// step and are returned as [`TrackError::Source`]; matching errors are
    /// wrapped in [`TrackError::AtStep`]. Steps before it remain processed.
    pub fn run<S>(&mut self, source: &S) -> Result<usize, TrackError>
    where
        S: SnapshotSource + ?Sized,
    {
        let steps = source.steps()?;
        info!(steps = steps.len(), "tracking clumps");

        for &step in &steps {
            let snapshot = source.fetch(step)?;
            self.push(snapshot).map_err(|cause| TrackError::AtStep {
                step,
                source: Box::new(cause),
            })?;
        }

        info!(
            steps = steps.len(),
            tracks = self.tracks.len(),
            max_id = self.max_id().map(ClumpId::get),
            "clump tracking finished"
        );
        Ok(steps.len())
    }

    /// Track every step of `source` with a fresh tracker and return the
    /// terminal record.
    pub fn track_source<S>(config: TrackerConfig, source: &S) -> Result<TrackingRecord, TrackError>
    where
        S: SnapshotSource + ?Sized,
    {
        let mut tracker = Self::new(config)?;
        tracker.run(source)?;
        Ok(tracker.into_record()?)
    }

    /// All tracks, keyed by identifier.
    pub fn tracks(&self) -> &BTreeMap<ClumpId, Track> {
        &self.tracks
    }

    /// The track of one identifier.
    pub fn track(&self, id: ClumpId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    /// Identifier lists of every processed snapshot, in input order.
    pub fn history(&self) -> &[StepRecord] {
        &self.history
    }

    /// Number of snapshots processed.
    pub fn steps_processed(&self) -> usize {
        self.history.len()
    }

    /// The largest identifier handed out so far.
    pub fn max_id(&self) -> Option<ClumpId> {
        self.matcher.max_id()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Consume the tracker and produce its hashed terminal record.
    pub fn into_record(self) -> Result<TrackingRecord, crate::record::RecordError> {
        let max_id = self.max_id();
        TrackingRecord::new(self.tracks, self.history, max_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
