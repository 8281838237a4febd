//! Snapshot sources.
//!
//! A [`SnapshotSource`] is the tracker's only window onto simulation output:
//! it lists the available step numbers and hands over one [`RawSnapshot`]
//! per step. Reading and deriving fields from storage-specific layouts is
//! the source's business; the tracker only performs the named-field lookup
//! through [`SnapshotSource::fetch`].

use std::collections::BTreeMap;

use clumptree_match::snapshot::{RawSnapshot, Snapshot};
use clumptree_match::SnapshotError;

/// Errors raised at the snapshot-source boundary.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The requested step is not part of the simulation.
    #[error("step {step} not in simulation")]
    UnknownStep { step: u64 },

    /// The source could not produce the step (I/O or format failure in the
    /// source's own storage).
    #[error("step {step} could not be read: {reason}")]
    Unavailable { step: u64, reason: String },

    /// The step was produced but a required field is missing or malformed.
    #[error("step {step}: {source}")]
    Field {
        step: u64,
        #[source]
        source: SnapshotError,
    },
}

impl SourceError {
    /// The step the error refers to.
    pub fn step(&self) -> u64 {
        match self {
            SourceError::UnknownStep { step }
            | SourceError::Unavailable { step, .. }
            | SourceError::Field { step, .. } => *step,
        }
    }
}

/// Provider of per-step snapshots.
pub trait SnapshotSource {
    /// All step numbers, in ascending order.
    fn steps(&self) -> Result<Vec<u64>, SourceError>;

    /// The raw named-field snapshot for `step`.
    fn snapshot(&self, step: u64) -> Result<RawSnapshot, SourceError>;

    /// Fetch `step` and validate it into a [`Snapshot`].
    fn fetch(&self, step: u64) -> Result<Snapshot, SourceError> {
        let raw = self.snapshot(step)?;
        Snapshot::from_raw(&raw).map_err(|source| SourceError::Field { step, source })
    }
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// A [`SnapshotSource`] backed by raw snapshots held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    steps: BTreeMap<u64, RawSnapshot>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a source from validated snapshots numbered `0..`.
    pub fn from_snapshots<I>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = Snapshot>,
    {
        let steps = snapshots
            .into_iter()
            .enumerate()
            .map(|(step, snapshot)| (step as u64, snapshot.to_raw()))
            .collect();
        Self { steps }
    }

    /// Insert or replace the raw snapshot for `step`.
    pub fn insert(&mut self, step: u64, raw: RawSnapshot) -> Option<RawSnapshot> {
        self.steps.insert(step, raw)
    }

    /// Insert a validated snapshot for `step`.
    pub fn insert_snapshot(&mut self, step: u64, snapshot: &Snapshot) -> Option<RawSnapshot> {
        self.insert(step, snapshot.to_raw())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl SnapshotSource for MemorySource {
    fn steps(&self) -> Result<Vec<u64>, SourceError> {
        Ok(self.steps.keys().copied().collect())
    }

    fn snapshot(&self, step: u64) -> Result<RawSnapshot, SourceError> {
        self.steps
            .get(&step)
            .cloned()
            .ok_or(SourceError::UnknownStep { step })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
