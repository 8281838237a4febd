//! Terminal tracking record with BLAKE3 hashing.
//!
//! A [`TrackingRecord`] is the serializable result of a tracking run: every
//! [`Track`] keyed by identifier, the per-step identifier lists, and the
//! largest identifier minted. A BLAKE3 content hash over those fields makes
//! two runs cheap to compare and catches corrupted or hand-edited records.
//!
//! ```
//! use clumptree_engine::prelude::*;
//!
//! let clump = Clump {
//!     label: 0,
//!     position: [0.0, 0.0, 0.0],
//!     velocity: [0.0, 0.0, 0.0],
//!     mass: 1.0,
//!     radius: 1.0,
//! };
//! let source = MemorySource::from_snapshots([
//!     Snapshot::new(0.0, vec![clump.clone()]).unwrap(),
//!     Snapshot::new(1.0, vec![clump]).unwrap(),
//! ]);
//!
//! let record = Tracker::track_source(TrackerConfig::default(), &source).unwrap();
//! assert_eq!(record.hash.len(), 64); // BLAKE3 hex digest
//!
//! let json = record.to_json().unwrap();
//! let restored = TrackingRecord::from_json(&json).unwrap();
//! assert_eq!(restored, record);
//! ```

use std::collections::BTreeMap;

use clumptree_match::identity::ClumpId;
use serde::{Deserialize, Serialize};

use crate::track::Track;
use crate::tracker::StepRecord;

/// Errors produced while building, encoding, or verifying a record.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("record JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(
        "record hash mismatch: recorded {recorded} but recomputed {recomputed}. \
         The record may be corrupted or tampered with."
    )]
    HashMismatch {
        recorded: String,
        recomputed: String,
    },
}

// ---------------------------------------------------------------------------
// TrackingRecord
// ---------------------------------------------------------------------------

/// The complete, hashed output of a tracking run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    /// Every track, keyed by identifier. `BTreeMap` keeps serialization
    /// order deterministic.
    pub tracks: BTreeMap<ClumpId, Track>,
    /// Identifier lists of every processed snapshot, in input order.
    pub steps: Vec<StepRecord>,
    /// Largest identifier minted during the run.
    pub max_id: Option<ClumpId>,
    /// BLAKE3 hex digest (64 lowercase hex chars) of the fields above.
    pub hash: String,
}

/// Compute the BLAKE3 hex digest of the hashable record fields.
///
/// The hash field itself is not included.
fn compute_hash(
    tracks: &BTreeMap<ClumpId, Track>,
    steps: &[StepRecord],
    max_id: Option<ClumpId>,
) -> Result<String, RecordError> {
    #[derive(Serialize)]
    struct HashableRecord<'a> {
        tracks: &'a BTreeMap<ClumpId, Track>,
        steps: &'a [StepRecord],
        max_id: Option<ClumpId>,
    }

    let json_bytes = serde_json::to_vec(&HashableRecord {
        tracks,
        steps,
        max_id,
    })?;
    Ok(blake3::hash(&json_bytes).to_hex().to_string())
}

impl TrackingRecord {
    /// Assemble a record and compute its hash.
    pub fn new(
        tracks: BTreeMap<ClumpId, Track>,
        steps: Vec<StepRecord>,
        max_id: Option<ClumpId>,
    ) -> Result<Self, RecordError> {
        let hash = compute_hash(&tracks, &steps, max_id)?;
        Ok(Self {
            tracks,
            steps,
            max_id,
            hash,
        })
    }

    /// Recompute the hash and compare it with the recorded one.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::HashMismatch`] if the content no longer matches
    /// its hash.
    pub fn verify(&self) -> Result<(), RecordError> {
        let recomputed = compute_hash(&self.tracks, &self.steps, self.max_id)?;
        if recomputed != self.hash {
            return Err(RecordError::HashMismatch {
                recorded: self.hash.clone(),
                recomputed,
            });
        }
        Ok(())
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a record and verify its hash.
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        let record: Self = serde_json::from_str(json)?;
        record.verify()?;
        Ok(record)
    }

    /// The track of one identifier.
    pub fn track(&self, id: ClumpId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    /// Identifiers whose track is still growing in the final step.
    pub fn live_ids(&self) -> &[ClumpId] {
        self.steps
            .last()
            .map(|s| s.ids.as_slice())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
