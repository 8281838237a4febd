//! Per-identifier trajectories.
//!
//! A [`Track`] is the append-only history of one [`ClumpId`]: one
//! [`Sample`] per snapshot in which the clump was identified. Tracks are
//! never merged, split, or truncated. A clump that disappears simply stops
//! receiving samples.

use clumptree_match::identity::ClumpId;
use clumptree_match::snapshot::Vec3;
use serde::{Deserialize, Serialize};

/// One observation of a tracked clump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: f64,
    pub position: Vec3,
    pub mass: f64,
    pub radius: f64,
}

/// The observed lifetime of one clump identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    id: ClumpId,
    samples: Vec<Sample>,
}

impl Track {
    /// Create an empty track for `id`.
    pub fn new(id: ClumpId) -> Self {
        Self {
            id,
            samples: Vec::new(),
        }
    }

    /// The identifier this track belongs to.
    pub fn id(&self) -> ClumpId {
        self.id
    }

    /// Append one observation.
    pub fn add(&mut self, time: f64, position: Vec3, mass: f64, radius: f64) {
        self.samples.push(Sample {
            time,
            position,
            mass,
            radius,
        });
    }

    /// All samples in append order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample times.
    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.time).collect()
    }

    /// Sample positions.
    pub fn positions(&self) -> Vec<Vec3> {
        self.samples.iter().map(|s| s.position).collect()
    }

    /// Sample masses.
    pub fn masses(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.mass).collect()
    }

    /// Sample radii.
    pub fn radii(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.radius).collect()
    }

    /// Time of the first sample.
    pub fn first_time(&self) -> Option<f64> {
        self.samples.first().map(|s| s.time)
    }

    /// Time of the most recent sample.
    pub fn last_time(&self) -> Option<f64> {
        self.samples.last().map(|s| s.time)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
