//! Snapshot data model and the named-field boundary.
//!
//! A [`Snapshot`] is the validated, immutable set of clumps detected at one
//! simulation time. Snapshot providers hand data over as a [`RawSnapshot`]:
//! a table of named fields with arrays aligned by clump index, the layout a
//! columnar reader naturally produces. [`Snapshot::from_raw`] looks up the
//! required fields by name and validates shapes and values.
//!
//! Clumps are expected in descending-mass order. The matcher relies on that
//! order for priority but never sorts; [`Snapshot::is_mass_sorted`] lets
//! callers check.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::SnapshotError;

/// A 3-component vector (position or velocity).
pub type Vec3 = [f64; 3];

/// Required field names of a [`RawSnapshot`].
pub mod fields {
    /// Source-local clump labels, one per clump.
    pub const LABEL: &str = "index";
    /// Peak positions, 3 rows of N components.
    pub const POSITION: &str = "pos";
    /// Bulk velocities, 3 rows of N components.
    pub const VELOCITY: &str = "vel";
    /// Clump masses, N values.
    pub const MASS: &str = "mass_cl";
    /// Clump radii, N values.
    pub const RADIUS: &str = "radius";
    /// Snapshot time, a scalar.
    pub const TIME: &str = "time";

    /// Every field [`Snapshot::from_raw`](super::Snapshot::from_raw) requires.
    pub const REQUIRED: [&str; 6] = [LABEL, POSITION, VELOCITY, MASS, RADIUS, TIME];
}

// ---------------------------------------------------------------------------
// Clump
// ---------------------------------------------------------------------------

/// One detected clump within a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clump {
    /// Label assigned by the snapshot source. Only meaningful within that
    /// snapshot.
    pub label: u64,
    pub position: Vec3,
    pub velocity: Vec3,
    pub mass: f64,
    pub radius: f64,
}

impl Clump {
    /// Position this clump would reach after drifting for `dt` at its
    /// current velocity.
    pub fn drifted_position(&self, dt: f64) -> Vec3 {
        [
            self.position[0] + self.velocity[0] * dt,
            self.position[1] + self.velocity[1] * dt,
            self.position[2] + self.velocity[2] * dt,
        ]
    }
}

/// Euclidean distance between two points.
pub(crate) fn distance(a: &Vec3, b: &Vec3) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The validated set of clumps detected at one time.
///
/// Every value is finite and every mass and radius is strictly positive, so
/// quality scores computed from two snapshots are always well defined.
/// Deserialization goes through [`Snapshot::new`] and enforces the same
/// checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRepr")]
pub struct Snapshot {
    time: f64,
    clumps: Vec<Clump>,
}

/// Unvalidated wire form of a [`Snapshot`].
#[derive(Deserialize)]
struct SnapshotRepr {
    time: f64,
    clumps: Vec<Clump>,
}

impl TryFrom<SnapshotRepr> for Snapshot {
    type Error = SnapshotError;

    fn try_from(repr: SnapshotRepr) -> Result<Self, Self::Error> {
        Snapshot::new(repr.time, repr.clumps)
    }
}

impl Snapshot {
    /// Build a snapshot from typed clumps.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NonFinite`] for NaN/infinite values and
    /// [`SnapshotError::NonPositive`] for zero or negative masses and radii.
    pub fn new(time: f64, clumps: Vec<Clump>) -> Result<Self, SnapshotError> {
        if !time.is_finite() {
            return Err(SnapshotError::NonFinite {
                field: fields::TIME.to_owned(),
                index: None,
            });
        }
        for (index, clump) in clumps.iter().enumerate() {
            check_finite(fields::POSITION, index, &clump.position)?;
            check_finite(fields::VELOCITY, index, &clump.velocity)?;
            check_positive(fields::MASS, index, clump.mass)?;
            check_positive(fields::RADIUS, index, clump.radius)?;
        }
        Ok(Self { time, clumps })
    }

    /// A snapshot with no clumps.
    pub fn empty(time: f64) -> Result<Self, SnapshotError> {
        Self::new(time, Vec::new())
    }

    /// Build a snapshot by looking up the required named fields of `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::MissingField`] if any of
    /// [`fields::REQUIRED`] is absent, shape/length errors when arrays do not
    /// line up with the label array, and the validation errors of
    /// [`Snapshot::new`].
    pub fn from_raw(raw: &RawSnapshot) -> Result<Self, SnapshotError> {
        let time = raw.scalar(fields::TIME)?;
        let labels = raw.labels(fields::LABEL)?;
        let n = labels.len();
        let positions = raw.vectors(fields::POSITION, n)?;
        let velocities = raw.vectors(fields::VELOCITY, n)?;
        let masses = raw.column(fields::MASS, n)?;
        let radii = raw.column(fields::RADIUS, n)?;

        let clumps = labels
            .into_iter()
            .enumerate()
            .map(|(i, label)| Clump {
                label,
                position: positions[i],
                velocity: velocities[i],
                mass: masses[i],
                radius: radii[i],
            })
            .collect();
        Self::new(time, clumps)
    }

    /// Convert back to the named-field layout.
    pub fn to_raw(&self) -> RawSnapshot {
        let mut pos = vec![Vec::with_capacity(self.len()); 3];
        let mut vel = vec![Vec::with_capacity(self.len()); 3];
        for clump in &self.clumps {
            for axis in 0..3 {
                pos[axis].push(clump.position[axis]);
                vel[axis].push(clump.velocity[axis]);
            }
        }
        RawSnapshot::new()
            .with_field(fields::TIME, FieldValue::Scalar(self.time))
            .with_field(
                fields::LABEL,
                FieldValue::Labels(self.clumps.iter().map(|c| c.label).collect()),
            )
            .with_field(fields::POSITION, FieldValue::Rows(pos))
            .with_field(fields::VELOCITY, FieldValue::Rows(vel))
            .with_field(
                fields::MASS,
                FieldValue::Column(self.clumps.iter().map(|c| c.mass).collect()),
            )
            .with_field(
                fields::RADIUS,
                FieldValue::Column(self.clumps.iter().map(|c| c.radius).collect()),
            )
    }

    /// Snapshot time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Clumps in source order.
    pub fn clumps(&self) -> &[Clump] {
        &self.clumps
    }

    /// Number of clumps.
    pub fn len(&self) -> usize {
        self.clumps.len()
    }

    /// Returns `true` if the snapshot holds no clumps.
    pub fn is_empty(&self) -> bool {
        self.clumps.is_empty()
    }

    /// Returns `true` if clumps are in descending (non-increasing) mass order.
    pub fn is_mass_sorted(&self) -> bool {
        self.clumps.windows(2).all(|w| w[0].mass >= w[1].mass)
    }
}

fn check_finite(field: &str, index: usize, v: &Vec3) -> Result<(), SnapshotError> {
    if v.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(SnapshotError::NonFinite {
            field: field.to_owned(),
            index: Some(index),
        })
    }
}

fn check_positive(field: &str, index: usize, value: f64) -> Result<(), SnapshotError> {
    if !value.is_finite() {
        return Err(SnapshotError::NonFinite {
            field: field.to_owned(),
            index: Some(index),
        });
    }
    if value <= 0.0 {
        return Err(SnapshotError::NonPositive {
            field: field.to_owned(),
            index,
            value,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// RawSnapshot
// ---------------------------------------------------------------------------

/// The value stored under one field name of a [`RawSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// A single number (e.g. the snapshot time).
    Scalar(f64),
    /// One number per clump.
    Column(Vec<f64>),
    /// Integer labels, one per clump.
    Labels(Vec<u64>),
    /// Several per-clump rows (e.g. 3 rows of N for positions).
    Rows(Vec<Vec<f64>>),
}

/// A snapshot as handed over by a source: named fields holding arrays aligned
/// by clump index.
///
/// Fields are kept in a `BTreeMap` so serialization order is deterministic.
/// Extra fields are allowed and ignored by [`Snapshot::from_raw`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    fields: BTreeMap<String, FieldValue>,
}

impl RawSnapshot {
    /// Create an empty field table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_field(mut self, name: &str, value: FieldValue) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a field, returning the previous value.
    pub fn insert(&mut self, name: &str, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(name.to_owned(), value)
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    /// Look up a field by name.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::MissingField`] if no field has that name.
    pub fn get(&self, name: &str) -> Result<&FieldValue, SnapshotError> {
        self.fields
            .get(name)
            .ok_or_else(|| SnapshotError::MissingField {
                field: name.to_owned(),
            })
    }

    /// Names of all fields present, in sorted order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    fn scalar(&self, name: &str) -> Result<f64, SnapshotError> {
        match self.get(name)? {
            FieldValue::Scalar(v) => Ok(*v),
            _ => Err(wrong_shape(name, "a scalar")),
        }
    }

    fn labels(&self, name: &str) -> Result<Vec<u64>, SnapshotError> {
        match self.get(name)? {
            FieldValue::Labels(labels) => Ok(labels.clone()),
            // Tabular readers often carry labels as floating-point columns.
            FieldValue::Column(values) => values
                .iter()
                .map(|&v| {
                    // `u64::MAX as f64` rounds up to 2^64, the first
                    // value that would saturate.
                    if v.is_finite() && v >= 0.0 && v < u64::MAX as f64 && v.fract() == 0.0 {
                        Ok(v as u64)
                    } else {
                        Err(wrong_shape(name, "non-negative integer labels"))
                    }
                })
                .collect(),
            _ => Err(wrong_shape(name, "a column of labels")),
        }
    }

    fn column(&self, name: &str, n: usize) -> Result<Vec<f64>, SnapshotError> {
        match self.get(name)? {
            FieldValue::Column(values) => {
                check_len(name, n, values.len())?;
                Ok(values.clone())
            }
            _ => Err(wrong_shape(name, "a column of one value per clump")),
        }
    }

    fn vectors(&self, name: &str, n: usize) -> Result<Vec<Vec3>, SnapshotError> {
        let rows = match self.get(name)? {
            FieldValue::Rows(rows) if rows.len() == 3 => rows,
            _ => return Err(wrong_shape(name, "3 rows of per-clump components")),
        };
        for row in rows {
            check_len(name, n, row.len())?;
        }
        Ok((0..n).map(|i| [rows[0][i], rows[1][i], rows[2][i]]).collect())
    }
}

fn wrong_shape(name: &str, expected: &'static str) -> SnapshotError {
    SnapshotError::WrongShape {
        field: name.to_owned(),
        expected,
    }
}

fn check_len(name: &str, expected: usize, found: usize) -> Result<(), SnapshotError> {
    if expected == found {
        Ok(())
    } else {
        Err(SnapshotError::LengthMismatch {
            field: name.to_owned(),
            expected,
            found,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
