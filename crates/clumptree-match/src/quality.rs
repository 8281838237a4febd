//! Pairwise match quality between two consecutive snapshots.
//!
//! For every previous clump `i` and current clump `j` the scorer combines
//! three closeness factors, each of the form `max(0, 1 - a * f)`:
//!
//! - **drift**: `f` is the distance between clump `j` and where clump `i`
//!   would be after drifting at its velocity for `dt`, in units of `j`'s
//!   radius. With `a = 0.3` the factor collapses at about 3.33 radii.
//! - **radius**: `f` is the relative radius difference
//!   `|r1 - r0| / (0.5 * (r1 + r0))`.
//! - **mass**: `f` is the relative mass difference, or the relative radius
//!   difference again under [`MassTerm::LegacyRadius`].
//!
//! The product lies in `[0, 1]`: `0` means no plausible match, `1` means
//! identical.

use serde::{Deserialize, Serialize};

use crate::snapshot::{distance, Clump, Snapshot};
use crate::MatchError;

// ---------------------------------------------------------------------------
// ScoringParams
// ---------------------------------------------------------------------------

/// Which relative difference feeds the mass closeness factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MassTerm {
    /// Relative difference of the clump masses.
    #[default]
    Mass,
    /// Relative difference of the clump radii, reproducing historical track
    /// catalogues that were built with the mass factor wired to the radius.
    LegacyRadius,
}

/// Coefficients of the quality heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringParams {
    /// Scale on drift distance measured in current-clump radii.
    pub drift_coefficient: f64,
    /// Scale on the relative radius difference.
    pub radius_coefficient: f64,
    /// Scale on the relative mass difference.
    pub mass_coefficient: f64,
    /// Which relative difference feeds the mass factor.
    pub mass_term: MassTerm,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            drift_coefficient: 0.3,
            radius_coefficient: 0.3,
            mass_coefficient: 0.3,
            mass_term: MassTerm::Mass,
        }
    }
}

impl ScoringParams {
    /// Check that every coefficient is finite and strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidParameter`] naming the first bad value.
    pub fn validate(&self) -> Result<(), MatchError> {
        for (name, value) in [
            ("drift_coefficient", self.drift_coefficient),
            ("radius_coefficient", self.radius_coefficient),
            ("mass_coefficient", self.mass_coefficient),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(MatchError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// QualityMatrix
// ---------------------------------------------------------------------------

/// Dense row-major matrix of match qualities: rows are previous clumps,
/// columns are current clumps.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl QualityMatrix {
    /// Build a matrix from row-major values.
    ///
    /// # Panics
    ///
    /// Panics if `values.len() != rows * cols`.
    pub fn from_row_major(rows: usize, cols: usize, values: Vec<f64>) -> Self {
        assert_eq!(
            values.len(),
            rows * cols,
            "quality matrix of {rows}x{cols} needs {} values, got {}",
            rows * cols,
            values.len()
        );
        Self { rows, cols, values }
    }

    /// An all-zero matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![0.0; rows * cols],
        }
    }

    /// Number of previous clumps.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of current clumps.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Quality of previous clump `row` against current clump `col`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    /// All qualities of one previous clump.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.cols..(row + 1) * self.cols]
    }

    /// Qualities of every previous clump against current clump `col`.
    pub fn column(&self, col: usize) -> impl Iterator<Item = f64> + '_ {
        (0..self.rows).map(move |row| self.get(row, col))
    }

    /// Row-major backing storage.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

// ---------------------------------------------------------------------------
// QualityScorer
// ---------------------------------------------------------------------------

/// Computes [`QualityMatrix`]es between consecutive snapshots.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    params: ScoringParams,
}

impl QualityScorer {
    /// Create a scorer with validated parameters.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidParameter`] if a coefficient is not
    /// finite and positive.
    pub fn new(params: ScoringParams) -> Result<Self, MatchError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// The parameters in use.
    pub fn params(&self) -> &ScoringParams {
        &self.params
    }

    /// Score every clump of `previous` against every clump of `current`.
    ///
    /// With the `parallel` feature enabled, rows are filled on the rayon
    /// thread pool. Every cell is independent, so the result is identical to
    /// the sequential path.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::NonIncreasingTime`] if `current` is not strictly
    /// later than `previous`, even when either snapshot is empty.
    pub fn score(&self, previous: &Snapshot, current: &Snapshot) -> Result<QualityMatrix, MatchError> {
        let dt = current.time() - previous.time();
        if dt <= 0.0 {
            return Err(MatchError::NonIncreasingTime {
                previous: previous.time(),
                current: current.time(),
            });
        }

        let (n0, n1) = (previous.len(), current.len());
        let mut matrix = QualityMatrix::zeros(n0, n1);
        if n0 == 0 || n1 == 0 {
            return Ok(matrix);
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            matrix
                .values
                .par_chunks_mut(n1)
                .zip(previous.clumps().par_iter())
                .for_each(|(row, old)| self.fill_row(row, old, current.clumps(), dt));
        }
        #[cfg(not(feature = "parallel"))]
        {
            for (row, old) in matrix.values.chunks_mut(n1).zip(previous.clumps()) {
                self.fill_row(row, old, current.clumps(), dt);
            }
        }

        Ok(matrix)
    }

    fn fill_row(&self, row: &mut [f64], old: &Clump, current: &[Clump], dt: f64) {
        let predicted = old.drifted_position(dt);
        for (cell, new) in row.iter_mut().zip(current) {
            *cell = self.pair_quality_from(&predicted, old, new);
        }
    }

    /// Quality of a single pair separated by `dt`.
    pub fn pair_quality(&self, old: &Clump, new: &Clump, dt: f64) -> f64 {
        self.pair_quality_from(&old.drifted_position(dt), old, new)
    }

    fn pair_quality_from(&self, predicted: &[f64; 3], old: &Clump, new: &Clump) -> f64 {
        let p = &self.params;

        let drift = distance(&new.position, predicted) / new.radius;
        let f_drift = closeness(p.drift_coefficient, drift);
        if f_drift == 0.0 {
            return 0.0;
        }

        let dr = relative_difference(new.radius, old.radius);
        let f_radius = closeness(p.radius_coefficient, dr);

        let dm = match p.mass_term {
            MassTerm::Mass => relative_difference(new.mass, old.mass),
            MassTerm::LegacyRadius => dr,
        };
        let f_mass = closeness(p.mass_coefficient, dm);

        f_drift * f_radius * f_mass
    }
}

/// `|a - b|` relative to the mean of `a` and `b`.
fn relative_difference(a: f64, b: f64) -> f64 {
    (a - b).abs() / (0.5 * (a + b))
}

/// `max(0, 1 - coefficient * f)`.
fn closeness(coefficient: f64, f: f64) -> f64 {
    (1.0 - coefficient * f).max(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn clump(position: [f64; 3], velocity: [f64; 3], mass: f64, radius: f64) -> Clump {
        Clump {
            label: 0,
            position,
            velocity,
            mass,
            radius,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn identical_clumps_score_one() {
        let c = clump([1.0, 2.0, 3.0], [0.0; 3], 5.0, 2.0);
        let scorer = QualityScorer::default();
        assert_eq!(scorer.pair_quality(&c, &c, 1.0), 1.0);
    }

    #[test]
    fn drift_uses_previous_velocity() {
        let old = clump([0.0; 3], [1.0, 0.0, 0.0], 1.0, 1.0);
        let new = clump([2.0, 0.0, 0.0], [1.0, 0.0, 0.0], 1.0, 1.0);
        let scorer = QualityScorer::default();
        // Exactly where the drift predicts after dt = 2.
        assert_eq!(scorer.pair_quality(&old, &new, 2.0), 1.0);
        // One radius off after dt = 1.
        assert!(approx(scorer.pair_quality(&old, &new, 1.0), 0.7));
    }

    #[test]
    fn drift_factor_collapses_past_tolerance() {
        let old = clump([0.0; 3], [0.0; 3], 1.0, 1.0);
        let near = clump([3.3, 0.0, 0.0], [0.0; 3], 1.0, 1.0);
        let far = clump([3.4, 0.0, 0.0], [0.0; 3], 1.0, 1.0);
        let scorer = QualityScorer::default();
        assert!(scorer.pair_quality(&old, &near, 1.0) > 0.0);
        assert_eq!(scorer.pair_quality(&old, &far, 1.0), 0.0);
    }

    #[test]
    fn drift_is_measured_in_current_radii() {
        let old = clump([0.0; 3], [0.0; 3], 1.0, 1.0);
        let new = clump([4.0, 0.0, 0.0], [0.0; 3], 1.0, 2.0);
        let scorer = QualityScorer::default();
        // d / r1 = 2 -> 0.4 drift; dr = 1/1.5 -> 0.8 radius; mass equal.
        assert!(approx(scorer.pair_quality(&old, &new, 1.0), 0.4 * 0.8));
    }

    #[test]
    fn mass_term_variants_differ() {
        let old = clump([0.0; 3], [0.0; 3], 1.0, 1.0);
        let new = clump([0.0; 3], [0.0; 3], 3.0, 1.0);

        let by_mass = QualityScorer::default();
        // dm = 2 / 2 = 1 -> 0.7
        assert!(approx(by_mass.pair_quality(&old, &new, 1.0), 0.7));

        let legacy = QualityScorer::new(ScoringParams {
            mass_term: MassTerm::LegacyRadius,
            ..ScoringParams::default()
        })
        .unwrap();
        // Radii are equal, so the legacy mass factor is 1.
        assert_eq!(legacy.pair_quality(&old, &new, 1.0), 1.0);
    }

    #[test]
    fn score_requires_increasing_time() {
        let a = Snapshot::new(1.0, vec![]).unwrap();
        let b = Snapshot::new(1.0, vec![]).unwrap();
        let err = QualityScorer::default().score(&a, &b).unwrap_err();
        assert_eq!(
            err,
            MatchError::NonIncreasingTime {
                previous: 1.0,
                current: 1.0
            }
        );
    }

    #[test]
    fn score_shapes_matrix_previous_by_current() {
        let prev = Snapshot::new(
            0.0,
            vec![
                clump([0.0; 3], [0.0; 3], 2.0, 1.0),
                clump([10.0, 0.0, 0.0], [0.0; 3], 1.0, 1.0),
            ],
        )
        .unwrap();
        let curr = Snapshot::new(
            0.5,
            vec![
                clump([10.0, 0.0, 0.0], [0.0; 3], 1.0, 1.0),
                clump([0.0; 3], [0.0; 3], 2.0, 1.0),
                clump([50.0, 0.0, 0.0], [0.0; 3], 1.0, 1.0),
            ],
        )
        .unwrap();

        let m = QualityScorer::default().score(&prev, &curr).unwrap();
        assert_eq!((m.rows(), m.cols()), (2, 3));
        assert_eq!(m.get(0, 1), 1.0);
        assert_eq!(m.get(1, 0), 1.0);
        assert_eq!(m.get(0, 0), 0.0);
        assert_eq!(m.column(2).collect::<Vec<_>>(), vec![0.0, 0.0]);
        assert_eq!(m.row(1), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn empty_sides_give_empty_matrix() {
        let prev = Snapshot::new(0.0, vec![]).unwrap();
        let curr = Snapshot::new(1.0, vec![clump([0.0; 3], [0.0; 3], 1.0, 1.0)]).unwrap();
        let m = QualityScorer::default().score(&prev, &curr).unwrap();
        assert_eq!((m.rows(), m.cols()), (0, 1));
        assert!(m.as_slice().is_empty());
    }

    #[test]
    fn invalid_coefficients_are_rejected() {
        let params = ScoringParams {
            drift_coefficient: -1.0,
            ..ScoringParams::default()
        };
        assert_eq!(
            QualityScorer::new(params).unwrap_err(),
            MatchError::InvalidParameter {
                name: "drift_coefficient",
                value: -1.0
            }
        );
        let params = ScoringParams {
            mass_coefficient: f64::NAN,
            ..ScoringParams::default()
        };
        assert!(QualityScorer::new(params).is_err());
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: ScoringParams =
            serde_json::from_str(r#"{"mass_term":"legacy_radius"}"#).unwrap();
        assert_eq!(params.mass_term, MassTerm::LegacyRadius);
        assert_eq!(params.drift_coefficient, 0.3);
    }
}
