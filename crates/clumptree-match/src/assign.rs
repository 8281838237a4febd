//! Identity assignment from a quality matrix.
//!
//! The [`Assigner`] turns a [`QualityMatrix`] (previous clumps x current
//! clumps) plus the previous step's identifiers into one [`ClumpId`] per
//! current clump.
//!
//! # Greedy (default)
//!
//! Current clumps are visited in snapshot order, i.e. heaviest first. Each
//! one claims the still-available previous clump with the highest quality;
//! ties go to the lowest row. A claimed row is unavailable to every later
//! column of the same step. If the best available quality is `0`, the clump
//! is new and gets a freshly minted identifier. Because heavier clumps pick
//! first, the outcome is order dependent rather than globally optimal.
//!
//! # Optimal
//!
//! [`AssignmentStrategy::Optimal`] links previous and current clumps so that
//! the summed quality over linked pairs is maximal (Kuhn-Munkres on
//! `1 - quality`). Zero-quality pairs are never linked. Unlinked current
//! clumps mint identifiers in snapshot order.

use serde::{Deserialize, Serialize};

use crate::identity::{ClumpId, IdentityCounter};
use crate::quality::QualityMatrix;
use crate::MatchError;

// ---------------------------------------------------------------------------
// AssignmentStrategy
// ---------------------------------------------------------------------------

/// How previous identifiers are distributed over current clumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStrategy {
    /// Heaviest-first greedy claiming.
    #[default]
    Greedy,
    /// Maximum total quality bipartite matching.
    Optimal,
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// The result of assigning identifiers to one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// One identifier per current clump, in snapshot order.
    pub ids: Vec<ClumpId>,
    /// For each current clump, the previous row whose identifier it took, or
    /// `None` if it was minted.
    pub sources: Vec<Option<usize>>,
    /// Number of freshly minted identifiers.
    pub minted: usize,
}

impl Assignment {
    /// Number of identifiers carried over from the previous step.
    pub fn reused(&self) -> usize {
        self.ids.len() - self.minted
    }
}

// ---------------------------------------------------------------------------
// Assigner
// ---------------------------------------------------------------------------

/// Assigns identifiers to the clumps of a new snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct Assigner {
    strategy: AssignmentStrategy,
}

impl Assigner {
    pub fn new(strategy: AssignmentStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> AssignmentStrategy {
        self.strategy
    }

    /// Assign identifiers for the columns of `quality`.
    ///
    /// `previous_ids[i]` is the identifier of matrix row `i`. The only side
    /// effect is minting on `counter`.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::IdentifierCountMismatch`] if `previous_ids` does
    /// not have one entry per matrix row.
    pub fn assign(
        &self,
        quality: &QualityMatrix,
        previous_ids: &[ClumpId],
        counter: &mut IdentityCounter,
    ) -> Result<Assignment, MatchError> {
        if previous_ids.len() != quality.rows() {
            return Err(MatchError::IdentifierCountMismatch {
                ids: previous_ids.len(),
                rows: quality.rows(),
            });
        }

        let sources = match self.strategy {
            AssignmentStrategy::Greedy => greedy_links(quality),
            AssignmentStrategy::Optimal => optimal_links(quality),
        };

        let mut minted = 0;
        let ids = sources
            .iter()
            .map(|source| match source {
                Some(row) => previous_ids[*row],
                None => {
                    minted += 1;
                    counter.mint()
                }
            })
            .collect();

        Ok(Assignment {
            ids,
            sources,
            minted,
        })
    }
}

// ---------------------------------------------------------------------------
// Link helpers
// ---------------------------------------------------------------------------

/// Heaviest-first greedy claiming with an explicit per-row availability flag.
fn greedy_links(quality: &QualityMatrix) -> Vec<Option<usize>> {
    let mut available = vec![true; quality.rows()];

    (0..quality.cols())
        .map(|col| {
            let mut best: Option<(usize, f64)> = None;
            for (row, q) in quality.column(col).enumerate() {
                if !available[row] || q <= 0.0 {
                    continue;
                }
                // Strict comparison keeps the lowest row on ties.
                if best.map_or(true, |(_, best_q)| q > best_q) {
                    best = Some((row, q));
                }
            }
            best.map(|(row, _)| {
                available[row] = false;
                row
            })
        })
        .collect()
}

/// Maximum total quality matching via the O(n³) potential-based Hungarian
/// algorithm on cost `1 - quality`, padded to square with cost `1`.
fn optimal_links(quality: &QualityMatrix) -> Vec<Option<usize>> {
    let (n_rows, n_cols) = (quality.rows(), quality.cols());
    let mut links = vec![None; n_cols];
    if n_rows == 0 || n_cols == 0 {
        return links;
    }

    let n = n_rows.max(n_cols);
    let cost = |i: usize, j: usize| -> f64 {
        if i < n_rows && j < n_cols {
            1.0 - quality.get(i, j)
        } else {
            1.0
        }
    };
    let inf = f64::INFINITY;

    // 1-indexed potentials; column 0 is the dummy source.
    let mut u = vec![0.0_f64; n + 1];
    let mut v = vec![0.0_f64; n + 1];
    // p[j]: 1-indexed row assigned to column j (0 = unassigned).
    let mut p = vec![0_usize; n + 1];
    let mut way = vec![0_usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0_usize;
        let mut min_val = vec![inf; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = inf;
            let mut j1 = 0_usize;

            for j in 1..=n {
                if !used[j] {
                    let val = cost(i0 - 1, j - 1) - u[i0] - v[j];
                    if val < min_val[j] {
                        min_val[j] = val;
                        way[j] = j0;
                    }
                    if min_val[j] < delta {
                        delta = min_val[j];
                        j1 = j;
                    }
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_val[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        loop {
            p[j0] = p[way[j0]];
            j0 = way[j0];
            if j0 == 0 {
                break;
            }
        }
    }

    for j in 1..=n {
        let (row, col) = (p[j] - 1, j - 1);
        if row < n_rows && col < n_cols && quality.get(row, col) > 0.0 {
            links[col] = Some(row);
        }
    }
    links
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<ClumpId> {
        raw.iter().copied().map(ClumpId::from_raw).collect()
    }

    fn counter_after(n: u64) -> IdentityCounter {
        IdentityCounter::continuing_after(ClumpId::from_raw(n))
    }

    #[test]
    fn heavier_clump_wins_contested_identifier() {
        // One previous clump, two current clumps that both resemble it.
        let q = QualityMatrix::from_row_major(1, 2, vec![0.6, 0.9]);
        let mut counter = counter_after(1);
        let a = Assigner::default().assign(&q, &ids(&[1]), &mut counter).unwrap();
        assert_eq!(a.ids, ids(&[1, 2]));
        assert_eq!(a.sources, vec![Some(0), None]);
        assert_eq!((a.reused(), a.minted), (1, 1));
    }

    #[test]
    fn consumed_row_is_skipped_for_later_columns() {
        let q = QualityMatrix::from_row_major(2, 2, vec![0.9, 0.8, 0.1, 0.2]);
        let mut counter = counter_after(2);
        let a = Assigner::default()
            .assign(&q, &ids(&[10, 20]), &mut counter)
            .unwrap();
        // Column 1 prefers row 0, but row 0 is taken by column 0.
        assert_eq!(a.ids, ids(&[10, 20]));
    }

    #[test]
    fn ties_go_to_lowest_row() {
        let q = QualityMatrix::from_row_major(3, 1, vec![0.5, 0.5, 0.5]);
        let mut counter = counter_after(3);
        let a = Assigner::default()
            .assign(&q, &ids(&[7, 8, 9]), &mut counter)
            .unwrap();
        assert_eq!(a.ids, ids(&[7]));
    }

    #[test]
    fn zero_best_quality_mints() {
        let q = QualityMatrix::zeros(2, 2);
        let mut counter = counter_after(5);
        let a = Assigner::default()
            .assign(&q, &ids(&[4, 5]), &mut counter)
            .unwrap();
        assert_eq!(a.ids, ids(&[6, 7]));
        assert_eq!(a.minted, 2);
    }

    #[test]
    fn empty_previous_mints_everything_in_order() {
        let q = QualityMatrix::zeros(0, 3);
        let mut counter = counter_after(2);
        let a = Assigner::default().assign(&q, &[], &mut counter).unwrap();
        assert_eq!(a.ids, ids(&[3, 4, 5]));
    }

    #[test]
    fn empty_current_gives_empty_list() {
        let q = QualityMatrix::zeros(2, 0);
        let mut counter = counter_after(2);
        let a = Assigner::default()
            .assign(&q, &ids(&[1, 2]), &mut counter)
            .unwrap();
        assert!(a.ids.is_empty());
        assert_eq!(counter.peek(), ClumpId::from_raw(3));
    }

    #[test]
    fn mismatched_identifier_count_is_an_error() {
        let q = QualityMatrix::zeros(2, 1);
        let mut counter = IdentityCounter::new();
        let err = Assigner::default()
            .assign(&q, &ids(&[1]), &mut counter)
            .unwrap_err();
        assert_eq!(err, MatchError::IdentifierCountMismatch { ids: 1, rows: 2 });
    }

    #[test]
    fn optimal_maximizes_total_quality() {
        // Greedy: column 0 takes row 0 (0.9), column 1 is left with row 1 (0.1)
        // for a total of 1.0. Optimal: 0.8 + 0.8 = 1.6.
        let q = QualityMatrix::from_row_major(2, 2, vec![0.9, 0.8, 0.8, 0.1]);

        let mut counter = counter_after(2);
        let greedy = Assigner::new(AssignmentStrategy::Greedy)
            .assign(&q, &ids(&[1, 2]), &mut counter)
            .unwrap();
        assert_eq!(greedy.sources, vec![Some(0), Some(1)]);

        let mut counter = counter_after(2);
        let optimal = Assigner::new(AssignmentStrategy::Optimal)
            .assign(&q, &ids(&[1, 2]), &mut counter)
            .unwrap();
        assert_eq!(optimal.sources, vec![Some(1), Some(0)]);
        assert_eq!(optimal.ids, ids(&[2, 1]));
    }

    #[test]
    fn optimal_never_links_zero_quality_pairs() {
        let q = QualityMatrix::from_row_major(2, 3, vec![0.0, 0.7, 0.0, 0.0, 0.0, 0.0]);
        let mut counter = counter_after(2);
        let a = Assigner::new(AssignmentStrategy::Optimal)
            .assign(&q, &ids(&[1, 2]), &mut counter)
            .unwrap();
        assert_eq!(a.sources, vec![None, Some(0), None]);
        assert_eq!(a.ids, ids(&[3, 1, 4]));
    }

    #[test]
    fn optimal_handles_more_rows_than_columns() {
        let q = QualityMatrix::from_row_major(3, 1, vec![0.2, 0.9, 0.4]);
        let mut counter = counter_after(3);
        let a = Assigner::new(AssignmentStrategy::Optimal)
            .assign(&q, &ids(&[1, 2, 3]), &mut counter)
            .unwrap();
        assert_eq!(a.ids, ids(&[2]));
    }
}
