//! Track-to-detection assignment.
//!
//! The tracker only sees the [`Assigner`] trait, so the matching strategy can be
//! swapped without touching the track lifecycle. [`GreedyAssigner`] is the
//! default: it sorts every pair by similarity and is not optimal, but it is
//! cheap for the handful of tracks a single camera produces.
//! [`HungarianAssigner`] solves the same problem optimally.

use std::fmt;

use munkres::{solve_assignment, WeightMatrix};
use ndarray::prelude::*;
use serde_derive::{Deserialize, Serialize};
use tracing::warn;

const MAX_HUNGARIAN_SIZE: usize = 256;
const INFEASIBLE_COST: f32 = 100000.0;

/// Result of one assignment round. Indexes refer to the rows (tracks) and
/// columns (detections) of the similarity matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    pub matches: Vec<(usize, usize, f32)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

impl Assignment {
    fn from_matches(rows: usize, cols: usize, matches: Vec<(usize, usize, f32)>) -> Self {
        let mut track_used = vec![false; rows];
        let mut det_used = vec![false; cols];

        for &(r, c, _) in &matches {
            track_used[r] = true;
            det_used[c] = true;
        }

        Self {
            matches,
            unmatched_tracks: (0..rows).filter(|&r| !track_used[r]).collect(),
            unmatched_detections: (0..cols).filter(|&c| !det_used[c]).collect(),
        }
    }
}

/// A pair is acceptable only when it reaches `threshold` and has some overlap.
/// Zero similarity marks incompatible pairs and is never matched, whatever
/// the threshold. NaN on either side rejects the pair.
#[inline]
fn acceptable(score: f32, threshold: f32) -> bool {
    score > 0.0 && score >= threshold
}

pub trait Assigner: fmt::Debug + Send {
    /// Pairs rows with columns of `similarity` (tracks x detections).
    /// Pairs below `threshold` or with zero similarity are never accepted; a
    /// track or detection appears in at most one accepted pair.
    fn assign(&self, similarity: ArrayView2<'_, f32>, threshold: f32) -> Assignment;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentKind {
    #[default]
    Greedy,
    Hungarian,
}

impl AssignmentKind {
    pub fn build(self) -> Box<dyn Assigner> {
        match self {
            AssignmentKind::Greedy => Box::new(GreedyAssigner),
            AssignmentKind::Hungarian => Box::new(HungarianAssigner),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyAssigner;

impl Assigner for GreedyAssigner {
    fn assign(&self, similarity: ArrayView2<'_, f32>, threshold: f32) -> Assignment {
        let (rows, cols) = similarity.dim();

        let mut candidates: Vec<(usize, usize, f32)> = similarity
            .indexed_iter()
            .map(|((r, c), &s)| (r, c, s))
            .filter(|&(_, _, s)| acceptable(s, threshold))
            .collect();

        // stable: equal scores keep row-major order
        candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut track_used = vec![false; rows];
        let mut det_used = vec![false; cols];
        let mut matches = Vec::new();

        for (r, c, score) in candidates {
            if track_used[r] || det_used[c] {
                continue;
            }

            track_used[r] = true;
            det_used[c] = true;
            matches.push((r, c, score));
        }

        Assignment::from_matches(rows, cols, matches)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HungarianAssigner;

impl Assigner for HungarianAssigner {
    fn assign(&self, similarity: ArrayView2<'_, f32>, threshold: f32) -> Assignment {
        let (rows, cols) = similarity.dim();
        let n = rows.max(cols);

        if rows == 0 || cols == 0 {
            return Assignment::from_matches(rows, cols, Vec::new());
        }

        if n > MAX_HUNGARIAN_SIZE {
            warn!(n, "cost matrix too big for hungarian solver, using greedy");
            return GreedyAssigner.assign(similarity, threshold);
        }

        let mut mat = WeightMatrix::from_fn(n, |(r, c)| {
            if r < rows && c < cols && acceptable(similarity[[r, c]], threshold) {
                1.0 - similarity[[r, c]]
            } else {
                INFEASIBLE_COST
            }
        });

        match solve_assignment(&mut mat) {
            Ok(positions) => {
                let matches = positions
                    .into_iter()
                    .filter(|p| p.row < rows && p.column < cols)
                    .map(|p| (p.row, p.column, similarity[[p.row, p.column]]))
                    .filter(|&(_, _, score)| acceptable(score, threshold))
                    .collect();

                Assignment::from_matches(rows, cols, matches)
            }
            Err(err) => {
                warn!(?err, "hungarian assignment could not be solved, using greedy");
                GreedyAssigner.assign(similarity, threshold)
            }
        }
    }
}
