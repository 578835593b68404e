//! Roster reconciliation — match outcomes to present/absent/unknown sets.

use crate::matcher::{FaceMatch, MatchOutcome};
use crate::types::StudentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A detected face that matched no student within threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnknownFace {
    /// Position of the face in the detector's output order.
    pub index: usize,
    /// Closest distance achieved, or `None` when no candidate existed.
    pub best_distance: Option<f32>,
}

/// Disjoint partition of a class roster for one photo.
///
/// Invariant: `present ∪ absent` equals the roster and the two sets are
/// disjoint. Every detected face either contributed to `present` or
/// appears in `unknown`, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub present: BTreeSet<StudentId>,
    pub absent: BTreeSet<StudentId>,
    pub unknown: Vec<UnknownFace>,
}

/// Combine matcher output with the class roster.
///
/// Zero detected faces is a valid input (all roster students absent), as
/// is an empty roster (every face unknown).
pub fn reconcile(roster: &BTreeSet<StudentId>, matches: &[FaceMatch]) -> Reconciliation {
    let mut present = BTreeSet::new();
    let mut unknown = Vec::new();

    for m in matches {
        match &m.outcome {
            MatchOutcome::Match { student_id, .. } => {
                present.insert(student_id.clone());
            }
            MatchOutcome::Unknown { best_distance } => {
                unknown.push(UnknownFace {
                    index: m.index,
                    best_distance: *best_distance,
                });
            }
        }
    }

    let absent: BTreeSet<StudentId> = roster.difference(&present).cloned().collect();

    tracing::debug!(
        roster = roster.len(),
        present = present.len(),
        absent = absent.len(),
        unknown = unknown.len(),
        "roster reconciled"
    );

    Reconciliation {
        present,
        absent,
        unknown,
    }
}
