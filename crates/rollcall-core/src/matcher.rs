//! Matcher — best-candidate search for detected faces.
//!
//! For each detected face, scans every registered embedding of every
//! candidate student and keeps the minimum Euclidean distance. A face
//! matches when that minimum is strictly below the configured threshold;
//! otherwise it is unknown, carrying the best distance it achieved.

use crate::types::{ClassGallery, DetectedFace, Embedding, StudentId};
use std::collections::BTreeSet;

/// Default maximum distance for two embeddings to count as the same identity.
/// Matches the scale of the external embedder's training objective.
pub const DEFAULT_THRESHOLD: f32 = 0.6;

/// What to do when a second detected face best-matches an already-claimed
/// student.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Every face that clears the threshold confirms its student, even if
    /// another face already claimed the same student.
    AcceptDuplicates,
    /// Only the first face (in detection order) may claim a student; later
    /// claims are demoted to unknown, keeping their best distance.
    RejectDuplicates,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchConfig {
    pub threshold: f32,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            duplicate_policy: DuplicatePolicy::AcceptDuplicates,
        }
    }
}

/// Outcome for a single detected face.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Match { student_id: StudentId, distance: f32 },
    /// No student within threshold. `best_distance` is the closest distance
    /// achieved, or `None` when there was no comparable candidate at all.
    Unknown { best_distance: Option<f32> },
}

/// Outcome of one detected face, tagged with its detection index.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceMatch {
    pub index: usize,
    pub outcome: MatchOutcome,
}

/// Match each detected face against the class gallery.
///
/// Pure function of its inputs: identical inputs yield identical output.
/// Output preserves the input face order. Candidate embeddings whose
/// dimensionality differs from the probe are skipped (logged), never
/// aborting the batch.
pub fn match_faces(
    faces: &[DetectedFace],
    gallery: &ClassGallery,
    config: &MatchConfig,
) -> Vec<FaceMatch> {
    let mut claimed: BTreeSet<StudentId> = BTreeSet::new();

    faces
        .iter()
        .map(|face| {
            let outcome = match best_candidate(&face.embedding, gallery) {
                Some((student_id, distance)) if distance < config.threshold => {
                    let first_claim = claimed.insert(student_id.clone());
                    if !first_claim && config.duplicate_policy == DuplicatePolicy::RejectDuplicates {
                        tracing::warn!(
                            index = face.index,
                            student_id = %student_id,
                            distance,
                            "duplicate claim rejected; face marked unknown"
                        );
                        MatchOutcome::Unknown {
                            best_distance: Some(distance),
                        }
                    } else {
                        MatchOutcome::Match {
                            student_id: student_id.clone(),
                            distance,
                        }
                    }
                }
                Some((_, distance)) => MatchOutcome::Unknown {
                    best_distance: Some(distance),
                },
                None => MatchOutcome::Unknown { best_distance: None },
            };
            FaceMatch {
                index: face.index,
                outcome,
            }
        })
        .collect()
}

/// Scan the whole gallery for the candidate closest to `probe`.
///
/// Returns `None` when no candidate could be compared (empty gallery, or
/// every stored embedding had a mismatched length). Ties keep the first
/// student in gallery order, which is ascending student id.
fn best_candidate<'a>(probe: &Embedding, gallery: &'a ClassGallery) -> Option<(&'a StudentId, f32)> {
    let mut best: Option<(&StudentId, f32)> = None;

    for (student_id, embeddings) in gallery {
        for embedding in embeddings {
            let distance = match probe.distance(embedding) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(
                        student_id = %student_id,
                        error = %e,
                        "skipping registered embedding that cannot be compared"
                    );
                    continue;
                }
            };
            match best {
                Some((_, d)) if d <= distance => {}
                _ => best = Some((student_id, distance)),
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gallery(entries: &[(&str, Vec<Vec<f32>>)]) -> ClassGallery {
        entries
            .iter()
            .map(|(id, vecs)| {
                (
                    id.to_string(),
                    vecs.iter().map(|v| Embedding::new(v.clone())).collect(),
                )
            })
            .collect()
    }

    fn faces(embeddings: &[Vec<f32>]) -> Vec<DetectedFace> {
        embeddings
            .iter()
            .enumerate()
            .map(|(index, v)| DetectedFace {
                index,
                embedding: Embedding::new(v.clone()),
            })
            .collect()
    }

    #[test]
    fn test_match_within_threshold() {
        let gallery = gallery(&[
            ("s1", vec![vec![1.0, 0.0, 0.0]]),
            ("s2", vec![vec![0.0, 1.0, 0.0]]),
        ]);
        let result = match_faces(&faces(&[vec![1.0, 0.0, 0.0]]), &gallery, &MatchConfig::default());

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].index, 0);
        assert_eq!(
            result[0].outcome,
            MatchOutcome::Match {
                student_id: "s1".into(),
                distance: 0.0
            }
        );
    }

    #[test]
    fn test_unknown_keeps_best_distance() {
        // [0,0,1] is sqrt(2) ≈ 1.414 from both registered vectors
        let gallery = gallery(&[
            ("s1", vec![vec![1.0, 0.0, 0.0]]),
            ("s2", vec![vec![0.0, 1.0, 0.0]]),
        ]);
        let result = match_faces(&faces(&[vec![0.0, 0.0, 1.0]]), &gallery, &MatchConfig::default());

        match &result[0].outcome {
            MatchOutcome::Unknown {
                best_distance: Some(d),
            } => assert!((d - 2.0f32.sqrt()).abs() < 1e-5),
            other => panic!("expected unknown with distance, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_gallery_yields_unknown_without_distance() {
        let result = match_faces(
            &faces(&[vec![1.0, 0.0, 0.0]]),
            &ClassGallery::new(),
            &MatchConfig::default(),
        );
        assert_eq!(
            result[0].outcome,
            MatchOutcome::Unknown { best_distance: None }
        );
    }

    #[test]
    fn test_threshold_is_strict() {
        // Distance exactly at the threshold must NOT match. 0.5 is exactly
        // representable, so the comparison is not at the mercy of rounding.
        let gallery = gallery(&[("s1", vec![vec![0.0]])]);
        let config = MatchConfig {
            threshold: 0.5,
            ..MatchConfig::default()
        };
        let result = match_faces(&faces(&[vec![0.5]]), &gallery, &config);
        assert_eq!(
            result[0].outcome,
            MatchOutcome::Unknown {
                best_distance: Some(0.5)
            }
        );
    }

    #[test]
    fn test_tie_break_is_first_student_in_id_order() {
        // Two students registered with identical embeddings
        let gallery = gallery(&[
            ("s2", vec![vec![1.0, 0.0]]),
            ("s1", vec![vec![1.0, 0.0]]),
        ]);
        let result = match_faces(&faces(&[vec![1.0, 0.0]]), &gallery, &MatchConfig::default());
        assert_eq!(
            result[0].outcome,
            MatchOutcome::Match {
                student_id: "s1".into(),
                distance: 0.0
            }
        );
    }

    #[test]
    fn test_mismatched_candidate_is_skipped_not_fatal() {
        // s1 has a malformed 2-dim embedding; s2 is fine. The batch must
        // still match s2.
        let gallery = gallery(&[
            ("s1", vec![vec![1.0, 0.0]]),
            ("s2", vec![vec![0.0, 1.0, 0.0]]),
        ]);
        let result = match_faces(&faces(&[vec![0.0, 1.0, 0.0]]), &gallery, &MatchConfig::default());
        assert_eq!(
            result[0].outcome,
            MatchOutcome::Match {
                student_id: "s2".into(),
                distance: 0.0
            }
        );
    }

    #[test]
    fn test_all_candidates_mismatched_yields_unknown_without_distance() {
        let gallery = gallery(&[("s1", vec![vec![1.0, 0.0]])]);
        let result = match_faces(&faces(&[vec![1.0, 0.0, 0.0]]), &gallery, &MatchConfig::default());
        assert_eq!(
            result[0].outcome,
            MatchOutcome::Unknown { best_distance: None }
        );
    }

    #[test]
    fn test_duplicate_claims_accepted_by_default() {
        let gallery = gallery(&[("s1", vec![vec![1.0, 0.0, 0.0]])]);
        let result = match_faces(
            &faces(&[vec![1.0, 0.0, 0.0], vec![0.9, 0.0, 0.0]]),
            &gallery,
            &MatchConfig::default(),
        );
        for m in &result {
            assert!(matches!(
                m.outcome,
                MatchOutcome::Match { ref student_id, .. } if student_id == "s1"
            ));
        }
    }

    #[test]
    fn test_duplicate_claims_rejected_under_strict_policy() {
        let gallery = gallery(&[("s1", vec![vec![1.0, 0.0, 0.0]])]);
        let config = MatchConfig {
            duplicate_policy: DuplicatePolicy::RejectDuplicates,
            ..MatchConfig::default()
        };
        let result = match_faces(
            &faces(&[vec![1.0, 0.0, 0.0], vec![0.9, 0.0, 0.0]]),
            &gallery,
            &config,
        );
        assert!(matches!(
            result[0].outcome,
            MatchOutcome::Match { ref student_id, .. } if student_id == "s1"
        ));
        match &result[1].outcome {
            MatchOutcome::Unknown {
                best_distance: Some(d),
            } => assert!((d - 0.1).abs() < 1e-5),
            other => panic!("expected second claim demoted to unknown, got {other:?}"),
        }
    }

    #[test]
    fn test_multiple_embeddings_per_student_use_closest() {
        let gallery = gallery(&[(
            "s1",
            vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 5.0]],
        )]);
        let result = match_faces(&faces(&[vec![0.9, 0.0]]), &gallery, &MatchConfig::default());
        match &result[0].outcome {
            MatchOutcome::Match { student_id, distance } => {
                assert_eq!(student_id, "s1");
                assert!((distance - 0.1).abs() < 1e-5);
            }
            other => panic!("expected match, got {other:?}"),
        }
    }

    #[test]
    fn test_rerun_is_deterministic() {
        let gallery = gallery(&[
            ("s1", vec![vec![1.0, 0.0, 0.0]]),
            ("s2", vec![vec![0.0, 1.0, 0.0]]),
        ]);
        let input = faces(&[vec![1.0, 0.1, 0.0], vec![0.0, 0.0, 1.0]]);
        let first = match_faces(&input, &gallery, &MatchConfig::default());
        let second = match_faces(&input, &gallery, &MatchConfig::default());
        assert_eq!(first, second);
    }
}
