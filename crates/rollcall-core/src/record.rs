//! Attendance record assembly.

use crate::roster::{Reconciliation, UnknownFace};
use crate::types::StudentId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The persisted outcome of one photo analysis for one class and date.
///
/// Serialized with camelCase field names for the external persistence
/// collaborator. Building a record never fails; persistence is the
/// storage collaborator's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub photo_id: String,
    pub class_id: String,
    pub date: NaiveDate,
    pub present_students: BTreeSet<StudentId>,
    pub absent_students: BTreeSet<StudentId>,
    pub unknown_faces: Vec<UnknownFace>,
    pub recorded_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Package a reconciliation result with its provenance.
    pub fn build(
        photo_id: impl Into<String>,
        class_id: impl Into<String>,
        date: NaiveDate,
        reconciliation: Reconciliation,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            photo_id: photo_id.into(),
            class_id: class_id.into(),
            date,
            present_students: reconciliation.present,
            absent_students: reconciliation.absent,
            unknown_faces: reconciliation.unknown,
            recorded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_reconciliation() -> Reconciliation {
        Reconciliation {
            present: ["s1".to_string()].into_iter().collect(),
            absent: ["s2".to_string()].into_iter().collect(),
            unknown: vec![UnknownFace {
                index: 1,
                best_distance: Some(1.2),
            }],
        }
    }

    #[test]
    fn test_build_carries_partition_through() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let recorded_at = Utc::now();
        let record =
            AttendanceRecord::build("photo-1", "class-a", date, sample_reconciliation(), recorded_at);

        assert_eq!(record.photo_id, "photo-1");
        assert_eq!(record.class_id, "class-a");
        assert_eq!(record.date, date);
        assert!(record.present_students.contains("s1"));
        assert!(record.absent_students.contains("s2"));
        assert_eq!(record.unknown_faces.len(), 1);
        assert_eq!(record.recorded_at, recorded_at);
    }

    #[test]
    fn test_serializes_with_camel_case_keys() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let record = AttendanceRecord::build(
            "photo-1",
            "class-a",
            date,
            sample_reconciliation(),
            Utc::now(),
        );
        let json = serde_json::to_value(&record).unwrap();

        assert!(json.get("presentStudents").is_some());
        assert!(json.get("absentStudents").is_some());
        assert!(json.get("unknownFaces").is_some());
        assert_eq!(json["unknownFaces"][0]["index"], 1);
        assert!(json["unknownFaces"][0].get("bestDistance").is_some());
    }

    #[test]
    fn test_unknown_face_null_distance_serializes_as_null() {
        let unknown = UnknownFace {
            index: 0,
            best_distance: None,
        };
        let json = serde_json::to_value(&unknown).unwrap();
        assert!(json["bestDistance"].is_null());
    }
}
