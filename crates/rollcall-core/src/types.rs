use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Opaque stable student identifier.
pub type StudentId = String;

/// Registered embeddings per student for one class, keyed by student id.
///
/// A `BTreeMap` so that iteration order is defined (ascending student id),
/// which makes the matcher's tie-break deterministic.
pub type ClassGallery = BTreeMap<StudentId, Vec<Embedding>>;

#[derive(Error, Debug, PartialEq)]
pub enum EmbeddingError {
    #[error("embedding length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
}

/// Face embedding vector produced by the external detector/embedder
/// (typically 128-dimensional).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Euclidean (L2) distance to another embedding. Smaller = more similar.
    ///
    /// Embeddings of differing dimensionality are never comparable: this
    /// returns [`EmbeddingError::LengthMismatch`] instead of truncating to
    /// the shorter vector.
    pub fn distance(&self, other: &Embedding) -> Result<f32, EmbeddingError> {
        if self.values.len() != other.values.len() {
            return Err(EmbeddingError::LengthMismatch {
                left: self.values.len(),
                right: other.values.len(),
            });
        }
        let sum: f32 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        Ok(sum.sqrt())
    }
}

/// Capture angle of a registered face sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleTag {
    Front,
    Left,
    Right,
    Tilt,
}

impl AngleTag {
    pub fn as_str(self) -> &'static str {
        match self {
            AngleTag::Front => "front",
            AngleTag::Left => "left",
            AngleTag::Right => "right",
            AngleTag::Tilt => "tilt",
        }
    }

    pub fn parse(s: &str) -> Option<AngleTag> {
        match s {
            "front" => Some(AngleTag::Front),
            "left" => Some(AngleTag::Left),
            "right" => Some(AngleTag::Right),
            "tilt" => Some(AngleTag::Tilt),
            _ => None,
        }
    }
}

/// A registered face sample with metadata.
///
/// Immutable once created: re-registration inserts new rows, and rows are
/// only removed when the owning student is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredFace {
    pub id: String,
    pub student_id: StudentId,
    pub angle: AngleTag,
    pub confidence: f32,
    pub embedding: Embedding,
    pub created_at: DateTime<Utc>,
}

/// Roster entry: a student belonging to a class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub class_id: String,
    /// Derived flag: the student has at least one registered face sample.
    pub face_registered: bool,
}

/// A face detected in a submitted group photo.
///
/// Ephemeral: lives only for the duration of one matching operation. The
/// index is the face's position in the detector's output order.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub index: usize,
    pub embedding: Embedding,
}
