//! rollcall-core — Face matching and attendance resolution.
//!
//! Matches face embeddings detected in a class photo against registered
//! per-student embeddings, and reconciles the outcomes with the class
//! roster into present/absent/unknown sets. Pure computation: no I/O,
//! no async, no hidden state.

pub mod matcher;
pub mod record;
pub mod roster;
pub mod status;
pub mod types;

pub use matcher::{match_faces, DuplicatePolicy, FaceMatch, MatchConfig, MatchOutcome};
pub use record::AttendanceRecord;
pub use roster::{reconcile, Reconciliation, UnknownFace};
pub use status::{AnalysisStatus, StatusError};
pub use types::{AngleTag, ClassGallery, DetectedFace, Embedding, EmbeddingError, RegisteredFace, Student, StudentId};
