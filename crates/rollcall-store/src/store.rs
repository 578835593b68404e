//! SQLite store for students and their registered face samples.
//!
//! Face rows are immutable: registration only inserts, re-registration
//! adds rows, and the sole deletion path is removing the student (the
//! face rows cascade).

use crate::cipher::{CipherError, EmbeddingCipher};
use chrono::{DateTime, Utc};
use rollcall_core::{AngleTag, ClassGallery, Embedding, RegisteredFace, Student, StudentId};
use rusqlite::{params, Connection};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS students (
    id              TEXT PRIMARY KEY,
    class_id        TEXT NOT NULL,
    face_registered INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS faces (
    id          TEXT PRIMARY KEY,
    student_id  TEXT NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    angle       TEXT NOT NULL,
    confidence  REAL NOT NULL,
    embedding   BLOB NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id);
CREATE INDEX IF NOT EXISTS idx_faces_student ON faces(student_id);
";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unknown student: {0}")]
    UnknownStudent(String),
    #[error("embedding cipher error: {0}")]
    Cipher(#[from] CipherError),
    #[error("corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
}

pub struct Store {
    conn: Connection,
    cipher: EmbeddingCipher,
}

impl Store {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path, cipher: EmbeddingCipher) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn, cipher)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory(cipher: EmbeddingCipher) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, cipher)
    }

    fn init(conn: Connection, cipher: EmbeddingCipher) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, cipher })
    }

    /// Create or update a roster entry. Does not touch `face_registered`.
    pub fn upsert_student(&self, id: &str, class_id: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO students (id, class_id) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET class_id = excluded.class_id",
            params![id, class_id],
        )?;
        Ok(())
    }

    /// Insert a new face sample for a student and flip the derived
    /// `face_registered` flag. Existing rows are never modified.
    pub fn register_face(
        &mut self,
        student_id: &str,
        angle: AngleTag,
        confidence: f32,
        embedding: &Embedding,
    ) -> Result<RegisteredFace, StoreError> {
        let blob = self.cipher.seal(embedding)?;
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let tx = self.conn.transaction()?;
        let known: bool = tx
            .query_row(
                "SELECT COUNT(*) FROM students WHERE id = ?1",
                params![student_id],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n > 0)?;
        if !known {
            return Err(StoreError::UnknownStudent(student_id.to_string()));
        }

        tx.execute(
            "INSERT INTO faces (id, student_id, angle, confidence, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                student_id,
                angle.as_str(),
                confidence,
                blob,
                created_at.to_rfc3339()
            ],
        )?;
        tx.execute(
            "UPDATE students SET face_registered = 1 WHERE id = ?1",
            params![student_id],
        )?;
        tx.commit()?;

        tracing::info!(student_id, angle = angle.as_str(), confidence, "face registered");

        Ok(RegisteredFace {
            id,
            student_id: student_id.to_string(),
            angle,
            confidence,
            embedding: embedding.clone(),
            created_at,
        })
    }

    /// All face samples for one student, in registration order.
    pub fn faces_for_student(&self, student_id: &str) -> Result<Vec<RegisteredFace>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, angle, confidence, embedding, created_at
             FROM faces WHERE student_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map(params![student_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, Vec<u8>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut faces = Vec::new();
        for row in rows {
            let (id, angle_s, confidence, blob, created_s) = row?;
            faces.push(RegisteredFace {
                id,
                student_id: student_id.to_string(),
                angle: parse_angle(&angle_s)?,
                confidence: confidence as f32,
                embedding: self.cipher.open(&blob)?,
                created_at: parse_timestamp(&created_s)?,
            });
        }
        Ok(faces)
    }

    /// Embeddings of every face-registered student in a class, grouped by
    /// student. An empty map is a valid result, not an error.
    pub fn embeddings_for_class(&self, class_id: &str) -> Result<ClassGallery, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT f.student_id, f.embedding
             FROM faces f
             JOIN students s ON s.id = f.student_id
             WHERE s.class_id = ?1 AND s.face_registered = 1
             ORDER BY f.student_id, f.created_at, f.id",
        )?;
        let rows = stmt.query_map(params![class_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut gallery = ClassGallery::new();
        for row in rows {
            let (student_id, blob) = row?;
            let embedding = self.cipher.open(&blob)?;
            gallery.entry(student_id).or_default().push(embedding);
        }

        tracing::debug!(
            class_id,
            students = gallery.len(),
            "loaded class gallery"
        );
        Ok(gallery)
    }

    /// Look up one roster entry with its derived registration flag.
    pub fn student(&self, id: &str) -> Result<Option<Student>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, class_id, face_registered FROM students WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], |row| {
            Ok(Student {
                id: row.get(0)?,
                class_id: row.get(1)?,
                face_registered: row.get::<_, i64>(2)? != 0,
            })
        })?;
        rows.next().transpose().map_err(Into::into)
    }

    /// Ids of face-registered students in a class.
    pub fn roster_for_class(&self, class_id: &str) -> Result<BTreeSet<StudentId>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM students WHERE class_id = ?1 AND face_registered = 1",
        )?;
        let rows = stmt.query_map(params![class_id], |row| row.get::<_, String>(0))?;

        let mut roster = BTreeSet::new();
        for row in rows {
            roster.insert(row?);
        }
        Ok(roster)
    }

    /// Delete a student and, via cascade, every face sample they own.
    /// Returns whether a student row was removed.
    pub fn remove_student(&mut self, student_id: &str) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM students WHERE id = ?1", params![student_id])?;
        if removed > 0 {
            tracing::info!(student_id, "student removed (faces cascaded)");
        }
        Ok(removed > 0)
    }
}

fn parse_angle(s: &str) -> Result<AngleTag, StoreError> {
    AngleTag::parse(s).ok_or_else(|| StoreError::Corrupt {
        table: "faces",
        detail: format!("unknown angle tag {s:?}"),
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            table: "faces",
            detail: format!("bad created_at {s:?}: {e}"),
        })
}
