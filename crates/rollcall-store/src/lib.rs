//! rollcall-store — Registered face embeddings, backed by SQLite.
//!
//! Holds the per-student face samples captured at registration time and
//! answers the two queries the matcher needs: the roster of
//! face-registered students in a class, and their embeddings grouped by
//! student. Embedding payloads are encrypted at rest.

pub mod cipher;
pub mod store;

pub use cipher::{CipherError, EmbeddingCipher};
pub use store::{Store, StoreError};
