//! rollcalld — Attendance analysis service.
//!
//! Hosts the matching engine on a dedicated thread behind an async,
//! clone-safe handle. The surrounding application (photo upload, auth,
//! persistence of the finished record) submits detected embeddings via
//! [`engine::EngineHandle`] and awaits the ticket.

pub mod config;
pub mod engine;

pub use config::Config;
pub use engine::{
    spawn_engine, AnalysisRequest, AnalysisTicket, EngineError, EngineHandle, StatusBoard,
    SubmitError, WaitError,
};
