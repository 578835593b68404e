//! Attendance analysis engine.
//!
//! Runs matching on a dedicated OS thread fed by an mpsc request queue.
//! Callers get an [`AnalysisTicket`] whose completion is a notification
//! (watch + oneshot), not a poll loop; waiting is bounded by a timeout
//! after which the result is indeterminate, never assumed absent.

use chrono::{NaiveDate, Utc};
use rollcall_core::{
    match_faces, reconcile, AnalysisStatus, AttendanceRecord, DetectedFace, Embedding, MatchConfig,
};
use rollcall_store::{Store, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("engine thread exited")]
    ChannelClosed,
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("analysis already in flight for photo {0}")]
    AlreadyInFlight(String),
    #[error("engine thread exited")]
    ChannelClosed,
}

#[derive(Error, Debug)]
pub enum WaitError {
    #[error("no terminal status within {0:?}; attendance result is indeterminate")]
    Timeout(Duration),
    #[error("attendance analysis failed: {0}")]
    Failed(#[from] EngineError),
    #[error("engine thread exited before reporting a result")]
    ChannelClosed,
}

/// One photo analysis request: the detected embeddings for a class photo.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub photo_id: String,
    pub class_id: String,
    pub date: NaiveDate,
    /// Embeddings from the external detector, in detection order. May be
    /// empty (every roster student will be absent).
    pub descriptors: Vec<Embedding>,
}

enum EngineRequest {
    Analyze {
        request: AnalysisRequest,
        reply: oneshot::Sender<Result<AttendanceRecord, EngineError>>,
    },
}

/// Per-photo analysis status, observable through watch channels.
///
/// A photo may be resubmitted once its previous analysis reached a
/// terminal status; a non-terminal entry blocks duplicate submissions.
#[derive(Default)]
pub struct StatusBoard {
    photos: Mutex<HashMap<String, watch::Sender<AnalysisStatus>>>,
}

impl StatusBoard {
    /// Register a photo as pending. Fails when an analysis for the same
    /// photo has not yet reached a terminal status.
    fn begin(&self, photo_id: &str) -> Result<watch::Receiver<AnalysisStatus>, SubmitError> {
        let mut photos = self.photos.lock().expect("status board poisoned");
        if let Some(tx) = photos.get(photo_id) {
            if !tx.borrow().is_terminal() {
                return Err(SubmitError::AlreadyInFlight(photo_id.to_string()));
            }
        }
        let (tx, rx) = watch::channel(AnalysisStatus::Pending);
        photos.insert(photo_id.to_string(), tx);
        Ok(rx)
    }

    /// Drop a pending entry whose request never reached the engine.
    fn abandon(&self, photo_id: &str) {
        let mut photos = self.photos.lock().expect("status board poisoned");
        photos.remove(photo_id);
    }

    fn set(&self, photo_id: &str, next: AnalysisStatus) {
        let photos = self.photos.lock().expect("status board poisoned");
        let Some(tx) = photos.get(photo_id) else {
            tracing::error!(photo_id, ?next, "status update for unknown photo");
            return;
        };
        let current = *tx.borrow();
        match current.advance(next) {
            Ok(status) => {
                tx.send_replace(status);
            }
            Err(e) => tracing::error!(photo_id, error = %e, "refusing status update"),
        }
    }

    pub fn status_of(&self, photo_id: &str) -> Option<AnalysisStatus> {
        let photos = self.photos.lock().expect("status board poisoned");
        photos.get(photo_id).map(|tx| *tx.borrow())
    }
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    board: Arc<StatusBoard>,
}

impl EngineHandle {
    /// Enqueue a photo analysis. The photo starts out pending; a second
    /// submission for the same photo is rejected until the first reaches
    /// a terminal status.
    pub async fn submit(&self, request: AnalysisRequest) -> Result<AnalysisTicket, SubmitError> {
        let photo_id = request.photo_id.clone();
        let status = self.board.begin(&photo_id)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(EngineRequest::Analyze {
                request,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            // The request never reached the engine; the submission did not happen.
            self.board.abandon(&photo_id);
            return Err(SubmitError::ChannelClosed);
        }

        Ok(AnalysisTicket {
            photo_id,
            status,
            outcome: reply_rx,
        })
    }

    pub fn status_of(&self, photo_id: &str) -> Option<AnalysisStatus> {
        self.board.status_of(photo_id)
    }
}

/// Claim on one submitted analysis.
pub struct AnalysisTicket {
    photo_id: String,
    status: watch::Receiver<AnalysisStatus>,
    outcome: oneshot::Receiver<Result<AttendanceRecord, EngineError>>,
}

impl AnalysisTicket {
    pub fn photo_id(&self) -> &str {
        &self.photo_id
    }

    /// Current status of the analysis, without waiting.
    pub fn status(&self) -> AnalysisStatus {
        *self.status.borrow()
    }

    /// Wait for the analysis to reach a terminal status.
    ///
    /// A timeout means the result is indeterminate: the analysis may still
    /// finish, and the caller should check again rather than report the
    /// class absent.
    pub async fn wait(self, timeout: Duration) -> Result<AttendanceRecord, WaitError> {
        match tokio::time::timeout(timeout, self.outcome).await {
            Err(_) => Err(WaitError::Timeout(timeout)),
            Ok(Err(_)) => Err(WaitError::ChannelClosed),
            Ok(Ok(Err(e))) => Err(WaitError::Failed(e)),
            Ok(Ok(Ok(record))) => Ok(record),
        }
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The store is opened and owned by the engine thread; the returned
/// handle is the only way in. Setup is synchronous and fail-fast, so a
/// handle always refers to a ready engine.
pub fn spawn_engine(store: Store, match_config: MatchConfig) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);
    let board = Arc::new(StatusBoard::default());
    let thread_board = Arc::clone(&board);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                let EngineRequest::Analyze { request, reply } = req;
                thread_board.set(&request.photo_id, AnalysisStatus::Processing);

                let result = run_analysis(&store, &match_config, &request);
                match &result {
                    Ok(record) => {
                        tracing::info!(
                            photo_id = %request.photo_id,
                            class_id = %request.class_id,
                            present = record.present_students.len(),
                            absent = record.absent_students.len(),
                            unknown = record.unknown_faces.len(),
                            "analysis completed"
                        );
                        thread_board.set(&request.photo_id, AnalysisStatus::Completed);
                    }
                    Err(e) => {
                        tracing::error!(
                            photo_id = %request.photo_id,
                            class_id = %request.class_id,
                            error = %e,
                            "analysis failed; no record produced"
                        );
                        thread_board.set(&request.photo_id, AnalysisStatus::Failed);
                    }
                }
                let _ = reply.send(result);
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx, board }
}

/// Match the photo's descriptors against the class gallery and build the
/// attendance record. Any store failure aborts the whole analysis; no
/// partial record is produced.
fn run_analysis(
    store: &Store,
    match_config: &MatchConfig,
    request: &AnalysisRequest,
) -> Result<AttendanceRecord, EngineError> {
    let gallery = store.embeddings_for_class(&request.class_id)?;
    let roster = store.roster_for_class(&request.class_id)?;

    let faces: Vec<DetectedFace> = request
        .descriptors
        .iter()
        .enumerate()
        .map(|(index, embedding)| DetectedFace {
            index,
            embedding: embedding.clone(),
        })
        .collect();

    let matches = match_faces(&faces, &gallery, match_config);
    let reconciliation = reconcile(&roster, &matches);

    Ok(AttendanceRecord::build(
        request.photo_id.clone(),
        request.class_id.clone(),
        request.date,
        reconciliation,
        Utc::now(),
    ))
}
