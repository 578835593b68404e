//! Photo analysis status machine.
//!
//! pending → processing → completed | failed. Terminal states have no
//! outgoing transitions; a new submission starts a fresh machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Error, Debug, PartialEq)]
pub enum StatusError {
    #[error("illegal analysis status transition: {from:?} -> {to:?}")]
    IllegalTransition {
        from: AnalysisStatus,
        to: AnalysisStatus,
    },
}

impl AnalysisStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }

    pub fn can_transition(self, next: AnalysisStatus) -> bool {
        matches!(
            (self, next),
            (AnalysisStatus::Pending, AnalysisStatus::Processing)
                | (AnalysisStatus::Processing, AnalysisStatus::Completed)
                | (AnalysisStatus::Processing, AnalysisStatus::Failed)
        )
    }

    pub fn advance(self, next: AnalysisStatus) -> Result<AnalysisStatus, StatusError> {
        if self.can_transition(next) {
            Ok(next)
        } else {
            Err(StatusError::IllegalTransition {
                from: self,
                to: next,
            })
        }
    }
}
