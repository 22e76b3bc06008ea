//! Error types for training sessions and the chunk writer.

use std::time::Duration;

use apprentice_client::ClientError;
use apprentice_core::error::ApprenticeError;

use crate::session::Step;

/// Errors that reject a session operation before or during a turn.
///
/// Collaborator failures inside a turn are reported through `TurnReport`,
/// not through this type.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("operation requires step {expected}, session is in {actual}")]
    InvalidStep { expected: Step, actual: Step },
    #[error("input cannot be empty")]
    EmptyInput,
    #[error("an elicitation cycle is already in flight")]
    CycleInFlight,
    #[error("session has been closed")]
    Closed,
    #[error("session is already bound to topic {0}")]
    TopicAlreadyBound(String),
    #[error("no topic is bound to this session")]
    NoTopic,
    #[error("finalize failed: {0}")]
    FinalizeFailed(ClientError),
    #[error("finalize did not complete within {}s", .0.as_secs())]
    FinalizeTimedOut(Duration),
}

impl From<SessionError> for ApprenticeError {
    fn from(err: SessionError) -> Self {
        ApprenticeError::Session(err.to_string())
    }
}

/// Errors from submitting work to the knowledge chunk writer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WriterError {
    #[error("chunk writer has stopped")]
    Stopped,
}

/// Why an analysis cycle produced no result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalysisFailure {
    #[error("analyzer call failed: {0}")]
    Client(#[from] ClientError),
    #[error("analyzer did not respond within {}s", .0.as_secs())]
    TimedOut(Duration),
}

impl AnalysisFailure {
    /// Whether `retry_analysis` is worth offering.
    pub fn is_retryable(&self) -> bool {
        match self {
            AnalysisFailure::Client(err) => err.is_retryable(),
            AnalysisFailure::TimedOut(_) => true,
        }
    }
}
