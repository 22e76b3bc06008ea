//! Interactive knowledge-elicitation sessions.
//!
//! A trainer explains a topic, the agent asks clarifying questions, and every
//! increment of taught text is persisted as a knowledge chunk. Open a session
//! through [`SessionBootstrap`], drive it with [`TrainingSession::submit`].

pub mod bootstrap;
pub mod error;
pub mod policy;
pub mod retry;
pub mod session;
pub mod utterance;
pub mod writer;

pub use bootstrap::{
    BootstrapOutcome, Collaborators, OpenedSession, SessionBootstrap, UnresolvedReason,
};
pub use error::{AnalysisFailure, SessionError, WriterError};
pub use policy::{BindToFirstOpenQuestion, QuestionBinding, GENERAL_CLARIFICATION};
pub use retry::RetryPolicy;
pub use session::{
    AnalysisStatus, Finalized, SessionCloser, SessionSettings, SharedSession, Step,
    TrainingSession, TurnReport, WriteStatus,
};
pub use writer::{
    KnowledgeChunkWriter, WriteAttempt, WriteFailure, WriteFailureKind, WriteOutcome,
    WriteReceipt,
};
