//! Collaborator contracts and the management console client.
//!
//! The training session depends only on the traits in [`collaborator`];
//! [`ConsoleClient`] implements all of them over the console REST API.

pub mod collaborator;
pub mod console;
pub mod error;
pub mod wire;

pub use collaborator::{
    ConfidenceAnalyzer, GapDirectory, GapResolver, KnowledgeStore, TopicSummaries,
    TrainingFinalizer,
};
pub use console::{ConsoleClient, EMPTY_TOPIC_SUMMARY};
pub use error::ClientError;
