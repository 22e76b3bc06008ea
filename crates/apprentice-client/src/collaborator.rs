//! Collaborator traits the training session depends on.
//!
//! Each trait is one call contract against an external service. The console
//! client implements all of them; tests substitute in-memory fakes.

use std::sync::Arc;

use apprentice_core::types::{
    AgentId, Analysis, GapResolution, KnowledgeChunk, KnowledgeGap, QaPair, TopicId,
};
use async_trait::async_trait;

use crate::error::ClientError;

/// Scores accumulated context and returns open clarifying questions.
///
/// Implementations receive the entire context on every call, never a delta.
#[async_trait]
pub trait ConfidenceAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        agent_id: &AgentId,
        topic_id: &TopicId,
        full_context: &str,
    ) -> Result<Analysis, ClientError>;
}

/// Maps an unanswered question onto a topic.
#[async_trait]
pub trait GapResolver: Send + Sync {
    async fn resolve(
        &self,
        agent_id: &AgentId,
        question_text: &str,
    ) -> Result<Option<GapResolution>, ClientError>;
}

/// Persists one knowledge chunk.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn write_chunk(&self, chunk: &KnowledgeChunk) -> Result<(), ClientError>;
}

/// Lists knowledge gaps recorded for an agent.
#[async_trait]
pub trait GapDirectory: Send + Sync {
    async fn open_gaps(&self, agent_id: &AgentId) -> Result<Vec<KnowledgeGap>, ClientError>;
}

/// Summarizes what an agent already knows about a topic.
#[async_trait]
pub trait TopicSummaries: Send + Sync {
    async fn topic_summary(
        &self,
        agent_id: &AgentId,
        topic_id: &TopicId,
    ) -> Result<String, ClientError>;
}

/// Condenses a finished session into one stored document.
///
/// Returns the condensed text the console stored.
#[async_trait]
pub trait TrainingFinalizer: Send + Sync {
    async fn finalize(
        &self,
        agent_id: &AgentId,
        topic_id: &TopicId,
        original_text: &str,
        qa_pairs: &[QaPair],
    ) -> Result<String, ClientError>;
}

#[async_trait]
impl<T: ConfidenceAnalyzer + ?Sized> ConfidenceAnalyzer for Arc<T> {
    async fn analyze(
        &self,
        agent_id: &AgentId,
        topic_id: &TopicId,
        full_context: &str,
    ) -> Result<Analysis, ClientError> {
        (**self).analyze(agent_id, topic_id, full_context).await
    }
}

#[async_trait]
impl<T: GapResolver + ?Sized> GapResolver for Arc<T> {
    async fn resolve(
        &self,
        agent_id: &AgentId,
        question_text: &str,
    ) -> Result<Option<GapResolution>, ClientError> {
        (**self).resolve(agent_id, question_text).await
    }
}

#[async_trait]
impl<T: KnowledgeStore + ?Sized> KnowledgeStore for Arc<T> {
    async fn write_chunk(&self, chunk: &KnowledgeChunk) -> Result<(), ClientError> {
        (**self).write_chunk(chunk).await
    }
}

#[async_trait]
impl<T: GapDirectory + ?Sized> GapDirectory for Arc<T> {
    async fn open_gaps(&self, agent_id: &AgentId) -> Result<Vec<KnowledgeGap>, ClientError> {
        (**self).open_gaps(agent_id).await
    }
}

#[async_trait]
impl<T: TopicSummaries + ?Sized> TopicSummaries for Arc<T> {
    async fn topic_summary(
        &self,
        agent_id: &AgentId,
        topic_id: &TopicId,
    ) -> Result<String, ClientError> {
        (**self).topic_summary(agent_id, topic_id).await
    }
}

#[async_trait]
impl<T: TrainingFinalizer + ?Sized> TrainingFinalizer for Arc<T> {
    async fn finalize(
        &self,
        agent_id: &AgentId,
        topic_id: &TopicId,
        original_text: &str,
        qa_pairs: &[QaPair],
    ) -> Result<String, ClientError> {
        (**self)
            .finalize(agent_id, topic_id, original_text, qa_pairs)
            .await
    }
}
