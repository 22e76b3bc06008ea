//! Opening a training session, either on a chosen topic or from a knowledge gap.

use std::sync::Arc;

use apprentice_client::{
    ClientError, ConfidenceAnalyzer, ConsoleClient, GapDirectory, GapResolver, KnowledgeStore,
    TopicSummaries, TrainingFinalizer, EMPTY_TOPIC_SUMMARY,
};
use apprentice_core::types::{AgentId, GapId, GapResolution, KnowledgeGap, TopicBinding};

use crate::session::{SessionCloser, SessionSettings, TrainingSession};
use crate::utterance::opening_utterance;

/// The external services a session and its bootstrap talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub analyzer: Arc<dyn ConfidenceAnalyzer>,
    pub store: Arc<dyn KnowledgeStore>,
    pub resolver: Arc<dyn GapResolver>,
    pub gaps: Arc<dyn GapDirectory>,
    pub summaries: Arc<dyn TopicSummaries>,
    pub finalizer: Arc<dyn TrainingFinalizer>,
}

impl Collaborators {
    /// Use one console client for every collaborator.
    pub fn from_console(client: ConsoleClient) -> Self {
        let client = Arc::new(client);
        Self {
            analyzer: client.clone(),
            store: client.clone(),
            resolver: client.clone(),
            gaps: client.clone(),
            summaries: client.clone(),
            finalizer: client,
        }
    }
}

/// Why a gap-driven bootstrap ended without a topic.
#[derive(Clone, Debug, thiserror::Error)]
pub enum UnresolvedReason {
    #[error("gap {0} is not among the agent's open gaps")]
    GapNotFound(GapId),
    #[error("could not list gaps: {0}")]
    GapLookupFailed(ClientError),
    #[error("gap resolution failed: {0}")]
    ResolveFailed(ClientError),
    #[error("no topic matches the gap's question")]
    NoMatchingTopic,
}

/// How the session's topic was chosen.
#[derive(Clone, Debug)]
pub enum BootstrapOutcome {
    Direct,
    Resolved {
        gap: KnowledgeGap,
        resolution: GapResolution,
    },
    /// The session starts unbound; writes are deferred and analysis skipped.
    Unresolved {
        gap_id: GapId,
        reason: UnresolvedReason,
    },
}

impl BootstrapOutcome {
    pub fn is_bound(&self) -> bool {
        !matches!(self, BootstrapOutcome::Unresolved { .. })
    }
}

/// A freshly opened session and what the agent says first.
pub struct OpenedSession {
    pub session: TrainingSession,
    pub closer: SessionCloser,
    pub opening: String,
    pub outcome: BootstrapOutcome,
}

#[derive(Clone, Debug)]
enum Origin {
    Direct(TopicBinding),
    Gap(GapId),
}

/// Entry point for creating a [`TrainingSession`].
#[derive(Clone, Debug)]
pub struct SessionBootstrap {
    agent_id: AgentId,
    origin: Origin,
    settings: SessionSettings,
}

impl SessionBootstrap {
    /// Teach a topic the operator picked.
    pub fn direct(agent_id: AgentId, topic: TopicBinding) -> Self {
        Self {
            agent_id,
            origin: Origin::Direct(topic),
            settings: SessionSettings::default(),
        }
    }

    /// Teach whichever topic the gap's question resolves to.
    pub fn from_gap(agent_id: AgentId, gap_id: GapId) -> Self {
        Self {
            agent_id,
            origin: Origin::Gap(gap_id),
            settings: SessionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Resolve the topic, create the session and compose the opening line.
    ///
    /// Never fails: an unresolvable gap yields an unbound session.
    pub async fn open(self, collaborators: &Collaborators) -> OpenedSession {
        let (topic, outcome) = match self.origin {
            Origin::Direct(topic) => (Some(topic), BootstrapOutcome::Direct),
            Origin::Gap(gap_id) => resolve_gap(&self.agent_id, gap_id, collaborators).await,
        };

        let summary = match &topic {
            Some(topic) => Some(fetch_summary(&self.agent_id, topic, collaborators).await),
            None => None,
        };
        let opening = opening_utterance(topic.as_ref(), summary.as_deref());

        let (session, closer) = TrainingSession::new(
            self.agent_id,
            topic,
            Arc::clone(&collaborators.analyzer),
            Arc::clone(&collaborators.store),
            self.settings,
        );

        OpenedSession {
            session,
            closer,
            opening,
            outcome,
        }
    }
}

async fn resolve_gap(
    agent_id: &AgentId,
    gap_id: GapId,
    collaborators: &Collaborators,
) -> (Option<TopicBinding>, BootstrapOutcome) {
    let unresolved = |gap_id: GapId, reason: UnresolvedReason| {
        tracing::warn!(gap_id = %gap_id, reason = %reason, "Gap not resolved; session starts without a topic");
        (None, BootstrapOutcome::Unresolved { gap_id, reason })
    };

    let gaps = match collaborators.gaps.open_gaps(agent_id).await {
        Ok(gaps) => gaps,
        Err(e) => return unresolved(gap_id, UnresolvedReason::GapLookupFailed(e)),
    };
    let Some(gap) = gaps.into_iter().find(|g| g.id == gap_id) else {
        let reason = UnresolvedReason::GapNotFound(gap_id.clone());
        return unresolved(gap_id, reason);
    };

    match collaborators
        .resolver
        .resolve(agent_id, &gap.question_text)
        .await
    {
        Ok(Some(resolution)) => {
            tracing::info!(
                gap_id = %gap.id,
                topic_id = %resolution.topic_id,
                topic_name = %resolution.topic_name,
                action = ?resolution.action,
                "Gap resolved to topic"
            );
            (
                Some(resolution.binding()),
                BootstrapOutcome::Resolved { gap, resolution },
            )
        }
        Ok(None) => unresolved(gap_id, UnresolvedReason::NoMatchingTopic),
        Err(e) => unresolved(gap_id, UnresolvedReason::ResolveFailed(e)),
    }
}

async fn fetch_summary(
    agent_id: &AgentId,
    topic: &TopicBinding,
    collaborators: &Collaborators,
) -> String {
    match collaborators
        .summaries
        .topic_summary(agent_id, &topic.topic_id)
        .await
    {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!(topic_id = %topic.topic_id, error = %e, "Failed to fetch topic summary");
            EMPTY_TOPIC_SUMMARY.to_string()
        }
    }
}
