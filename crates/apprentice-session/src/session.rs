//! The training session state machine.
//!
//! A [`TrainingSession`] owns everything one trainer conversation produces:
//! the accumulated context, the question/answer pairs, the analyzer's latest
//! verdict, and the writer that persists each increment. All transitions go
//! through `seed`, `advance`, `retry_analysis` and `bind_topic`. `finalize`
//! only reads the session.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use apprentice_client::{ConfidenceAnalyzer, KnowledgeStore, TrainingFinalizer};
use apprentice_core::config::ApprenticeConfig;
use apprentice_core::types::{
    AgentId, Analysis, Confidence, KnowledgeChunk, QaPair, TopicBinding,
};
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::error::{AnalysisFailure, SessionError, WriterError};
use crate::policy::{BindToFirstOpenQuestion, QuestionBinding};
use crate::retry::RetryPolicy;
use crate::utterance::{next_utterance, UNBOUND_NOTICE};
use crate::writer::{
    KnowledgeChunkWriter, WriteFailure, WriteOutcome, WriteReceipt,
};

const INCREMENT_SEPARATOR: &str = "\n\n";

// =============================================================================
// Step
// =============================================================================

/// Where the session is in the elicitation loop.
///
/// `Clarifying` is permanent once reached; high confidence changes only what
/// the agent says.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    /// Waiting for the trainer's initial explanation.
    Seed,
    /// Trading clarifying questions and answers.
    Clarifying,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Seed => f.write_str("seed"),
            Step::Clarifying => f.write_str("clarifying"),
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Tunables for one session.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    /// Upper bound on a single analyzer call.
    pub analysis_timeout: Duration,
    /// Confidence at or above which the agent invites the trainer to finish.
    pub completion_threshold: u8,
    /// Retry behaviour for chunk writes.
    pub retry: RetryPolicy,
    /// Chunks buffered before a submission waits.
    pub queue_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&ApprenticeConfig::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &ApprenticeConfig) -> Self {
        Self {
            analysis_timeout: Duration::from_secs(config.analyzer.timeout_secs.max(1)),
            completion_threshold: config.analyzer.completion_threshold.min(100),
            retry: RetryPolicy::from_config(&config.writer),
            queue_capacity: config.writer.queue_capacity.max(1),
        }
    }
}

// =============================================================================
// Turn reports
// =============================================================================

/// What happened to the analysis part of a turn.
#[derive(Clone, Debug)]
pub enum AnalysisStatus {
    Completed,
    /// No topic is bound, so there was nothing to analyze against.
    Skipped,
    /// Confidence and open questions were left as they were.
    Failed {
        error: AnalysisFailure,
        retryable: bool,
    },
}

/// What happened to the increment produced by a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteStatus {
    /// Handed to the writer; the outcome arrives in a later report.
    Queued { sequence: u64 },
    /// Held until a topic is bound.
    Deferred,
    /// The writer had stopped; the chunk is returned in `failed_writes`.
    Rejected,
    /// The turn produced no increment.
    NoIncrement,
}

/// The result of one turn, returned to the view.
#[derive(Clone, Debug)]
pub struct TurnReport {
    pub step: Step,
    pub confidence: Confidence,
    pub open_questions: Vec<String>,
    /// The agent's reply. `None` when analysis failed.
    pub utterance: Option<String>,
    pub analysis: AnalysisStatus,
    pub write: WriteStatus,
    /// Writes from this or earlier turns that could not be stored.
    pub failed_writes: Vec<WriteFailure>,
}

impl TurnReport {
    pub fn analysis_failed(&self) -> bool {
        matches!(self.analysis, AnalysisStatus::Failed { .. })
    }
}

/// The document the console stored when a session was finalized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Finalized {
    pub crystallized_text: String,
    /// Answers included in the finalized document.
    pub qa_pairs: usize,
}

// =============================================================================
// Closing
// =============================================================================

/// Signals that the view owning a session has gone away.
///
/// Closing cancels an in-flight analysis and rejects later operations.
/// Dropping the closer without calling [`close`](Self::close) leaves the
/// session open.
#[derive(Clone, Debug)]
pub struct SessionCloser {
    tx: Arc<watch::Sender<bool>>,
}

impl SessionCloser {
    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }
}

async fn wait_closed(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|closed| *closed).await.is_ok();
    if !closed {
        // Closer dropped without closing: never resolves.
        std::future::pending::<()>().await;
    }
}

// =============================================================================
// TrainingSession
// =============================================================================

/// One trainer conversation about one topic.
pub struct TrainingSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    agent_id: AgentId,
    topic: Option<TopicBinding>,
    step: Step,
    seed: String,
    accumulated_context: String,
    qa_pairs: Vec<QaPair>,
    open_questions: Vec<String>,
    confidence: Confidence,
    /// Increments produced while no topic was bound, oldest first.
    deferred: Vec<String>,
    pending: Vec<WriteReceipt>,
    unreported: Vec<WriteFailure>,
    analyzer: Arc<dyn ConfidenceAnalyzer>,
    writer: KnowledgeChunkWriter,
    binding: Box<dyn QuestionBinding>,
    settings: SessionSettings,
    closed: watch::Receiver<bool>,
    shut_down: bool,
}

impl TrainingSession {
    /// Create a session in `Seed`. Spawns the chunk writer, so this must run
    /// inside a tokio runtime.
    pub fn new(
        agent_id: AgentId,
        topic: Option<TopicBinding>,
        analyzer: Arc<dyn ConfidenceAnalyzer>,
        store: Arc<dyn KnowledgeStore>,
        settings: SessionSettings,
    ) -> (Self, SessionCloser) {
        let (tx, closed) = watch::channel(false);
        let writer =
            KnowledgeChunkWriter::spawn(store, settings.retry.clone(), settings.queue_capacity);
        let session = Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            agent_id,
            topic,
            step: Step::Seed,
            seed: String::new(),
            accumulated_context: String::new(),
            qa_pairs: Vec::new(),
            open_questions: Vec::new(),
            confidence: Confidence::MIN,
            deferred: Vec::new(),
            pending: Vec::new(),
            unreported: Vec::new(),
            analyzer,
            writer,
            binding: Box::new(BindToFirstOpenQuestion),
            settings,
            closed,
            shut_down: false,
        };
        tracing::info!(
            session_id = %session.id,
            agent_id = %session.agent_id,
            topic_id = session.topic.as_ref().map(|t| t.topic_id.as_str()),
            "Training session created"
        );
        (session, SessionCloser { tx: Arc::new(tx) })
    }

    /// Replace the question binding policy.
    pub fn with_question_binding(mut self, binding: Box<dyn QuestionBinding>) -> Self {
        self.binding = binding;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    pub fn topic(&self) -> Option<&TopicBinding> {
        self.topic.as_ref()
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn accumulated_context(&self) -> &str {
        &self.accumulated_context
    }

    pub fn qa_pairs(&self) -> &[QaPair] {
        &self.qa_pairs
    }

    pub fn open_questions(&self) -> &[String] {
        &self.open_questions
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn deferred_increments(&self) -> &[String] {
        &self.deferred
    }

    /// Writes queued but not yet reported.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn question_binding(&self) -> &'static str {
        self.binding.name()
    }

    pub fn is_closed(&self) -> bool {
        self.shut_down || *self.closed.borrow()
    }

    /// Take the trainer's input as seed text or as an answer, by step.
    pub async fn submit(&mut self, input: &str) -> Result<TurnReport, SessionError> {
        match self.step {
            Step::Seed => self.seed(input).await,
            Step::Clarifying => self.advance(input).await,
        }
    }

    /// Record the trainer's initial explanation and run the first analysis.
    pub async fn seed(&mut self, text: &str) -> Result<TurnReport, SessionError> {
        self.ensure_open()?;
        self.ensure_step(Step::Seed)?;
        if text.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }

        self.seed = text.to_string();
        self.accumulated_context = text.to_string();
        self.step = Step::Clarifying;
        tracing::info!(
            session_id = %self.id,
            text_len = text.len(),
            "Seed text recorded"
        );

        let write = self.record_increment(text.to_string()).await;
        self.run_cycle(write).await
    }

    /// Record an answer against the bound question and re-analyze.
    pub async fn advance(&mut self, answer: &str) -> Result<TurnReport, SessionError> {
        self.ensure_open()?;
        self.ensure_step(Step::Clarifying)?;
        if answer.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }

        let pair = QaPair {
            question: self.binding.bind(&self.open_questions),
            answer: answer.to_string(),
        };
        let block = pair.as_block();
        tracing::info!(
            session_id = %self.id,
            question = %pair.question,
            policy = self.binding.name(),
            "Answer recorded"
        );
        self.qa_pairs.push(pair);
        self.accumulated_context.push_str(INCREMENT_SEPARATOR);
        self.accumulated_context.push_str(&block);

        let write = self.record_increment(block).await;
        self.run_cycle(write).await
    }

    /// Re-run analysis on the unchanged context, typically after a failed turn.
    pub async fn retry_analysis(&mut self) -> Result<TurnReport, SessionError> {
        self.ensure_open()?;
        self.ensure_step(Step::Clarifying)?;
        tracing::info!(session_id = %self.id, "Retrying analysis");
        self.run_cycle(WriteStatus::NoIncrement).await
    }

    /// Resubmit a chunk whose write failed.
    ///
    /// The chunk is queued behind everything already submitted, so it may
    /// land after increments produced later.
    pub async fn retry_write(&mut self, failure: WriteFailure) -> Result<WriteStatus, SessionError> {
        self.ensure_open()?;
        tracing::info!(
            session_id = %self.id,
            sequence = failure.sequence,
            attempts = failure.attempts,
            "Resubmitting failed knowledge chunk"
        );
        Ok(self.enqueue(failure.chunk).await)
    }

    /// Bind a topic to a session that started without one, then write every
    /// deferred increment in the order it was produced.
    pub async fn bind_topic(
        &mut self,
        binding: TopicBinding,
    ) -> Result<Vec<WriteStatus>, SessionError> {
        self.ensure_open()?;
        if let Some(existing) = &self.topic {
            return Err(SessionError::TopicAlreadyBound(
                existing.topic_id.to_string(),
            ));
        }
        tracing::info!(
            session_id = %self.id,
            topic_id = %binding.topic_id,
            topic_name = %binding.topic_name,
            deferred = self.deferred.len(),
            "Topic bound"
        );
        let topic_id = binding.topic_id.clone();
        self.topic = Some(binding);

        let mut statuses = Vec::with_capacity(self.deferred.len());
        for text in std::mem::take(&mut self.deferred) {
            let chunk = KnowledgeChunk {
                agent_id: self.agent_id.clone(),
                topic_id: topic_id.clone(),
                text,
            };
            statuses.push(self.enqueue(chunk).await);
        }
        Ok(statuses)
    }

    /// Ask the console to condense the seed text and every answer into one
    /// stored document.
    ///
    /// The session stays in `Clarifying`: teaching may continue afterwards,
    /// and a later finalize sends the longer record. Bounded by the analysis
    /// timeout and cancelled by close.
    pub async fn finalize(
        &self,
        finalizer: &dyn TrainingFinalizer,
    ) -> Result<Finalized, SessionError> {
        self.ensure_open()?;
        self.ensure_step(Step::Clarifying)?;
        let topic = self.topic.as_ref().ok_or(SessionError::NoTopic)?;

        let mut closed = self.closed.clone();
        let timeout = self.settings.analysis_timeout;
        let call = tokio::time::timeout(
            timeout,
            finalizer.finalize(&self.agent_id, &topic.topic_id, &self.seed, &self.qa_pairs),
        );
        let result = tokio::select! {
            _ = wait_closed(&mut closed) => return Err(SessionError::Closed),
            result = call => result,
        };

        match result {
            Ok(Ok(crystallized_text)) => {
                tracing::info!(
                    session_id = %self.id,
                    topic_id = %topic.topic_id,
                    qa_pairs = self.qa_pairs.len(),
                    "Session finalized"
                );
                Ok(Finalized {
                    crystallized_text,
                    qa_pairs: self.qa_pairs.len(),
                })
            }
            Ok(Err(e)) => {
                tracing::warn!(session_id = %self.id, error = %e, "Finalize failed");
                Err(SessionError::FinalizeFailed(e))
            }
            Err(_) => {
                tracing::warn!(
                    session_id = %self.id,
                    timeout_secs = timeout.as_secs(),
                    "Finalize timed out"
                );
                Err(SessionError::FinalizeTimedOut(timeout))
            }
        }
    }

    /// Wait for every queued write and return the ones that failed.
    pub async fn flush_writes(&mut self) -> Vec<WriteFailure> {
        let mut failures = std::mem::take(&mut self.unreported);
        for receipt in std::mem::take(&mut self.pending) {
            if let WriteOutcome::Failed(failure) = receipt.outcome().await {
                failures.push(failure);
            }
        }
        failures
    }

    /// Stop the session: drain the writer and return writes that failed.
    ///
    /// Later operations fail with [`SessionError::Closed`]. Increments still
    /// deferred for lack of a topic are dropped.
    pub async fn shutdown(&mut self) -> Vec<WriteFailure> {
        self.shut_down = true;
        self.writer.shutdown().await;
        let failures = self.flush_writes().await;
        if !self.deferred.is_empty() {
            tracing::warn!(
                session_id = %self.id,
                count = self.deferred.len(),
                "Session ended with increments never bound to a topic"
            );
        }
        tracing::info!(
            session_id = %self.id,
            qa_pairs = self.qa_pairs.len(),
            failed_writes = failures.len(),
            "Training session shut down"
        );
        failures
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn ensure_step(&self, expected: Step) -> Result<(), SessionError> {
        if self.step != expected {
            return Err(SessionError::InvalidStep {
                expected,
                actual: self.step,
            });
        }
        Ok(())
    }

    async fn record_increment(&mut self, text: String) -> WriteStatus {
        let Some(topic) = &self.topic else {
            tracing::info!(
                session_id = %self.id,
                deferred = self.deferred.len() + 1,
                "No topic bound; increment deferred"
            );
            self.deferred.push(text);
            return WriteStatus::Deferred;
        };
        let chunk = KnowledgeChunk {
            agent_id: self.agent_id.clone(),
            topic_id: topic.topic_id.clone(),
            text,
        };
        self.enqueue(chunk).await
    }

    async fn enqueue(&mut self, chunk: KnowledgeChunk) -> WriteStatus {
        match self.writer.submit(chunk.clone()).await {
            Ok(receipt) => {
                let sequence = receipt.sequence();
                self.pending.push(receipt);
                WriteStatus::Queued { sequence }
            }
            Err(WriterError::Stopped) => {
                tracing::warn!(session_id = %self.id, "Chunk writer stopped; increment not queued");
                self.unreported.push(WriteFailure::writer_stopped(None, chunk));
                WriteStatus::Rejected
            }
        }
    }

    async fn run_cycle(&mut self, write: WriteStatus) -> Result<TurnReport, SessionError> {
        let analysis = match self.topic.clone() {
            None => AnalysisStatus::Skipped,
            Some(topic) => match self.analyze(&topic).await? {
                Ok(analysis) => {
                    self.confidence = analysis.confidence;
                    self.open_questions = analysis.questions;
                    AnalysisStatus::Completed
                }
                Err(error) => AnalysisStatus::Failed {
                    retryable: error.is_retryable(),
                    error,
                },
            },
        };

        let utterance = match &analysis {
            AnalysisStatus::Completed => Some(next_utterance(
                self.confidence,
                &self.open_questions,
                self.settings.completion_threshold,
            )),
            AnalysisStatus::Skipped => Some(UNBOUND_NOTICE.to_string()),
            AnalysisStatus::Failed { .. } => None,
        };

        Ok(TurnReport {
            step: self.step,
            confidence: self.confidence,
            open_questions: self.open_questions.clone(),
            utterance,
            analysis,
            write,
            failed_writes: self.take_failed_writes(),
        })
    }

    /// One analyzer call, bounded by the timeout and cancelled by close.
    ///
    /// The outer error means the session closed; the inner one is a failed
    /// cycle the caller may retry.
    async fn analyze(
        &self,
        topic: &TopicBinding,
    ) -> Result<Result<Analysis, AnalysisFailure>, SessionError> {
        let mut closed = self.closed.clone();
        let timeout = self.settings.analysis_timeout;
        let started = Instant::now();
        let call = tokio::time::timeout(
            timeout,
            self.analyzer
                .analyze(&self.agent_id, &topic.topic_id, &self.accumulated_context),
        );

        tokio::select! {
            _ = wait_closed(&mut closed) => {
                tracing::info!(session_id = %self.id, "Session closed during analysis");
                Err(SessionError::Closed)
            }
            result = call => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                match result {
                    Ok(Ok(analysis)) => {
                        tracing::info!(
                            session_id = %self.id,
                            topic_id = %topic.topic_id,
                            confidence = analysis.confidence.value(),
                            questions = analysis.questions.len(),
                            elapsed_ms,
                            "Analysis completed"
                        );
                        Ok(Ok(analysis))
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(session_id = %self.id, error = %e, elapsed_ms, "Analysis failed");
                        Ok(Err(AnalysisFailure::Client(e)))
                    }
                    Err(_) => {
                        tracing::warn!(
                            session_id = %self.id,
                            timeout_secs = timeout.as_secs(),
                            "Analysis timed out"
                        );
                        Ok(Err(AnalysisFailure::TimedOut(timeout)))
                    }
                }
            }
        }
    }

    /// Failures of completed writes, each reported once.
    fn take_failed_writes(&mut self) -> Vec<WriteFailure> {
        let mut failures = std::mem::take(&mut self.unreported);
        let mut still_pending = Vec::with_capacity(self.pending.len());
        for mut receipt in std::mem::take(&mut self.pending) {
            match receipt.try_outcome() {
                None => still_pending.push(receipt),
                Some(WriteOutcome::Stored { .. }) => {}
                Some(WriteOutcome::Failed(failure)) => failures.push(failure),
            }
        }
        self.pending = still_pending;
        failures
    }
}

// =============================================================================
// SharedSession
// =============================================================================

/// A session handle for views that run turns on spawned tasks.
///
/// A turn started while another is still in flight is rejected with
/// [`SessionError::CycleInFlight`] rather than queued.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<TrainingSession>>,
}

impl SharedSession {
    pub fn new(session: TrainingSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub async fn submit(&self, input: &str) -> Result<TurnReport, SessionError> {
        let mut session = self
            .inner
            .try_lock()
            .map_err(|_| SessionError::CycleInFlight)?;
        session.submit(input).await
    }

    pub async fn retry_analysis(&self) -> Result<TurnReport, SessionError> {
        let mut session = self
            .inner
            .try_lock()
            .map_err(|_| SessionError::CycleInFlight)?;
        session.retry_analysis().await
    }

    /// Whether a turn is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.inner.try_lock().is_err()
    }

    /// Exclusive access, waiting for any in-flight turn to finish.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, TrainingSession> {
        self.inner.lock().await
    }
}
