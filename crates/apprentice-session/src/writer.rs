//! Ordered, at-least-once persistence of knowledge chunks.
//!
//! A single background task drains a FIFO queue, so chunks reach the store in
//! the order they were submitted. Each chunk is retried under a
//! [`RetryPolicy`] before the worker moves on to the next one. The outcome of
//! every chunk is delivered through its [`WriteReceipt`].

use std::sync::Arc;

use apprentice_client::{ClientError, KnowledgeStore};
use apprentice_core::types::KnowledgeChunk;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::WriterError;
use crate::retry::RetryPolicy;

/// Classification of a single store call.
#[derive(Debug, Clone)]
pub enum WriteAttempt {
    Ok,
    Retryable(ClientError),
    Fatal(ClientError),
}

impl WriteAttempt {
    pub fn classify(result: Result<(), ClientError>) -> Self {
        match result {
            Ok(()) => WriteAttempt::Ok,
            Err(err) if err.is_retryable() => WriteAttempt::Retryable(err),
            Err(err) => WriteAttempt::Fatal(err),
        }
    }
}

/// Why a chunk was not stored.
#[derive(Debug, Clone)]
pub enum WriteFailureKind {
    /// The store rejected the chunk with a non-retryable error.
    Fatal(ClientError),
    /// Every allowed attempt failed with a retryable error.
    Exhausted(ClientError),
    /// The writer stopped before the chunk was attempted.
    WriterStopped,
}

impl std::fmt::Display for WriteFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteFailureKind::Fatal(err) => write!(f, "rejected: {}", err),
            WriteFailureKind::Exhausted(err) => write!(f, "retries exhausted: {}", err),
            WriteFailureKind::WriterStopped => write!(f, "writer stopped"),
        }
    }
}

/// A chunk that could not be stored, returned so the caller can resubmit it.
#[derive(Debug, Clone)]
pub struct WriteFailure {
    /// Queue position, or `None` if the chunk never reached the queue.
    pub sequence: Option<u64>,
    pub chunk: KnowledgeChunk,
    pub attempts: u32,
    pub kind: WriteFailureKind,
    pub failed_at: DateTime<Utc>,
}

impl WriteFailure {
    pub(crate) fn writer_stopped(sequence: Option<u64>, chunk: KnowledgeChunk) -> Self {
        Self {
            sequence,
            chunk,
            attempts: 0,
            kind: WriteFailureKind::WriterStopped,
            failed_at: Utc::now(),
        }
    }
}

/// Final result of one submitted chunk.
#[derive(Debug, Clone)]
pub enum WriteOutcome {
    Stored { sequence: u64, attempts: u32 },
    Failed(WriteFailure),
}

/// Handle to the pending outcome of a submitted chunk.
#[derive(Debug)]
pub struct WriteReceipt {
    sequence: u64,
    chunk: KnowledgeChunk,
    rx: oneshot::Receiver<WriteOutcome>,
}

impl WriteReceipt {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Wait for the chunk's final outcome.
    pub async fn outcome(self) -> WriteOutcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => WriteOutcome::Failed(WriteFailure::writer_stopped(
                Some(self.sequence),
                self.chunk,
            )),
        }
    }

    /// The outcome if it is already known.
    pub fn try_outcome(&mut self) -> Option<WriteOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(WriteOutcome::Failed(
                WriteFailure::writer_stopped(Some(self.sequence), self.chunk.clone()),
            )),
        }
    }
}

struct Job {
    sequence: u64,
    chunk: KnowledgeChunk,
    done: oneshot::Sender<WriteOutcome>,
}

/// Persists knowledge chunks one at a time, in submission order.
pub struct KnowledgeChunkWriter {
    tx: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    next_sequence: u64,
}

impl KnowledgeChunkWriter {
    /// Start the background worker. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn KnowledgeStore>, policy: RetryPolicy, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let worker = tokio::spawn(run_worker(store, policy, rx));
        Self {
            tx: Some(tx),
            worker: Some(worker),
            next_sequence: 1,
        }
    }

    pub fn is_running(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Queue a chunk for writing.
    ///
    /// Returns as soon as the chunk is queued; waits only if the queue is full.
    pub async fn submit(&mut self, chunk: KnowledgeChunk) -> Result<WriteReceipt, WriterError> {
        let tx = self.tx.as_ref().ok_or(WriterError::Stopped)?;
        let sequence = self.next_sequence;
        let (done, rx) = oneshot::channel();
        let job = Job {
            sequence,
            chunk: chunk.clone(),
            done,
        };
        tx.send(job).await.map_err(|_| WriterError::Stopped)?;
        self.next_sequence += 1;
        tracing::debug!(
            sequence,
            agent_id = %chunk.agent_id,
            topic_id = %chunk.topic_id,
            text_len = chunk.text.len(),
            "Knowledge chunk queued"
        );
        Ok(WriteReceipt {
            sequence,
            chunk,
            rx,
        })
    }

    /// Stop accepting chunks and wait for queued ones to finish.
    pub async fn shutdown(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Knowledge chunk writer task failed");
            }
        }
    }
}

async fn run_worker(
    store: Arc<dyn KnowledgeStore>,
    policy: RetryPolicy,
    mut rx: mpsc::Receiver<Job>,
) {
    while let Some(job) = rx.recv().await {
        let outcome = write_with_retry(store.as_ref(), &policy, job.sequence, job.chunk).await;
        // The receipt may have been dropped; the outcome is already logged.
        let _ = job.done.send(outcome);
    }
    tracing::debug!("Knowledge chunk writer drained");
}

/// Write one chunk, retrying transient failures under `policy`.
pub async fn write_with_retry(
    store: &dyn KnowledgeStore,
    policy: &RetryPolicy,
    sequence: u64,
    chunk: KnowledgeChunk,
) -> WriteOutcome {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match WriteAttempt::classify(store.write_chunk(&chunk).await) {
            WriteAttempt::Ok => {
                tracing::info!(
                    sequence,
                    attempts,
                    topic_id = %chunk.topic_id,
                    "Knowledge chunk stored"
                );
                return WriteOutcome::Stored { sequence, attempts };
            }
            WriteAttempt::Fatal(err) => {
                tracing::warn!(sequence, attempts, error = %err, "Knowledge chunk rejected");
                return WriteOutcome::Failed(WriteFailure {
                    sequence: Some(sequence),
                    chunk,
                    attempts,
                    kind: WriteFailureKind::Fatal(err),
                    failed_at: Utc::now(),
                });
            }
            WriteAttempt::Retryable(err) => {
                if !policy.allows_another(attempts) {
                    tracing::warn!(
                        sequence,
                        attempts,
                        error = %err,
                        "Knowledge chunk write gave up after retries"
                    );
                    return WriteOutcome::Failed(WriteFailure {
                        sequence: Some(sequence),
                        chunk,
                        attempts,
                        kind: WriteFailureKind::Exhausted(err),
                        failed_at: Utc::now(),
                    });
                }
                let delay = policy.delay_after(attempts);
                tracing::debug!(
                    sequence,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying knowledge chunk write"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
