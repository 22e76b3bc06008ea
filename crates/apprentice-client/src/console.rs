//! reqwest-backed client for the management console REST API.

use std::time::{Duration, Instant};

use apprentice_core::config::ConsoleConfig;
use apprentice_core::types::{
    AgentId, Analysis, GapResolution, KnowledgeChunk, KnowledgeGap, QaPair, TopicId,
};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::collaborator::{
    ConfidenceAnalyzer, GapDirectory, GapResolver, KnowledgeStore, TopicSummaries,
    TrainingFinalizer,
};
use crate::error::ClientError;
use crate::wire::{
    AnalyzeResponse, FinalizeRequest, FinalizeResponse, ResolveResponse, SummaryResponse,
    TextRequest,
};

/// Summary shown when the console has nothing on a topic yet.
pub const EMPTY_TOPIC_SUMMARY: &str = "I don't know anything about this topic yet.";

/// Maximum number of body bytes kept in a `ClientError::Status`.
const MAX_ERROR_BODY: usize = 512;

/// Client for every collaborator the training session talks to.
#[derive(Clone)]
pub struct ConsoleClient {
    http: Client,
    base_url: Url,
}

impl ConsoleClient {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { http, base_url })
    }

    /// Create a client from the `[console]` configuration section.
    pub fn from_config(config: &ConsoleConfig) -> Result<Self, ClientError> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL, percent-encoding every path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post_text(&self, url: Url, text: &str) -> Result<Response, ClientError> {
        self.post_json(
            url,
            &TextRequest {
                text: text.to_string(),
            },
        )
        .await
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<Response, ClientError> {
        let started = Instant::now();
        let response = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(url = %url, error = %e, "Console request failed");
                ClientError::from(e)
            })?;
        tracing::debug!(
            url = %url,
            status = %response.status(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Console request completed"
        );
        check_status(response).await
    }

    async fn get(&self, url: Url) -> Result<Response, ClientError> {
        let started = Instant::now();
        let response = self.http.get(url.clone()).send().await.map_err(|e| {
            tracing::debug!(url = %url, error = %e, "Console request failed");
            ClientError::from(e)
        })?;
        tracing::debug!(
            url = %url,
            status = %response.status(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Console request completed"
        );
        check_status(response).await
    }
}

/// Turn non-success statuses into `ClientError::Status`.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Decode a JSON body, treating an empty body as JSON `null`.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let bytes = response.bytes().await?;
    let slice: &[u8] = if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        b"null"
    } else {
        &bytes
    };
    serde_json::from_slice(slice).map_err(|e| ClientError::Decode(e.to_string()))
}

#[async_trait]
impl ConfidenceAnalyzer for ConsoleClient {
    async fn analyze(
        &self,
        agent_id: &AgentId,
        topic_id: &TopicId,
        full_context: &str,
    ) -> Result<Analysis, ClientError> {
        let url = self.endpoint(&[
            "agents",
            agent_id.as_str(),
            "topics",
            topic_id.as_str(),
            "training",
            "analyze",
        ])?;
        let response = self.post_text(url, full_context).await?;
        let raw: Option<AnalyzeResponse> = decode(response).await?;
        let analysis = raw.unwrap_or_default().normalize();
        tracing::debug!(
            agent_id = %agent_id,
            topic_id = %topic_id,
            confidence = analysis.confidence.value(),
            questions = analysis.questions.len(),
            "Training text analyzed"
        );
        Ok(analysis)
    }
}

#[async_trait]
impl GapResolver for ConsoleClient {
    async fn resolve(
        &self,
        agent_id: &AgentId,
        question_text: &str,
    ) -> Result<Option<GapResolution>, ClientError> {
        let url = self.endpoint(&["agents", agent_id.as_str(), "gaps", "resolve"])?;
        let response = self.post_text(url, question_text).await?;
        let raw: Option<ResolveResponse> = decode(response).await?;
        Ok(raw.and_then(ResolveResponse::into_resolution))
    }
}

#[async_trait]
impl KnowledgeStore for ConsoleClient {
    async fn write_chunk(&self, chunk: &KnowledgeChunk) -> Result<(), ClientError> {
        let url = self.endpoint(&[
            "agents",
            chunk.agent_id.as_str(),
            "topics",
            chunk.topic_id.as_str(),
            "knowledge",
        ])?;
        self.post_text(url, &chunk.text).await?;
        Ok(())
    }
}

#[async_trait]
impl GapDirectory for ConsoleClient {
    async fn open_gaps(&self, agent_id: &AgentId) -> Result<Vec<KnowledgeGap>, ClientError> {
        let url = self.endpoint(&["agents", agent_id.as_str(), "gaps"])?;
        let response = self.get(url).await?;
        let gaps: Option<Vec<KnowledgeGap>> = decode(response).await?;
        Ok(gaps.unwrap_or_default())
    }
}

#[async_trait]
impl TopicSummaries for ConsoleClient {
    async fn topic_summary(
        &self,
        agent_id: &AgentId,
        topic_id: &TopicId,
    ) -> Result<String, ClientError> {
        let url = self.endpoint(&[
            "agents",
            agent_id.as_str(),
            "topics",
            topic_id.as_str(),
            "summary",
        ])?;
        let response = self.get(url).await?;
        let raw: Option<SummaryResponse> = decode(response).await?;
        Ok(raw
            .and_then(|r| r.summary)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| EMPTY_TOPIC_SUMMARY.to_string()))
    }
}

#[async_trait]
impl TrainingFinalizer for ConsoleClient {
    async fn finalize(
        &self,
        agent_id: &AgentId,
        topic_id: &TopicId,
        original_text: &str,
        qa_pairs: &[QaPair],
    ) -> Result<String, ClientError> {
        let url = self.endpoint(&[
            "agents",
            agent_id.as_str(),
            "topics",
            topic_id.as_str(),
            "training",
            "finalize",
        ])?;
        let body = FinalizeRequest {
            original_text,
            qa_pairs,
        };
        let response = self.post_json(url, &body).await?;
        let raw: Option<FinalizeResponse> = decode(response).await?;
        let text = raw
            .and_then(|r| r.crystallized_text)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        tracing::info!(
            agent_id = %agent_id,
            topic_id = %topic_id,
            qa_pairs = qa_pairs.len(),
            condensed_len = text.len(),
            "Training finalized"
        );
        Ok(text)
    }
}
