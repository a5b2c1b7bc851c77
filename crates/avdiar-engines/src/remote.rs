//! Remote transcription service client
//!
//! Three-endpoint HTTP API: upload raw audio bytes, submit a transcription
//! job for an uploaded clip, poll the job until it reaches a terminal state.
//! The batch workflow in [`crate::batch`] drives these primitives.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_API_BASE: &str = "https://api.assemblyai.com/v2";

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const POLL_TIMEOUT: Duration = Duration::from_secs(20);

/// Transcription provider errors, split by whether a retry can help.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authentication rejected by transcription service")]
    Auth,

    #[error("transcription API error: {0}")]
    Api(String),

    /// Server-side trouble (5xx, rate limiting); retryable
    #[error("transcription service unavailable: {0}")]
    Server(String),

    /// Transport-level failure; retryable
    #[error("network error: {0}")]
    Network(String),

    /// Request timed out; retryable
    #[error("request timed out")]
    Timeout,
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Server(_) | Self::Network(_) | Self::Timeout)
    }

    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Network(err.to_string())
        } else {
            Self::Api(err.to_string())
        }
    }
}

/// State of a remote transcription job as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Pending,
    Completed(String),
    Failed(String),
}

/// The remote transcription API surface, as a trait so the batch workflow
/// can be exercised against a test double.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Upload a clip; returns the service-side audio URL.
    async fn upload(&self, clip: &Path) -> Result<String, ProviderError>;

    /// Submit a transcription job for an uploaded clip; returns the job id.
    async fn submit(&self, audio_url: &str) -> Result<String, ProviderError>;

    /// Check a job once.
    async fn poll(&self, job_id: &str) -> Result<JobStatus, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    status: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn job_status_from(resp: JobResponse) -> JobStatus {
    match resp.status.as_str() {
        "completed" => JobStatus::Completed(resp.text.unwrap_or_default()),
        "error" | "failed" => JobStatus::Failed(
            resp.error
                .unwrap_or_else(|| "unspecified service failure".to_string()),
        ),
        _ => JobStatus::Pending,
    }
}

/// HTTP client for the remote transcription service.
pub struct RemoteTranscriber {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl RemoteTranscriber {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_api_base(api_key, DEFAULT_API_BASE)
    }

    pub fn with_api_base(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 | 403 => ProviderError::Auth,
            429 => ProviderError::Server("rate limited".to_string()),
            500..=599 => ProviderError::Server(format!("HTTP {}: {}", status, body)),
            _ => ProviderError::Api(format!("HTTP {}: {}", status, body)),
        })
    }
}

#[async_trait]
impl TranscriptionService for RemoteTranscriber {
    async fn upload(&self, clip: &Path) -> Result<String, ProviderError> {
        let bytes = tokio::fs::read(clip)
            .await
            .map_err(|e| ProviderError::Api(format!("reading clip {:?}: {}", clip, e)))?;

        tracing::debug!("uploading {:?} ({} bytes)", clip, bytes.len());

        let response = self
            .client
            .post(format!("{}/upload", self.api_base))
            .header("authorization", &self.api_key)
            .timeout(UPLOAD_TIMEOUT)
            .body(bytes)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let upload: UploadResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Api(format!("malformed upload response: {}", e)))?;
        Ok(upload.upload_url)
    }

    async fn submit(&self, audio_url: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}/transcript", self.api_base))
            .header("authorization", &self.api_key)
            .json(&serde_json::json!({ "audio_url": audio_url }))
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let submit: SubmitResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Api(format!("malformed submit response: {}", e)))?;

        tracing::debug!("submitted job {}", submit.id);
        Ok(submit.id)
    }

    async fn poll(&self, job_id: &str) -> Result<JobStatus, ProviderError> {
        let response = self
            .client
            .get(format!("{}/transcript/{}", self.api_base, job_id))
            .header("authorization", &self.api_key)
            .timeout(POLL_TIMEOUT)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let job: JobResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Api(format!("malformed job response: {}", e)))?;
        Ok(job_status_from(job))
    }
}
