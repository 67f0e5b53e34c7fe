use crate::core::metadata::MetadataMap;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Why a request to the job service did not produce a usable response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// 5xx, or any other unexpected non-success status. Transient.
    #[error("server error (HTTP {status})")]
    Server { status: u16 },
    /// 4xx. The request itself is wrong and repeating it will not help.
    #[error("client error (HTTP {status})")]
    Client { status: u16 },
    /// The request never got a response.
    #[error("network error: {0}")]
    Network(String),
    /// A success response whose body could not be decoded.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether polling should carry on after this failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Server { .. } | FetchError::Network(_))
    }
}

/// Maps an HTTP status code to a failure, `None` for success codes.
#[must_use]
pub fn classify_status(status: u16) -> Option<FetchError> {
    match status {
        200..=299 => None,
        400..=499 => Some(FetchError::Client { status }),
        _ => Some(FetchError::Server { status }),
    }
}

/// Progress of a job as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed { message: Option<String> },
    /// A status string this client does not know; treated as still in progress.
    Unknown(String),
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed { .. })
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed { .. } => write!(f, "failed"),
            JobStatus::Unknown(status) => write!(f, "{status}"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

impl From<StatusResponse> for JobStatus {
    fn from(response: StatusResponse) -> Self {
        match response.status.to_ascii_lowercase().as_str() {
            "pending" | "queued" | "submitted" => JobStatus::Pending,
            "running" | "processing" => JobStatus::Running,
            "completed" | "complete" | "finished" | "succeeded" => JobStatus::Completed,
            "failed" | "error" => JobStatus::Failed {
                message: response.message,
            },
            _ => JobStatus::Unknown(response.status),
        }
    }
}

/// Alignment produced by a finished job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlignmentResult {
    /// CLUSTAL text.
    #[serde(alias = "clustal")]
    pub alignment: String,
    #[serde(default, alias = "sequenceInfo")]
    pub metadata: MetadataMap,
}

/// Decodes a status endpoint body.
pub fn parse_status(body: &str) -> Result<JobStatus, FetchError> {
    serde_json::from_str::<StatusResponse>(body)
        .map(JobStatus::from)
        .map_err(|e| FetchError::Decode(e.to_string()))
}

/// Decodes a result endpoint body.
pub fn parse_result(body: &str) -> Result<AlignmentResult, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Source of job status updates, implemented over HTTP by [`JobApi`].
pub trait JobStatusSource {
    fn status(&self, job_id: &str) -> impl Future<Output = Result<JobStatus, FetchError>> + Send;
}

/// Client for the alignment job service.
#[derive(Debug, Clone)]
pub struct JobApi {
    client: reqwest::Client,
    base_url: String,
}

impl JobApi {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(format!("{CRATE_NAME}/{CRATE_VERSION}"))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn job_url(&self, job_id: &str, endpoint: &str) -> String {
        format!("{}/jobs/{job_id}/{endpoint}", self.base_url)
    }

    async fn get_text(&self, url: String) -> Result<String, FetchError> {
        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "request failed");
            FetchError::Network(e.to_string())
        })?;

        let status = response.status().as_u16();
        if let Some(error) = classify_status(status) {
            warn!(url = %url, status, "request returned failure status");
            return Err(error);
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        debug!(url = %url, status, body_len = body.len(), "request succeeded");
        Ok(body)
    }

    /// Fetches the alignment and metadata of a completed job.
    pub async fn result(&self, job_id: &str) -> Result<AlignmentResult, FetchError> {
        let body = self.get_text(self.job_url(job_id, "result")).await?;
        parse_result(&body)
    }
}

impl JobStatusSource for JobApi {
    async fn status(&self, job_id: &str) -> Result<JobStatus, FetchError> {
        let body = self.get_text(self.job_url(job_id, "status")).await?;
        parse_status(&body)
    }
}
