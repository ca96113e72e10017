//! # Analysis API client
//!
//! Thin wrapper over the two endpoints the pipeline needs: submitting an
//! analysis and reading its processing status.

use async_trait::async_trait;
use relay_core::{RepositoryNwo, StatusResponse, SubmissionId, UploadError, UploadPayload};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

/// Version of the tool, sent in the User-Agent header.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Failures talking to the analysis service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection failed, DNS error, timeout and similar.
    #[error("Network error: {message}")]
    Network { message: String },

    /// 4xx: the service rejected the request.
    #[error("Request rejected ({status}): {message}")]
    ClientError { status: u16, message: String },

    /// 5xx from the service.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("Failed to parse response: {message}")]
    ParseError { message: String },
}

impl ApiError {
    /// Network or HTTP-status failure, as opposed to a malformed response.
    pub fn is_transport_error(&self) -> bool {
        !matches!(self, ApiError::ParseError { .. })
    }
}

impl From<ApiError> for UploadError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::ClientError { .. } => UploadError::InvalidRequest(e.to_string()),
            other => UploadError::Request(other.to_string()),
        }
    }
}

/// The remote side of the pipeline. Implemented over HTTP, and by scripted
/// fakes in tests.
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// Submits a payload; returns the id to poll.
    async fn upload_analysis(
        &self,
        repo: &RepositoryNwo,
        payload: &UploadPayload,
    ) -> Result<SubmissionId, ApiError>;

    /// Reads the processing status of a submission.
    async fn analysis_status(
        &self,
        repo: &RepositoryNwo,
        id: &SubmissionId,
    ) -> Result<StatusResponse, ApiError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

/// HTTP implementation of [`AnalysisApi`].
pub struct HttpAnalysisApi {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl HttpAnalysisApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("sarif-relay/{VERSION}"))
                .unwrap_or_else(|_| HeaderValue::from_static("sarif-relay")),
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Network {
                message: e.to_string(),
            })?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    fn analysis_url(&self, repo: &RepositoryNwo) -> String {
        format!(
            "{}/repos/{}/{}/code-scanning/analysis",
            self.base_url, repo.owner, repo.repo
        )
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let resp = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| ApiError::Network {
                message: e.to_string(),
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp
            .text()
            .await
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("").to_string());
        Err(classify_status(status, message))
    }
}

fn classify_status(status: StatusCode, message: String) -> ApiError {
    if status.is_server_error() {
        ApiError::Server {
            status: status.as_u16(),
            message,
        }
    } else {
        ApiError::ClientError {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl AnalysisApi for HttpAnalysisApi {
    async fn upload_analysis(
        &self,
        repo: &RepositoryNwo,
        payload: &UploadPayload,
    ) -> Result<SubmissionId, ApiError> {
        let resp = self
            .send(self.client.put(self.analysis_url(repo)).json(payload))
            .await?;
        tracing::debug!(status = %resp.status(), "upload response");
        let body: UploadResponse = resp.json().await.map_err(|e| ApiError::ParseError {
            message: e.to_string(),
        })?;
        Ok(SubmissionId(body.id))
    }

    async fn analysis_status(
        &self,
        repo: &RepositoryNwo,
        id: &SubmissionId,
    ) -> Result<StatusResponse, ApiError> {
        let url = format!("{}/{}", self.analysis_url(repo), id);
        let resp = self.send(self.client.get(url)).await?;
        resp.json().await.map_err(|e| ApiError::ParseError {
            message: e.to_string(),
        })
    }
}
