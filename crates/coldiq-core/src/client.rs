//! Analysis API client: `POST {base}/analysis/analyze` with a bearer session token.
//!
//! The agent only ever needs one endpoint, so the seam is a single-method trait
//! (`AnalysisApi`). `HttpAnalysisClient` is the production implementation; tests
//! swap in fakes or point it at a mock server.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::analysis::{AnalysisRequest, AnalysisResult};
use crate::config::AgentConfig;

/// Path of the analysis endpoint, relative to the API base URL.
pub const ANALYZE_PATH: &str = "/analysis/analyze";

const FALLBACK_FAILURE_MESSAGE: &str = "Analysis failed";

/// Failure reported by the analysis API or the transport beneath it.
///
/// `Display` is the bare message: it is exactly what the panel shows and what the
/// error classifier matches against.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    /// HTTP status when the server answered; `None` for transport failures.
    pub status: Option<u16>,
    /// Human-readable message (the server's `detail`, or a transport description).
    pub message: String,
    /// Optional machine-readable code when the server supplies one.
    pub code: Option<String>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            code: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Failure body: `{"detail": ..., "code": ...}`. FastAPI validation errors put an
/// array in `detail`, so it is kept as raw JSON.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    code: Option<String>,
}

impl ErrorBody {
    fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            serde_json::Value::String(_) | serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Anything that can turn an `AnalysisRequest` into an `AnalysisResult`.
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest, token: &str) -> Result<AnalysisResult, ApiError>;
}

/// reqwest-backed client for the ColdIQ analysis endpoint.
pub struct HttpAnalysisClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAnalysisClient {
    /// Create a client for `base_url` (e.g. `https://host/api`), trailing slash optional.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.api_base_url.clone(), config.request_timeout())
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, ANALYZE_PATH)
    }
}

#[async_trait]
impl AnalysisApi for HttpAnalysisClient {
    async fn analyze(&self, request: &AnalysisRequest, token: &str) -> Result<AnalysisResult, ApiError> {
        let url = self.endpoint();
        debug!(target: "coldiq::core", %url, body_len = request.body.len(), "sending analysis request");

        let res = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .bearer_auth(token.trim())
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::new(format!("{}: {}", FALLBACK_FAILURE_MESSAGE, e)))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| ApiError::new(format!("{}: {}", FALLBACK_FAILURE_MESSAGE, e)).with_status(status.as_u16()))?;

        if !status.is_success() {
            let parsed = serde_json::from_str::<ErrorBody>(&text).ok();
            let message = parsed
                .as_ref()
                .and_then(ErrorBody::message)
                .unwrap_or_else(|| FALLBACK_FAILURE_MESSAGE.to_string());
            let mut err = ApiError::new(message).with_status(status.as_u16());
            if let Some(code) = parsed.and_then(|b| b.code).filter(|c| !c.trim().is_empty()) {
                err = err.with_code(code);
            }
            debug!(target: "coldiq::core", status = status.as_u16(), message = %err.message, "analysis request rejected");
            return Err(err);
        }

        serde_json::from_str::<AnalysisResult>(&text).map_err(|e| {
            ApiError::new(format!("Failed to parse analysis response: {}", e)).with_status(status.as_u16())
        })
    }
}
