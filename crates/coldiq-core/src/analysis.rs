//! Analysis value objects: what the agent sends to `/analysis/analyze` and what comes back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subject and body captured from a composition surface at activation time.
///
/// Immutable once built; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub subject: String,
    pub body: String,
}

impl AnalysisRequest {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// True when the body has nothing but whitespace. Such requests are never sent.
    pub fn is_body_blank(&self) -> bool {
        self.body.trim().is_empty()
    }
}

/// Parsed server response for one analysis.
///
/// Field names follow the server's snake_case shape; the older extension names
/// (`optimized_subject`, `rewritten_email`) are accepted as aliases. Every field is
/// optional on the wire and falls back to its default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResult {
    /// Server-side analysis id (used for the dashboard history link).
    pub id: Option<String>,
    #[serde(rename = "analysis_score", alias = "score")]
    pub score: i64,
    pub estimated_open_rate: f64,
    pub estimated_response_rate: f64,
    #[serde(alias = "optimized_subject")]
    pub rewritten_subject: String,
    #[serde(alias = "rewritten_email")]
    pub rewritten_body: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub improvements: Vec<String>,
    pub key_insight: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl AnalysisResult {
    /// Whether there is anything to write back into the surface.
    pub fn has_rewrite(&self) -> bool {
        !self.rewritten_subject.trim().is_empty() || !self.rewritten_body.trim().is_empty()
    }
}
