//! Result Renderer and Error Classifier.
//!
//! `ResultPanel` is the per-surface state machine behind the injected panel:
//! Idle -> Loading -> Success | Error, with any state re-enterable into Loading.
//! Each activation gets a fresh [`RequestId`]; completions carrying an older id are
//! discarded so a slow response can never overwrite a newer one.
//!
//! Rendering produces the panel's content markup. Everything that came from the
//! server is escaped before it is painted into the host page.

use std::time::Duration;

use coldiq_core::{AnalysisResult, ApiError, PanelLinks};
use tokio::time::Instant;
use tracing::debug;

/// How long the "Copied!" / "Applied!" labels stay up.
pub const FLASH: Duration = Duration::from_secs(2);

/// Shown inline when the body is empty at activation.
pub const EMPTY_BODY_WARNING: &str = "Please write some email content first.";

/// Shown when no session token is stored.
pub const LOGIN_REQUIRED: &str = "Please log in to ColdIQ to analyze emails.";

/// Rendered error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or rejected token: login call-to-action.
    Unauthenticated,
    /// Plan limit reached: upgrade call-to-action, no login link.
    QuotaExceeded,
    /// Anything else: raw message only.
    Generic,
}

impl ErrorKind {
    /// Case-insensitive message matching: "401"/"token" beat "limit".
    pub fn classify(message: &str) -> Self {
        let m = message.to_lowercase();
        if m.contains("401") || m.contains("token") {
            ErrorKind::Unauthenticated
        } else if m.contains("limit") {
            ErrorKind::QuotaExceeded
        } else {
            ErrorKind::Generic
        }
    }

    /// Machine-readable error codes, when the server sends one.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "unauthenticated" | "invalid_token" | "token_expired" => Some(ErrorKind::Unauthenticated),
            "quota_exceeded" | "limit_reached" => Some(ErrorKind::QuotaExceeded),
            _ => None,
        }
    }

    pub fn from_api_error(err: &ApiError) -> Self {
        err.code
            .as_deref()
            .and_then(Self::from_code)
            .unwrap_or_else(|| Self::classify(&err.message))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::Generic => "generic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RenderState {
    #[default]
    Idle,
    Loading,
    Success(AnalysisResult),
    Error { kind: ErrorKind, message: String },
}

impl RenderState {
    /// Error state classified from the message text.
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        RenderState::Error {
            kind: ErrorKind::classify(&message),
            message,
        }
    }

    /// No stored session token.
    pub fn login_required() -> Self {
        RenderState::Error {
            kind: ErrorKind::Unauthenticated,
            message: LOGIN_REQUIRED.to_string(),
        }
    }

    pub fn from_api_error(err: &ApiError) -> Self {
        RenderState::Error {
            kind: ErrorKind::from_api_error(err),
            message: err.message.clone(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RenderState::Idle => "idle",
            RenderState::Loading => "loading",
            RenderState::Success(_) => "success",
            RenderState::Error { .. } => "error",
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            RenderState::Success(result) => Some(result),
            _ => None,
        }
    }
}

/// Monotonic per-panel activation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

/// Which optimized field a copy action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyTarget {
    Subject,
    Body,
}

impl CopyTarget {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "subject" => Some(CopyTarget::Subject),
            "body" => Some(CopyTarget::Body),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CopyTarget::Subject => "subject",
            CopyTarget::Body => "body",
        }
    }

    /// The text this target copies out of `result`.
    pub fn text<'a>(&self, result: &'a AnalysisResult) -> &'a str {
        match self {
            CopyTarget::Subject => &result.rewritten_subject,
            CopyTarget::Body => &result.rewritten_body,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultPanel {
    state: RenderState,
    latest: RequestId,
    visible: bool,
    warning: Option<String>,
    copied: Option<(CopyTarget, Instant)>,
    applied_at: Option<Instant>,
    links: PanelLinks,
}

impl ResultPanel {
    pub fn new(links: PanelLinks) -> Self {
        Self {
            state: RenderState::Idle,
            latest: RequestId(0),
            visible: false,
            warning: None,
            copied: None,
            applied_at: None,
            links,
        }
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn latest_request(&self) -> RequestId {
        self.latest
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    /// Enter Loading for a new activation and return its id.
    /// The previous result is discarded.
    pub fn begin(&mut self) -> RequestId {
        self.latest = RequestId(self.latest.0 + 1);
        self.state = RenderState::Loading;
        self.visible = true;
        self.warning = None;
        self.copied = None;
        self.applied_at = None;
        self.latest
    }

    /// Apply the outcome of request `id`. Returns false (and changes nothing) when a
    /// newer activation has started since.
    pub fn complete(&mut self, id: RequestId, outcome: RenderState) -> bool {
        if id != self.latest {
            debug!(
                target: "coldiq::bridge",
                stale = id.0,
                latest = self.latest.0,
                "discarding stale analysis response"
            );
            return false;
        }
        self.state = outcome;
        true
    }

    /// Inline warning that leaves the render state untouched.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warning = Some(message.into());
        self.visible = true;
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn mark_copied(&mut self, target: CopyTarget, now: Instant) {
        self.copied = Some((target, now));
    }

    pub fn mark_applied(&mut self, now: Instant) {
        self.applied_at = Some(now);
    }

    pub fn copy_label(&self, target: CopyTarget, now: Instant) -> &'static str {
        match self.copied {
            Some((t, at)) if t == target && now.duration_since(at) < FLASH => "Copied!",
            _ => "Copy",
        }
    }

    pub fn apply_label(&self, now: Instant) -> &'static str {
        match self.applied_at {
            Some(at) if now.duration_since(at) < FLASH => "Applied!",
            _ => "Apply to Email",
        }
    }

    /// Markup for the panel's content region at time `now`.
    pub fn render_html(&self, now: Instant) -> String {
        let mut html = String::new();
        if let Some(warning) = &self.warning {
            html.push_str(&format!(
                r#"<div class="coldiq-warning"><p>{}</p></div>"#,
                html_escape(warning)
            ));
        }
        match &self.state {
            RenderState::Idle => {}
            RenderState::Loading => html.push_str(
                r#"<div class="coldiq-loading"><div class="coldiq-spinner"></div><p>Analyzing your email...</p></div>"#,
            ),
            RenderState::Success(result) => self.render_success(result, now, &mut html),
            RenderState::Error { kind, message } => self.render_error(*kind, message, &mut html),
        }
        html
    }

    fn render_success(&self, result: &AnalysisResult, now: Instant, html: &mut String) {
        html.push_str(&format!(
            r#"<div class="coldiq-score"><span class="coldiq-score-value" style="color: {}">{}</span><span class="coldiq-score-label">Score</span></div>"#,
            score_color(result.score),
            result.score
        ));
        html.push_str(&format!(
            r#"<div class="coldiq-metrics"><div class="coldiq-metric"><span class="coldiq-metric-value">{}</span><span class="coldiq-metric-label">Open Rate</span></div><div class="coldiq-metric"><span class="coldiq-metric-value">{}</span><span class="coldiq-metric-label">Response Rate</span></div></div>"#,
            percent(result.estimated_open_rate),
            percent(result.estimated_response_rate)
        ));

        list_section(html, "Strengths", "coldiq-success", &result.strengths);
        list_section(html, "Areas to Improve", "coldiq-warning", &result.weaknesses);
        list_section(html, "Suggestions", "", &result.improvements);

        if !result.key_insight.trim().is_empty() {
            html.push_str(&format!(
                r#"<div class="coldiq-section"><h4 class="coldiq-section-title">Key Insight</h4><p class="coldiq-insight">{}</p></div>"#,
                html_escape(&result.key_insight)
            ));
        }

        for (title, target) in [("Optimized Subject", CopyTarget::Subject), ("Optimized Email", CopyTarget::Body)] {
            let text = target.text(result);
            let disabled = if text.trim().is_empty() { " disabled" } else { "" };
            html.push_str(&format!(
                r#"<div class="coldiq-section"><h4 class="coldiq-section-title">{}</h4><div class="coldiq-optimized"><p>{}</p><button class="coldiq-copy-btn" data-action="copy" data-copy="{}"{}>{}</button></div></div>"#,
                title,
                text_to_html(text),
                target.as_str(),
                disabled,
                self.copy_label(target, now)
            ));
        }

        let apply_disabled = if result.has_rewrite() { "" } else { " disabled" };
        html.push_str(&format!(
            r#"<button class="coldiq-apply-btn" data-action="apply"{}>{}</button>"#,
            apply_disabled,
            self.apply_label(now)
        ));
        html.push_str(&format!(
            r#"<a href="{}" target="_blank" class="coldiq-cta">View Full Analysis</a>"#,
            html_escape(&self.links.history_url)
        ));
    }

    fn render_error(&self, kind: ErrorKind, message: &str, html: &mut String) {
        let cta = match kind {
            ErrorKind::Unauthenticated => format!(
                r#"<a href="{}" target="_blank" class="coldiq-cta">Log in to ColdIQ</a>"#,
                html_escape(&self.links.login_url)
            ),
            ErrorKind::QuotaExceeded => format!(
                r#"<a href="{}" target="_blank" class="coldiq-cta">Upgrade your plan</a>"#,
                html_escape(&self.links.upgrade_url)
            ),
            ErrorKind::Generic => String::new(),
        };
        html.push_str(&format!(
            r#"<div class="coldiq-error" data-error="{}"><p>{}</p>{}</div>"#,
            kind.as_str(),
            html_escape(message),
            cta
        ));
    }
}

fn list_section(html: &mut String, title: &str, class: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let lis: String = items
        .iter()
        .map(|item| format!("<li>{}</li>", html_escape(item)))
        .collect();
    html.push_str(&format!(
        r#"<div class="coldiq-section"><h4 class="coldiq-section-title {}">{}</h4><ul class="coldiq-list">{}</ul></div>"#,
        class, title, lis
    ));
}

/// Score colour: green from 70, gold from 50, red below.
pub fn score_color(score: i64) -> &'static str {
    if score >= 70 {
        "#a3e635"
    } else if score >= 50 {
        "#d4af37"
    } else {
        "#ef4444"
    }
}

fn percent(rate: f64) -> String {
    if rate.fract() == 0.0 {
        format!("{:.0}%", rate)
    } else {
        format!("{:.1}%", rate)
    }
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Escaped text with newlines as `<br>`, the form written into rich-text fields.
pub fn text_to_html(s: &str) -> String {
    html_escape(s).replace("\r\n", "\n").replace('\n', "<br>")
}
