//! AnalysisOrchestrator: extract -> validate -> token -> analyze -> render.
//!
//! The page tree is shared behind a `Mutex`. Locks are taken in the order
//! tree, then panel, and none is held across an await, so the host page stays
//! responsive while the token read and the network call are pending.

use std::sync::{Arc, Mutex};

use coldiq_core::{AgentConfig, AnalysisApi, AnalysisResult, HttpAnalysisClient, TokenStore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clipboard::Clipboard;
use crate::error::{BridgeError, BridgeResult, DiscoveryFailure};
use crate::injector::InjectedControl;
use crate::lock;
use crate::panel::{text_to_html, CopyTarget, ErrorKind, RenderState, EMPTY_BODY_WARNING, FLASH};
use crate::selectors::{extract_request, resolve, FieldKind};
use crate::tree::{NodeId, SurfaceTree};

/// How an activation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivationOutcome {
    /// The panel now shows this state.
    Completed(RenderState),
    /// A newer activation started while this one was in flight; its outcome was dropped.
    Superseded,
}

pub struct AnalysisOrchestrator {
    api: Arc<dyn AnalysisApi>,
    tokens: Arc<dyn TokenStore>,
    clipboard: Arc<dyn Clipboard>,
    token_key: String,
}

impl AnalysisOrchestrator {
    pub fn new(
        api: Arc<dyn AnalysisApi>,
        tokens: Arc<dyn TokenStore>,
        clipboard: Arc<dyn Clipboard>,
        token_key: impl Into<String>,
    ) -> Self {
        Self {
            api,
            tokens,
            clipboard,
            token_key: token_key.into(),
        }
    }

    /// HTTP client from `config`, with the given token store and clipboard.
    pub fn from_config(config: &AgentConfig, tokens: Arc<dyn TokenStore>, clipboard: Arc<dyn Clipboard>) -> Self {
        Self::new(
            Arc::new(HttpAnalysisClient::from_config(config)),
            tokens,
            clipboard,
            config.token_key.clone(),
        )
    }

    /// Run one analysis for the surface behind `control`.
    ///
    /// An empty body shows the inline warning and returns `BridgeError::EmptyBody`
    /// without touching the render state or the network. Every other failure ends in
    /// an Error render state.
    pub async fn activate<T: SurfaceTree>(
        &self,
        tree: &Mutex<T>,
        control: &InjectedControl,
    ) -> BridgeResult<ActivationOutcome> {
        let (request, id) = {
            let mut tree = lock(tree);
            let request = extract_request(&*tree, control.surface.root);
            if request.is_body_blank() {
                lock(&control.panel).warn(EMPTY_BODY_WARNING);
                control.paint(&mut *tree, Instant::now());
                info!(target: "coldiq::bridge", root = control.surface.root.0, "activation rejected: empty body");
                return Err(BridgeError::EmptyBody);
            }
            let id = lock(&control.panel).begin();
            control.paint(&mut *tree, Instant::now());
            (request, id)
        };
        debug!(target: "coldiq::bridge", request = id.0, "analysis started");

        let outcome = match self.tokens.get(&self.token_key).await {
            Ok(Some(token)) => match self.api.analyze(&request, &token).await {
                Ok(result) => {
                    info!(target: "coldiq::bridge", request = id.0, score = result.score, "analysis complete");
                    RenderState::Success(result)
                }
                Err(err) => {
                    let state = RenderState::from_api_error(&err);
                    warn!(
                        target: "coldiq::bridge",
                        request = id.0,
                        status = ?err.status,
                        kind = ErrorKind::from_api_error(&err).as_str(),
                        "analysis failed: {}",
                        err
                    );
                    state
                }
            },
            Ok(None) => {
                info!(target: "coldiq::bridge", request = id.0, "no stored token");
                RenderState::login_required()
            }
            Err(err) => {
                warn!(target: "coldiq::bridge", request = id.0, "token store read failed: {}", err);
                RenderState::Error {
                    kind: ErrorKind::Generic,
                    message: format!("Could not read the stored session: {}", err),
                }
            }
        };

        let mut tree = lock(tree);
        if !lock(&control.panel).complete(id, outcome.clone()) {
            return Ok(ActivationOutcome::Superseded);
        }
        control.paint(&mut *tree, Instant::now());
        Ok(ActivationOutcome::Completed(outcome))
    }

    /// Copy the optimized subject or body to the clipboard and flash "Copied!".
    pub async fn copy<T: SurfaceTree>(
        &self,
        tree: &Mutex<T>,
        control: &InjectedControl,
        target: CopyTarget,
    ) -> BridgeResult<()> {
        let text = {
            let panel = lock(&control.panel);
            let result = panel.state().result().ok_or(BridgeError::NoResult)?;
            target.text(result).to_string()
        };
        self.clipboard.write_text(&text)?;
        {
            let mut tree = lock(tree);
            lock(&control.panel).mark_copied(target, Instant::now());
            control.paint(&mut *tree, Instant::now());
        }
        debug!(target: "coldiq::bridge", field = target.as_str(), "optimized text copied");

        tokio::time::sleep(FLASH).await;
        control.paint(&mut *lock(tree), Instant::now());
        Ok(())
    }

    /// Write the optimized subject and body back into the surface and flash "Applied!".
    pub async fn apply<T: SurfaceTree>(&self, tree: &Mutex<T>, control: &InjectedControl) -> BridgeResult<()> {
        {
            let mut tree = lock(tree);
            let result = lock(&control.panel)
                .state()
                .result()
                .cloned()
                .ok_or(BridgeError::NoResult)?;
            write_back(&mut *tree, control.surface.root, &result)?;
            lock(&control.panel).mark_applied(Instant::now());
            control.paint(&mut *tree, Instant::now());
        }
        info!(target: "coldiq::bridge", root = control.surface.root.0, "optimized email applied");

        tokio::time::sleep(FLASH).await;
        control.paint(&mut *lock(tree), Instant::now());
        Ok(())
    }
}

/// Write `result`'s rewritten subject and body into the surface at `root`.
///
/// Subject: field value, then one input notification. Body: escaped HTML with
/// newlines as `<br>`, then one input notification. Empty rewrites are not written.
/// The host page is expected to observe the input notification; nothing here checks
/// that it did.
pub fn write_back(tree: &mut dyn SurfaceTree, root: NodeId, result: &AnalysisResult) -> BridgeResult<()> {
    let body = resolve(&*tree, root, FieldKind::Body).ok_or(DiscoveryFailure::MissingBody)?;

    if !result.rewritten_subject.is_empty() {
        match resolve(&*tree, root, FieldKind::Subject) {
            Some(subject) => {
                tree.set_value(subject, &result.rewritten_subject);
                tree.dispatch_input(subject);
            }
            None => warn!(
                target: "coldiq::bridge",
                error = %DiscoveryFailure::MissingSubject,
                "rewritten subject not written"
            ),
        }
    }

    if !result.rewritten_body.is_empty() {
        tree.set_inner_html(body, &text_to_html(&result.rewritten_body));
        tree.dispatch_input(body);
    }
    Ok(())
}
