//! Integration test: the analyze cycle against scripted analysis backends.
//!
//! Covers the validation gate, the missing-token path, error classification of
//! server messages, write-back through the panel's apply button, and the guard that
//! drops a slow response once a newer activation has started.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use coldiq_bridge::tree::{attr_is, find_first};
use coldiq_bridge::{
    resolve, ActivationOutcome, AnalysisOrchestrator, BridgeError, DomTree, ErrorKind, FieldKind, InjectedControl,
    Injector, MemoryClipboard, NodeId, RenderState, SurfaceTree, LOGIN_REQUIRED,
};
use coldiq_core::{
    AnalysisApi, AnalysisRequest, AnalysisResult, ApiError, InMemoryTokenStore, PanelLinks, TokenStore,
};
use tokio::sync::oneshot;

const TOKEN_KEY: &str = "coldiq_token";

fn compose(body: &str) -> String {
    format!(
        r#"<div class="nH Hd" role="dialog">
             <input name="subjectbox" value="Hi">
             <div aria-label="Message Body" contenteditable="true">{}</div>
             <table><tbody><tr class="btC"><td class="gU"></td></tr></tbody></table>
           </div>"#,
        body
    )
}

/// Returns a fixed outcome and records every request it sees.
struct ScriptedApi {
    outcome: Result<AnalysisResult, ApiError>,
    requests: Mutex<Vec<AnalysisRequest>>,
}

impl ScriptedApi {
    fn ok(result: AnalysisResult) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(result),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(ApiError::new(message).with_status(400)),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalysisApi for ScriptedApi {
    async fn analyze(&self, request: &AnalysisRequest, _token: &str) -> Result<AnalysisResult, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        self.outcome.clone()
    }
}

/// Each call waits for the next queued gate to be released by the test.
struct GatedApi {
    gates: Mutex<VecDeque<oneshot::Receiver<Result<AnalysisResult, ApiError>>>>,
    calls: AtomicUsize,
}

#[async_trait]
impl AnalysisApi for GatedApi {
    async fn analyze(&self, _request: &AnalysisRequest, _token: &str) -> Result<AnalysisResult, ApiError> {
        let gate = self.gates.lock().unwrap().pop_front();
        self.calls.fetch_add(1, Ordering::SeqCst);
        match gate {
            Some(rx) => rx.await.unwrap_or_else(|_| Err(ApiError::new("gate dropped"))),
            None => Err(ApiError::new("no gate queued")),
        }
    }
}

struct Fixture {
    tree: Arc<Mutex<DomTree>>,
    control: InjectedControl,
}

fn fixture(body: &str) -> Fixture {
    let mut tree = DomTree::from_html(&compose(body));
    let mut injector = Injector::new(PanelLinks::default());
    injector.scan(&mut tree);
    let control = injector.controls()[0].clone();
    Fixture {
        tree: Arc::new(Mutex::new(tree)),
        control,
    }
}

fn orchestrator(api: Arc<dyn AnalysisApi>, tokens: Arc<dyn TokenStore>) -> AnalysisOrchestrator {
    AnalysisOrchestrator::new(api, tokens, Arc::new(MemoryClipboard::new()), TOKEN_KEY)
}

fn with_token() -> Arc<dyn TokenStore> {
    Arc::new(InMemoryTokenStore::with_token(TOKEN_KEY, "tok"))
}

fn scored(score: i64) -> AnalysisResult {
    AnalysisResult {
        score,
        rewritten_subject: "S".into(),
        rewritten_body: "B\nC".into(),
        ..Default::default()
    }
}

fn state_of(control: &InjectedControl) -> RenderState {
    control.panel.lock().unwrap().state().clone()
}

#[tokio::test]
async fn blank_body_never_reaches_the_network() {
    let api = ScriptedApi::ok(scored(80));
    let orch = orchestrator(api.clone(), with_token());
    let f = fixture("   ");

    let err = orch.activate(&f.tree, &f.control).await.unwrap_err();
    assert!(matches!(err, BridgeError::EmptyBody));
    assert_eq!(api.calls(), 0);
    assert_eq!(state_of(&f.control), RenderState::Idle);
    let panel = f.control.panel.lock().unwrap();
    assert_eq!(panel.warning(), Some("Please write some email content first."));
    assert!(panel.is_visible());
}

#[tokio::test]
async fn blank_body_keeps_previous_success() {
    let api = ScriptedApi::ok(scored(80));
    let orch = orchestrator(api.clone(), with_token());
    let f = fixture("Hello");

    orch.activate(&f.tree, &f.control).await.unwrap();
    {
        let mut tree = f.tree.lock().unwrap();
        let body = resolve(&*tree, f.control.surface.root, FieldKind::Body).unwrap();
        tree.set_inner_html(body, "");
    }
    assert!(orch.activate(&f.tree, &f.control).await.is_err());
    assert_eq!(api.calls(), 1);
    assert_eq!(state_of(&f.control).result().map(|r| r.score), Some(80));
}

#[tokio::test]
async fn missing_token_is_unauthenticated_without_a_call() {
    let api = ScriptedApi::ok(scored(80));
    let orch = orchestrator(api.clone(), Arc::new(InMemoryTokenStore::new()));
    let f = fixture("Hello");

    let outcome = orch.activate(&f.tree, &f.control).await.unwrap();
    assert_eq!(
        outcome,
        ActivationOutcome::Completed(RenderState::Error {
            kind: ErrorKind::Unauthenticated,
            message: LOGIN_REQUIRED.to_string(),
        })
    );
    assert_eq!(api.calls(), 0);

    let tree = f.tree.lock().unwrap();
    assert!(tree.inner_html(f.control.content).contains("Log in to ColdIQ"));
}

#[tokio::test]
async fn server_messages_are_classified() {
    let cases = [
        ("Invalid token (401)", ErrorKind::Unauthenticated),
        ("monthly limit reached", ErrorKind::QuotaExceeded),
        ("server error", ErrorKind::Generic),
    ];
    for (message, expected) in cases {
        let api = ScriptedApi::failing(message);
        let orch = orchestrator(api.clone(), with_token());
        let f = fixture("Hello");

        orch.activate(&f.tree, &f.control).await.unwrap();
        match state_of(&f.control) {
            RenderState::Error { kind, message: shown } => {
                assert_eq!(kind, expected, "{}", message);
                assert_eq!(shown, message);
            }
            other => panic!("expected error state, got {:?}", other),
        }
        assert_eq!(api.calls(), 1);
    }
}

#[tokio::test]
async fn request_carries_surface_text() {
    let api = ScriptedApi::ok(scored(70));
    let orch = orchestrator(api.clone(), with_token());
    let f = fixture("Line one<br>Line two");

    orch.activate(&f.tree, &f.control).await.unwrap();
    let requests = api.requests.lock().unwrap();
    assert_eq!(requests[0], AnalysisRequest::new("Hi", "Line one\nLine two"));
}

fn is_apply(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    attr_is(tree, node, "data-action", "apply")
}

#[tokio::test(start_paused = true)]
async fn apply_writes_back_and_flashes() {
    let api = ScriptedApi::ok(scored(75));
    let orch = Arc::new(orchestrator(api, with_token()));
    let f = fixture("Hello");
    orch.activate(&f.tree, &f.control).await.unwrap();

    let task = {
        let (orch, tree, control) = (orch.clone(), f.tree.clone(), f.control.clone());
        tokio::spawn(async move { orch.apply(&tree, &control).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    {
        let tree = f.tree.lock().unwrap();
        let root = f.control.surface.root;
        let subject = resolve(&*tree, root, FieldKind::Subject).unwrap();
        let body = resolve(&*tree, root, FieldKind::Body).unwrap();
        assert_eq!(tree.value(subject).as_deref(), Some("S"));
        assert_eq!(tree.inner_html(body), "B<br>C");
        assert_eq!(tree.input_events_for(subject), 1);
        assert_eq!(tree.input_events_for(body), 1);

        let apply = find_first(&*tree, f.control.content, is_apply).unwrap();
        assert_eq!(tree.rendered_text(apply), "Applied!");
    }

    task.await.unwrap().unwrap();
    let tree = f.tree.lock().unwrap();
    let apply = find_first(&*tree, f.control.content, is_apply).unwrap();
    assert_eq!(tree.rendered_text(apply), "Apply to Email");
}

#[tokio::test]
async fn apply_without_result_is_rejected() {
    let orch = orchestrator(ScriptedApi::ok(scored(75)), with_token());
    let f = fixture("Hello");
    let err = orch.apply(&f.tree, &f.control).await.unwrap_err();
    assert!(matches!(err, BridgeError::NoResult));
}

#[tokio::test]
async fn stale_response_is_discarded() {
    let (first_tx, first_rx) = oneshot::channel();
    let (second_tx, second_rx) = oneshot::channel();
    let api = Arc::new(GatedApi {
        gates: Mutex::new(VecDeque::from([first_rx, second_rx])),
        calls: AtomicUsize::new(0),
    });
    let orch = Arc::new(orchestrator(api.clone(), with_token()));
    let f = fixture("Hello");

    let spawn_activation = || {
        let (orch, tree, control) = (orch.clone(), f.tree.clone(), f.control.clone());
        tokio::spawn(async move { orch.activate(&tree, &control).await })
    };

    let first = spawn_activation();
    while api.calls.load(Ordering::SeqCst) < 1 {
        tokio::task::yield_now().await;
    }
    let second = spawn_activation();
    while api.calls.load(Ordering::SeqCst) < 2 {
        tokio::task::yield_now().await;
    }

    second_tx.send(Ok(scored(90))).unwrap();
    let newer = second.await.unwrap().unwrap();
    assert!(matches!(newer, ActivationOutcome::Completed(RenderState::Success(ref r)) if r.score == 90));

    first_tx.send(Ok(scored(10))).unwrap();
    let older = first.await.unwrap().unwrap();
    assert_eq!(older, ActivationOutcome::Superseded);

    assert_eq!(state_of(&f.control).result().map(|r| r.score), Some(90));
    let tree = f.tree.lock().unwrap();
    assert!(tree.inner_html(f.control.content).contains(">90<"));
}
