//! Integration test: discovery and idempotent injection driven by the watcher.
//!
//! ## Scenario
//! 1. A page with one pop-out compose window is loaded into a `DomTree`.
//! 2. The agent starts; nothing is injected until the 2 s initial scan fires.
//! 3. Repeated scans never add a second control.
//! 4. A second compose window appears; a burst of mutations produces one scan that
//!    injects into it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coldiq_bridge::tree::{find_all, find_first, has_class};
use coldiq_bridge::{
    resolve, Agent, AnalysisOrchestrator, DomTree, FieldKind, MemoryClipboard, NodeId, SurfaceTree, CONTROL_CLASS,
    PANEL_CLASS,
};
use coldiq_core::{AgentConfig, AnalysisApi, AnalysisRequest, AnalysisResult, ApiError, InMemoryTokenStore};

const COMPOSE: &str = r#"
    <div class="nH Hd" role="dialog">
      <input name="subjectbox" value="Intro">
      <div aria-label="Message Body" contenteditable="true">Hello there</div>
      <table><tbody><tr class="btC"><td class="gU"><div class="T-I aoO" role="button">Send</div></td></tr></tbody></table>
    </div>"#;

struct NeverCalled(AtomicUsize);

#[async_trait]
impl AnalysisApi for NeverCalled {
    async fn analyze(&self, _request: &AnalysisRequest, _token: &str) -> Result<AnalysisResult, ApiError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Err(ApiError::new("not expected"))
    }
}

fn is_control(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    has_class(tree, node, CONTROL_CLASS)
}

fn is_panel(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    has_class(tree, node, PANEL_CLASS)
}

fn is_slot(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    tree.attr(node, "id").as_deref() == Some("slot")
}

fn agent_for(html: &str) -> Agent<DomTree> {
    let config = AgentConfig::default();
    let orchestrator = AnalysisOrchestrator::new(
        Arc::new(NeverCalled(AtomicUsize::new(0))),
        Arc::new(InMemoryTokenStore::new()),
        Arc::new(MemoryClipboard::new()),
        config.token_key.clone(),
    );
    Agent::new(DomTree::from_html(html), orchestrator, &config)
}

fn control_count(agent: &Agent<DomTree>) -> usize {
    let tree = agent.tree().lock().unwrap();
    find_all(&*tree, tree.body(), is_control).len()
}

#[test]
fn repeated_scans_inject_exactly_once() {
    let agent = agent_for(COMPOSE);
    let first = agent.scan_now();
    assert_eq!(first.injected, 1);

    for _ in 0..10 {
        let report = agent.scan_now();
        assert_eq!(report.injected, 0);
        assert_eq!(report.already_injected, 1);
    }

    let tree = agent.tree().lock().unwrap();
    assert_eq!(find_all(&*tree, tree.body(), is_control).len(), 1);
    assert_eq!(find_all(&*tree, tree.body(), is_panel).len(), 1);

    // The body field still resolves to the host editor, not to anything injected.
    let injector = agent.injector().lock().unwrap();
    let root = injector.controls()[0].surface.root;
    let body = resolve(&*tree, root, FieldKind::Body).unwrap();
    assert_eq!(tree.rendered_text(body), "Hello there");
}

#[tokio::test(start_paused = true)]
async fn watcher_drives_initial_and_settled_scans() {
    let page = format!(r#"{}<div id="slot"></div>"#, COMPOSE);
    let mut agent = agent_for(&page);
    agent.start();
    assert!(agent.is_running());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(control_count(&agent), 0);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(control_count(&agent), 1);

    {
        let mut tree = agent.tree().lock().unwrap();
        let slot = find_first(&*tree, tree.body(), is_slot).unwrap();
        tree.set_inner_html(slot, COMPOSE);
    }
    for _ in 0..8 {
        agent.on_mutation();
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(control_count(&agent), 1);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(control_count(&agent), 2);
    assert_eq!(agent.injector().lock().unwrap().controls().len(), 2);

    agent.stop();
    assert!(!agent.is_running());
}

#[tokio::test(start_paused = true)]
async fn compose_shortcut_catches_new_window() {
    let mut agent = agent_for(r#"<div id="slot"></div>"#);
    agent.start();
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(control_count(&agent), 0);

    {
        let mut tree = agent.tree().lock().unwrap();
        let slot = find_first(&*tree, tree.body(), is_slot).unwrap();
        tree.set_inner_html(slot, COMPOSE);
    }
    agent.on_key("c");
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(control_count(&agent), 1);
}
