//! Integration test: full activation against a mock analysis server.
//!
//! ## Scenario
//! 1. A compose window with subject "Hi" and body "Hello" is scanned; one control is injected.
//! 2. A session token is stored under the configured key.
//! 3. Clicking the control posts `{subject: "Hi", body: "Hello"}` with the bearer token.
//! 4. The server answers 200 with score 82; the panel shows 82 and both copy buttons are enabled.
//! 5. Clicking "copy" on the subject puts the optimized subject on the clipboard.

use std::sync::Arc;
use std::time::Duration;

use coldiq_bridge::tree::{attr_is, find_all, find_first};
use coldiq_bridge::{
    Agent, AnalysisOrchestrator, DomTree, MemoryClipboard, NodeId, RenderState, SurfaceTree, PANEL_VISIBLE_CLASS,
};
use coldiq_core::{AgentConfig, HttpAnalysisClient, InMemoryTokenStore};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"
    <div class="nH Hd" role="dialog">
      <input name="subjectbox" value="Hi">
      <div aria-label="Message Body" contenteditable="true">Hello</div>
      <table><tbody><tr class="btC"><td class="gU"><div class="T-I aoO" role="button" data-tooltip="Send">Send</div></td></tr></tbody></table>
    </div>"#;

fn is_copy_button(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    attr_is(tree, node, "data-action", "copy")
}

fn is_subject_copy(tree: &dyn SurfaceTree, node: NodeId) -> bool {
    attr_is(tree, node, "data-copy", "subject")
}

#[tokio::test]
async fn activation_renders_successful_analysis() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/analysis/analyze"))
        .and(header("authorization", "Bearer session-tok"))
        .and(body_json(json!({"subject": "Hi", "body": "Hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "an-1",
            "analysis_score": 82,
            "estimated_open_rate": 41.5,
            "estimated_response_rate": 9.0,
            "strengths": ["Short"],
            "weaknesses": ["Vague ask"],
            "improvements": ["Name a time"],
            "key_insight": "Make the ask concrete",
            "rewritten_subject": "Quick question, Sam",
            "rewritten_body": "Hello Sam,\nDo you have 10 minutes on Thursday?",
            "created_at": "2026-01-05T10:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = AgentConfig {
        api_base_url: format!("{}/api", server.uri()),
        ..AgentConfig::default()
    };
    let clipboard = Arc::new(MemoryClipboard::new());
    let orchestrator = AnalysisOrchestrator::new(
        Arc::new(HttpAnalysisClient::new(config.api_base_url.clone(), Duration::from_secs(5))),
        Arc::new(InMemoryTokenStore::with_token(&config.token_key, "session-tok")),
        clipboard.clone(),
        config.token_key.clone(),
    );
    let agent = Agent::new(DomTree::from_html(PAGE), orchestrator, &config);

    let report = agent.scan_now();
    assert_eq!(report.injected, 1);
    let control = agent.injector().lock().unwrap().controls()[0].clone();

    let task = agent.on_click(control.control).expect("control click starts an analysis");
    task.await.unwrap();

    let state = control.panel.lock().unwrap().state().clone();
    let RenderState::Success(result) = &state else {
        panic!("expected success, got {:?}", state);
    };
    assert_eq!(result.score, 82);
    assert_eq!(result.id.as_deref(), Some("an-1"));

    let subject_copy = {
        let tree = agent.tree().lock().unwrap();
        assert!(tree.attr(control.panel_node, "class").unwrap().contains(PANEL_VISIBLE_CLASS));
        let content = tree.inner_html(control.content);
        assert!(content.contains(">82<"));
        assert!(content.contains("#a3e635"));
        assert!(content.contains("Hello Sam,<br>Do you have 10 minutes on Thursday?"));

        let buttons = find_all(&*tree, control.content, is_copy_button);
        assert_eq!(buttons.len(), 2);
        for button in &buttons {
            assert_eq!(tree.attr(*button, "disabled"), None);
        }
        find_first(&*tree, control.content, is_subject_copy).unwrap()
    };

    let copy = agent.on_click(subject_copy).expect("copy click is routed");
    for _ in 0..100 {
        if clipboard.contents().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(clipboard.contents().as_deref(), Some("Quick question, Sam"));
    {
        let tree = agent.tree().lock().unwrap();
        let button = find_first(&*tree, control.content, is_subject_copy).unwrap();
        assert_eq!(tree.rendered_text(button), "Copied!");
    }
    copy.abort();
}
