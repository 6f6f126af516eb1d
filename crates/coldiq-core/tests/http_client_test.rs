//! Integration test: `HttpAnalysisClient` against a mock analysis server.
//!
//! Verifies the wire contract:
//! 1. POST to `/analysis/analyze` with JSON `{subject, body}` and a bearer token.
//! 2. A 2xx body is parsed into `AnalysisResult`.
//! 3. A failure body's `detail` (and optional `code`) becomes the `ApiError`.

use std::time::Duration;

use coldiq_core::{AnalysisApi, AnalysisRequest, HttpAnalysisClient};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpAnalysisClient {
    HttpAnalysisClient::new(server.uri(), Duration::from_secs(5))
}

#[tokio::test]
async fn posts_request_with_bearer_and_parses_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analysis/analyze"))
        .and(header("authorization", "Bearer tok-1"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"subject": "Hi", "body": "Hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "an-9",
            "analysis_score": 82,
            "estimated_open_rate": 44.0,
            "estimated_response_rate": 8.5,
            "strengths": ["Concise"],
            "weaknesses": [],
            "improvements": [],
            "key_insight": "Personalize the opener",
            "rewritten_subject": "Quick idea for you",
            "rewritten_body": "Hello\nThanks"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server)
        .analyze(&AnalysisRequest::new("Hi", "Hello"), "tok-1")
        .await
        .expect("analysis should succeed");

    assert_eq!(result.score, 82);
    assert_eq!(result.rewritten_subject, "Quick idea for you");
    assert_eq!(result.strengths, vec!["Concise".to_string()]);
}

#[tokio::test]
async fn failure_detail_becomes_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analysis/analyze"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "detail": "Monthly analysis limit reached (3). Please upgrade your plan."
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .analyze(&AnalysisRequest::new("Hi", "Hello"), "tok")
        .await
        .unwrap_err();

    assert_eq!(err.status, Some(403));
    assert!(err.message.contains("limit reached"));
    assert_eq!(err.code, None);
}

#[tokio::test]
async fn structured_code_is_captured() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analysis/analyze"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Token expired",
            "code": "token_expired"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .analyze(&AnalysisRequest::new("", "Hello"), "old")
        .await
        .unwrap_err();

    assert_eq!(err.message, "Token expired");
    assert_eq!(err.code.as_deref(), Some("token_expired"));
}

#[tokio::test]
async fn unparseable_failure_body_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analysis/analyze"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad gateway</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .analyze(&AnalysisRequest::new("", "Hello"), "tok")
        .await
        .unwrap_err();

    assert_eq!(err.message, "Analysis failed");
    assert_eq!(err.status, Some(502));
}

#[tokio::test]
async fn transport_failure_is_reported_without_status() {
    // Nothing listens on port 9 of the loopback interface.
    let client = HttpAnalysisClient::new("http://127.0.0.1:9/api", Duration::from_secs(2));
    let err = client
        .analyze(&AnalysisRequest::new("", "Hello"), "tok")
        .await
        .unwrap_err();

    assert_eq!(err.status, None);
    assert!(err.message.starts_with("Analysis failed"));
}
