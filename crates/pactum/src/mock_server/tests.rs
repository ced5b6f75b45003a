//! Tests for the mock server module.
//!
//! This module contains tests for:
//! - Interaction selection and outcome recording
//! - MockServer lifecycle (start, stop, verify)
//! - Request timeouts, shutdown draining and CORS pre-flight handling

use super::core::MockServerState;
use super::*;
use crate::error::ConfigurationError;
use crate::interaction::{Interaction, InteractionRegistry, RequestPattern, ResponsePattern};
use crate::matchers::*;
use crate::matching::{HttpRequest, MismatchKind};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_test::traced_test;

fn get_items() -> Interaction {
    let mut response = ResponsePattern::new(200);
    response.body = Some(Pattern::object([("items", array_min_like(integer(1), 1))]));
    let mut request = RequestPattern::new("GET", "/items");
    request
        .headers
        .insert("Accept".into(), Pattern::from("application/json"));
    Interaction::new("a request for items", request, response)
}

fn create_item() -> Interaction {
    let mut request = RequestPattern::new("POST", "/items");
    request.body = Some(Pattern::object([("name", like("widget"))]));
    let mut response = ResponsePattern::new(201);
    response.body = Some(Pattern::object([("id", integer(42))]));
    Interaction::new("a request to create an item", request, response)
}

fn registry(interactions: Vec<Interaction>) -> InteractionRegistry {
    let mut registry = InteractionRegistry::new();
    for interaction in interactions {
        registry.register(interaction).unwrap();
    }
    registry
}

fn state(interactions: Vec<Interaction>) -> MockServerState {
    MockServerState::new("web", "api", registry(interactions), false)
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn test_first_full_match_wins() {
    let mut second = get_items();
    second.description = "items again".into();
    let state = state(vec![get_items(), second]);
    let request = HttpRequest::new("GET", "/items").with_header("accept", "application/json");

    assert_eq!(
        state.evaluate(&request),
        RequestOutcome::Matched { interaction: 0 }
    );
    assert_eq!(state.matched_count(), 1);
}

#[test]
#[traced_test]
fn test_first_match_is_logged_once() {
    let state = state(vec![get_items()]);
    let request = HttpRequest::new("GET", "/items").with_header("Accept", "application/json");
    state.evaluate(&request);
    state.evaluate(&request);
    assert!(logs_contain("Interaction 'a request for items' matched for the first time"));
    logs_assert(|lines: &[&str]| {
        match lines.iter().filter(|l| l.contains("matched for the first time")).count() {
            1 => Ok(()),
            n => Err(format!("expected one first-match line, saw {n}")),
        }
    });
}

#[test]
fn test_best_candidate_has_fewest_mismatches() {
    let mut strict = create_item();
    strict.description = "strict create".into();
    strict
        .request
        .headers
        .insert("Authorization".into(), Pattern::from("Bearer 1"));
    let state = state(vec![strict, create_item()]);

    // Fails the body of both; the first also misses the header.
    let request = HttpRequest::new("POST", "/items")
        .with_header("content-type", "application/json")
        .with_body(r#"{"name": 7}"#);
    match state.evaluate(&request) {
        RequestOutcome::Mismatched {
            best_candidate,
            mismatches,
        } => {
            assert_eq!(best_candidate, 1);
            assert_eq!(mismatches.len(), 1);
            assert_eq!(mismatches[0].kind, MismatchKind::Body);
            assert_eq!(mismatches[0].path, "$.name");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(state.matched_count(), 0);
}

#[test]
fn test_unknown_route_lists_every_interaction() {
    let state = state(vec![get_items(), create_item()]);
    let outcome = state.evaluate(&HttpRequest::new("DELETE", "/items/1"));
    match &outcome {
        RequestOutcome::Unexpected { diagnostics } => {
            assert_eq!(diagnostics.len(), 2);
            assert_eq!(diagnostics[1].description, "a request to create an item");
            assert!(diagnostics
                .iter()
                .all(|d| d.mismatches.iter().any(|m| m.kind == MismatchKind::Method)));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn test_verification_attributes_mismatches_to_candidate() {
    let state = state(vec![get_items()]);
    let request = HttpRequest::new("GET", "/items");
    let outcome = state.evaluate(&request);
    state.record(&request, outcome);

    let report = state.verification();
    assert_eq!(report.unmatched_interactions.len(), 1);
    assert_eq!(report.unexpected_requests.len(), 1);
    let header = &report.unmatched_interactions[0].mismatches[0];
    assert_eq!(header.kind, MismatchKind::Header);
    assert_eq!(header.path, "Accept");
    assert!(state.pact().interactions.is_empty());
}

#[test]
fn test_preflight_only_when_enabled() {
    let request = HttpRequest::new("OPTIONS", "/items");
    let strict = MockServerState::new("web", "api", registry(vec![get_items()]), false);
    assert!(matches!(
        strict.evaluate(&request),
        RequestOutcome::Unexpected { .. }
    ));
    let cors = MockServerState::new("web", "api", registry(vec![get_items()]), true);
    assert_eq!(cors.evaluate(&request), RequestOutcome::Preflight);
}

// ============================================================================
// Lifecycle
// ============================================================================

fn config() -> MockServerConfig {
    MockServerConfig::new("web", "api")
}

#[tokio::test]
async fn test_serves_generated_response_and_verifies() {
    let mut server = MockServer::new(config(), registry(vec![get_items(), create_item()]));
    server.start().await.unwrap();
    assert_eq!(server.lifecycle(), ServerState::Listening);
    let url = server.url().unwrap();

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{url}/items"))
        .header("Accept", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({"items": [1]}));

    let response = client
        .post(format!("{url}/items"))
        .json(&serde_json::json!({"name": "gadget", "colour": "red"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    server.stop().await;
    server.verify().unwrap();
    assert_eq!(server.pact().interactions.len(), 2);
    assert!(server.mismatches().is_empty());
}

#[tokio::test]
async fn test_verify_before_stop_is_rejected() {
    let mut server = MockServer::new(config(), registry(vec![get_items()]));
    server.start().await.unwrap();
    match server.verify() {
        Err(MockServerError::Configuration(ConfigurationError::Lifecycle { state, .. })) => {
            assert_eq!(state, "listening")
        }
        other => panic!("unexpected result {other:?}"),
    }
    server.stop().await;
    server.stop().await;
    assert_eq!(server.lifecycle(), ServerState::Stopped);
    assert!(matches!(
        server.verify(),
        Err(MockServerError::Verification(_))
    ));
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let mut server = MockServer::new(config(), registry(vec![get_items()]));
    server.start().await.unwrap();
    assert!(matches!(
        server.start().await,
        Err(MockServerError::Configuration(_))
    ));
    server.stop().await;
}

#[tokio::test]
async fn test_bind_error_on_taken_port() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut server = MockServer::new(config().with_port(port), registry(vec![get_items()]));
    let err = server.start().await.unwrap_err();
    assert!(matches!(err, MockServerError::Bind { .. }));
    assert_eq!(server.lifecycle(), ServerState::Stopped);
}

#[tokio::test]
async fn test_unexpected_request_is_500_and_reported() {
    let mut server = MockServer::new(config(), registry(vec![get_items()]));
    server.start().await.unwrap();
    let url = server.url().unwrap();

    let response = reqwest::get(format!("{url}/nowhere")).await.unwrap();
    assert_eq!(response.status(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["interactions"][0]["description"], "a request for items");

    server.stop().await;
    let err = server.verify().unwrap_err();
    let report = err.to_string();
    assert!(report.contains("GET /nowhere"));
    assert!(report.contains("a request for items"));
}

#[tokio::test]
async fn test_slow_body_times_out_with_408() {
    let config = config().with_request_timeout(Duration::from_millis(200));
    let mut server = MockServer::new(config, registry(vec![create_item()]));
    let addr = server.start().await.unwrap();

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"POST /items HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 64\r\n\r\n{\"name\"")
        .await
        .unwrap();
    let mut buffer = vec![0u8; 1024];
    let read = stream.read(&mut buffer).await.unwrap();
    let head = String::from_utf8_lossy(&buffer[..read]);
    assert!(head.starts_with("HTTP/1.1 408"), "got {head}");
    drop(stream);

    server.stop().await;
    let err = server.verify().unwrap_err();
    match err {
        MockServerError::Verification(report) => {
            assert_eq!(report.timeouts.len(), 1);
            assert_eq!(report.unmatched_interactions[0].mismatches.len(), 1);
            assert_eq!(
                report.unmatched_interactions[0].mismatches[0].kind,
                MismatchKind::Request
            );
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_stalled_request_head_is_a_timeout() {
    let config = config().with_request_timeout(Duration::from_millis(200));
    let mut server = MockServer::new(config, registry(vec![get_items(), create_item()]));
    let addr = server.start().await.unwrap();

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"POST /items HTTP/1.1\r\nHost: localhost\r\n")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    // an idle keep-alive connection is not a failed request
    let _idle = tokio::net::TcpStream::connect(addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    server.stop().await;
    drop(stream);
    match server.verify().unwrap_err() {
        MockServerError::Verification(report) => {
            assert_eq!(report.timeouts.len(), 1);
            assert_eq!(report.timeouts[0].method, "POST");
            assert_eq!(report.timeouts[0].path, "/items");
            let create = report
                .unmatched_interactions
                .iter()
                .find(|u| u.description == "a request to create an item")
                .unwrap();
            assert_eq!(create.mismatches.len(), 1);
            assert_eq!(create.mismatches[0].path, "headers");
            assert!(report.to_string().contains("while reading the headers"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_shutdown_timeout_counts_incomplete_requests() {
    let config = config().with_shutdown_timeout(Duration::from_millis(200));
    let mut server = MockServer::new(config, registry(vec![create_item()]));
    let addr = server.start().await.unwrap();

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"POST /items HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 64\r\n\r\n{\"name\"")
        .await
        .unwrap();
    for _ in 0..50 {
        if server.in_flight() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.in_flight(), 1);

    let started = std::time::Instant::now();
    server.stop().await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(200), "stop took {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "stop took {elapsed:?}");
    assert_eq!(server.lifecycle(), ServerState::Stopped);
    assert_eq!(server.in_flight(), 0);

    match server.verify().unwrap_err() {
        MockServerError::Verification(report) => {
            assert_eq!(report.incomplete, 1);
            assert!(report.timeouts.is_empty());
            assert!(report.to_string().contains("incomplete requests: 1"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    drop(stream);
}

#[test]
fn test_unsendable_response_header_is_rejected_at_registration() {
    let mut bad = Interaction::new(
        "a request for a bad header",
        RequestPattern::new("GET", "/bad"),
        ResponsePattern::new(201),
    );
    bad.response
        .headers
        .insert("X-Bad".into(), s("line1\nline2"));
    let err = InteractionRegistry::new().register(bad).unwrap_err();
    assert!(matches!(
        err,
        crate::Error::Configuration(ConfigurationError::InvalidInteraction { .. })
    ));
}

#[tokio::test]
async fn test_cors_preflight_is_not_a_mismatch() {
    let mut server = MockServer::new(config().with_cors(true), registry(vec![get_items()]));
    server.start().await.unwrap();
    let url = server.url().unwrap();

    let client = reqwest::Client::new();
    let response = client
        .request(reqwest::Method::OPTIONS, format!("{url}/items"))
        .header("Origin", "http://app.test")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://app.test"
    );
    client
        .get(format!("{url}/items"))
        .header("Accept", "application/json")
        .send()
        .await
        .unwrap();

    server.stop().await;
    server.verify().unwrap();
}
