//! Request handling for the mock server.
//!
//! Reads the request within the request timeout, matches it against the
//! registered interactions and answers with the generated response or a 500
//! carrying the mismatch detail. Requests whose head never completed are
//! recorded from the bytes that did arrive.

use super::core::MockServerState;
use super::response::{
    generated_response, json_response, mismatch_response, preflight_response, timeout_response,
    unsendable_response,
};
use super::types::RequestOutcome;
use crate::matching::{parse_query, HeaderMap, HttpRequest, Mismatch, MismatchKind};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Handle one request to the mock server.
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<MockServerState>,
    request_timeout: Duration,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let _in_flight = state.begin_request();
    let (parts, body) = req.into_parts();

    let raw_path = parts.uri.path();
    let path = urlencoding::decode(raw_path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| raw_path.to_string());
    let mut headers = HeaderMap::new();
    for (name, value) in parts.headers.iter() {
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    let mut request = HttpRequest {
        method: parts.method.to_string(),
        path,
        query: parse_query(parts.uri.query()),
        headers,
        body: Bytes::new(),
    };

    match tokio::time::timeout(request_timeout, body.collect()).await {
        Ok(Ok(collected)) => request.body = collected.to_bytes(),
        Ok(Err(e)) => {
            let mismatch = Mismatch::new(
                MismatchKind::Request,
                "body",
                "a readable request body",
                None,
                format!("failed to read request body: {e}"),
            );
            warn!("{} {}: {}", request.method, request.path, mismatch.reason);
            let response = json_response(
                StatusCode::BAD_REQUEST,
                &json!({ "error": mismatch.reason, "mismatches": [&mismatch] }),
            );
            let best_candidate = state.route_candidate(&request);
            state.record(&request, RequestOutcome::Failed { best_candidate, mismatch });
            return Ok(response);
        }
        Err(_) => {
            let mismatch = Mismatch::new(
                MismatchKind::Request,
                "body",
                format!("a request body within {}ms", request_timeout.as_millis()),
                None,
                format!(
                    "request timed out after {}ms while reading the body",
                    request_timeout.as_millis()
                ),
            );
            warn!("{} {}: {}", request.method, request.path, mismatch.reason);
            let response = timeout_response(&mismatch);
            let best_candidate = state.route_candidate(&request);
            state.record(&request, RequestOutcome::Failed { best_candidate, mismatch });
            return Ok(response);
        }
    }

    let outcome = state.evaluate(&request);
    let response = match &outcome {
        RequestOutcome::Matched { interaction } => {
            let index = *interaction;
            let description = state.description(index).unwrap_or_default().to_string();
            debug!(
                "{} {} matched interaction '{}'",
                request.method, request.path, description
            );
            let built = state
                .generate(index)
                .map(|generated| generated_response(&generated));
            match built {
                Some(Ok(response)) => response,
                Some(Err(e)) => {
                    error!(
                        "Response of interaction '{}' could not be sent: {}",
                        description, e
                    );
                    let mismatch = Mismatch::new(
                        MismatchKind::Request,
                        "response",
                        "a sendable response",
                        None,
                        format!("response of interaction '{description}' could not be sent: {e}"),
                    );
                    state.record(
                        &request,
                        RequestOutcome::Failed {
                            best_candidate: Some(index),
                            mismatch,
                        },
                    );
                    return Ok(unsendable_response(&description, &e));
                }
                None => json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &json!({ "error": format!("unknown interaction {index}") }),
                ),
            }
        }
        RequestOutcome::Preflight => {
            debug!("Answering CORS pre-flight for {}", request.path);
            preflight_response(
                request.header("origin").as_deref(),
                request.header("access-control-request-headers").as_deref(),
            )
        }
        RequestOutcome::Mismatched {
            best_candidate,
            mismatches,
        } => {
            warn!(
                "{} {} did not match interaction '{}' ({} mismatches)",
                request.method,
                request.path,
                state.description(*best_candidate).unwrap_or_default(),
                mismatches.len()
            );
            for mismatch in mismatches {
                debug!("  {}", mismatch);
            }
            mismatch_response(&outcome)
        }
        RequestOutcome::Unexpected { .. } | RequestOutcome::Failed { .. } => {
            warn!(
                "Unexpected request {} {}: no interaction matches the method and path",
                request.method, request.path
            );
            mismatch_response(&outcome)
        }
    };

    state.record(&request, outcome);
    Ok(response)
}

/// Record a request whose head was not received within the request timeout.
///
/// `head` holds the bytes hyper read before giving up; the request line and
/// any complete header lines are recovered from it.
pub(crate) fn record_stalled_head(state: &MockServerState, head: &[u8], request_timeout: Duration) {
    let request = partial_request(head);
    let mismatch = Mismatch::new(
        MismatchKind::Request,
        "headers",
        format!("request headers within {}ms", request_timeout.as_millis()),
        None,
        format!(
            "request timed out after {}ms while reading the headers",
            request_timeout.as_millis()
        ),
    );
    warn!("{} {}: {}", request.method, request.path, mismatch.reason);
    let best_candidate = state.route_candidate(&request);
    state.record(&request, RequestOutcome::Failed { best_candidate, mismatch });
}

fn partial_request(head: &[u8]) -> HttpRequest {
    let text = String::from_utf8_lossy(head);
    let mut lines = text.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default();
    let (raw_path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };
    let path = urlencoding::decode(raw_path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| raw_path.to_string());

    let mut headers = HeaderMap::new();
    // the last segment may be a half-received line
    let complete: Vec<&str> = lines.collect();
    let complete = &complete[..complete.len().saturating_sub(1)];
    for line in complete {
        if let Some((name, value)) = line.split_once(':') {
            headers
                .entry(name.trim().to_ascii_lowercase())
                .or_default()
                .push(value.trim().to_string());
        }
    }

    HttpRequest {
        method,
        path,
        query: parse_query(query),
        headers,
        body: Bytes::new(),
    }
}
