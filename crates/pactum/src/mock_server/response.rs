//! Response building for the mock server.
//!
//! Generated interaction responses, mismatch diagnostics, timeouts and CORS
//! pre-flight answers.

use super::types::{InteractionDiagnostic, RequestOutcome};
use crate::interaction::GeneratedResponse;
use crate::matching::Mismatch;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::json;

pub(crate) const MISMATCH_HEADER: &str = "x-pactum-mismatch";

/// Build an HTTP response with the given status and body.
pub fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

/// Build an HTTP response with headers. Fails if a header name or value
/// cannot be sent.
pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Result<Response<Full<Bytes>>, hyper::http::Error> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder.body(Full::new(body.into()))
}

/// Plain-text 500 for responses the server failed to assemble.
fn internal_error(reason: &str) -> Response<Full<Bytes>> {
    build_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("pactum mock server error: {reason}"),
    )
}

pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec_pretty(value).unwrap_or_default();
    build_response_with_headers(
        status,
        [("Content-Type", "application/json"), (MISMATCH_HEADER, "true")],
        body,
    )
    .unwrap_or_else(|e| internal_error(&e.to_string()))
}

/// The response of a matched interaction.
pub fn generated_response(
    generated: &GeneratedResponse,
) -> Result<Response<Full<Bytes>>, hyper::http::Error> {
    let status = StatusCode::from_u16(generated.status)?;
    build_response_with_headers(
        status,
        generated.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        generated.body_bytes(),
    )
}

/// 500 for a matched interaction whose response could not be built.
pub fn unsendable_response(description: &str, error: &hyper::http::Error) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &json!({
            "error": format!("response of interaction '{description}' could not be sent: {error}"),
        }),
    )
}

/// 500 carrying the reason nothing matched.
pub fn mismatch_response(outcome: &RequestOutcome) -> Response<Full<Bytes>> {
    let body = match outcome {
        RequestOutcome::Mismatched {
            best_candidate,
            mismatches,
        } => json!({
            "error": "Request did not match the closest interaction",
            "bestCandidate": best_candidate,
            "mismatches": mismatches,
        }),
        RequestOutcome::Unexpected { diagnostics } => unexpected_body(diagnostics),
        other => json!({ "error": "Request was not matched", "outcome": other }),
    };
    json_response(StatusCode::INTERNAL_SERVER_ERROR, &body)
}

fn unexpected_body(diagnostics: &[InteractionDiagnostic]) -> serde_json::Value {
    let message = if diagnostics.is_empty() {
        "No interactions are registered"
    } else {
        "No interaction matched the request method and path"
    };
    json!({ "error": message, "interactions": diagnostics })
}

pub fn timeout_response(mismatch: &Mismatch) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::REQUEST_TIMEOUT,
        &json!({ "error": mismatch.reason, "mismatches": [mismatch] }),
    )
}

/// Permissive answer to a CORS pre-flight request.
pub fn preflight_response(origin: Option<&str>, requested_headers: Option<&str>) -> Response<Full<Bytes>> {
    build_response_with_headers(
        StatusCode::NO_CONTENT,
        [
            ("Access-Control-Allow-Origin", origin.unwrap_or("*")),
            (
                "Access-Control-Allow-Methods",
                "GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS",
            ),
            ("Access-Control-Allow-Headers", requested_headers.unwrap_or("*")),
            ("Access-Control-Allow-Credentials", "true"),
        ],
        Bytes::new(),
    )
    .unwrap_or_else(|e| internal_error(&e.to_string()))
}
