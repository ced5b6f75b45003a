//! Contract files read back re-evaluate like the interactions they came from.

use assert_json_diff::assert_json_include;
use bytes::Bytes;
use pactum::matchers::*;
use pactum::matching::{parse_query_string, HttpRequest, HttpResponse};
use pactum::{InteractionBuilder, InteractionRegistry, Pact, PactReader, PactWriter, WriteMode};
use serde_json::json;
use tempfile::TempDir;

fn interaction() -> pactum::Interaction {
    InteractionBuilder::new()
        .given_with_params("User foo exists", json!({"id": "foo"}))
        .upon_receiving("A request to do a foo")
        .with_request("POST", regex("/foobar", "/foo[a-z]+"), |req| {
            req.header("Authorization", like("Bearer 1234"))
                .query(
                    "baz",
                    [
                        regex("bar", "[a-z]+"),
                        regex("bat", "[a-z]+"),
                        regex("baz", "[a-z]+"),
                    ],
                )
                .json_body(Pattern::object([
                    ("id", like(27)),
                    ("name", from_provider_state("${name}", "billy")),
                    (
                        "datetime",
                        datetime_generated("2020-01-01T08:00:45", "yyyy-MM-dd'T'HH:mm:ss"),
                    ),
                    ("tags", array_min_like(Pattern::object([("label", like("x"))]), 1)),
                ]))
        })
        .will_respond_with(200, |res| {
            res.json_body(Pattern::object([
                ("id", integer(12)),
                ("accountBalance", decimal(123.76)),
                ("itemsMinMax", array_min_max_like(27, 3, 5)),
                (
                    "arrayContaining",
                    array_containing([like("string"), integer(1)]),
                ),
            ]))
        })
        .build()
        .unwrap()
}

fn request() -> HttpRequest {
    HttpRequest::new("POST", "/foobar")
        .with_query(parse_query_string("baz=bat&baz=foo&baz=something"))
        .with_header("content-type", "application/json")
        .with_header("authorization", "Bearer 9999")
        .with_body(
            r#"{"id": 3, "name": "billy", "datetime": "2021-01-01T08:00:45", "tags": [{"label": "a"}, {"label": "b"}]}"#,
        )
}

fn response() -> HttpResponse {
    let mut response = HttpResponse {
        status: 200,
        body: Bytes::from(
            r#"{"id": 99, "accountBalance": 1.5, "itemsMinMax": [1, 2, 3, 4], "arrayContaining": [5, "x"]}"#,
        ),
        ..Default::default()
    };
    response
        .headers
        .insert("Content-Type".into(), vec!["application/json".into()]);
    response
}

#[test]
fn test_written_pact_reevaluates_identically() {
    let mut registry = InteractionRegistry::new();
    registry.register(interaction()).unwrap();
    let original = registry.get(0).unwrap().clone();

    let mut pact = Pact::new("web", "api");
    pact.interactions.push(original.clone());

    let dir = TempDir::new().unwrap();
    let path = PactWriter::new(dir.path(), WriteMode::Overwrite)
        .write(&pact)
        .unwrap();
    let read = PactReader::read(&path).unwrap();
    let restored = &read.interactions[0];

    let request = request();
    let response = response();
    assert!(original.request.matches(&request).ok());
    assert!(original.response.matches(&response).ok());
    assert_eq!(
        restored.request.matches(&request),
        original.request.matches(&request)
    );
    assert_eq!(
        restored.response.matches(&response),
        original.response.matches(&response)
    );

    let reordered = request
        .clone()
        .with_query(parse_query_string("baz=BAT&baz=foo&baz=something"));
    let before = original.request.matches(&reordered);
    let after = restored.request.matches(&reordered);
    assert!(!before.ok());
    assert_eq!(before, after);

    let registry = InteractionRegistry::from_pact(&read).unwrap();
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_document_shape() {
    let mut pact = Pact::new("web", "api");
    pact.interactions.push(interaction());
    let document: serde_json::Value = serde_json::from_str(&pact.to_json().unwrap()).unwrap();

    assert_json_include!(
        actual: document,
        expected: json!({
            "consumer": {"name": "web"},
            "provider": {"name": "api"},
            "metadata": {"pactSpecification": {"version": "4.0"}},
            "interactions": [{
                "type": "Synchronous/HTTP",
                "description": "A request to do a foo",
                "providerStates": [{"name": "User foo exists", "params": {"id": "foo"}}],
                "request": {
                    "method": "POST",
                    "path": "/foobar",
                    "query": {"baz": ["bar", "bat", "baz"]},
                    "body": {"contentType": "application/json"},
                    "matchingRules": {
                        "path": {"combine": "AND", "matchers": [{"match": "regex", "regex": "/foo[a-z]+"}]},
                        "header": {"Authorization": {"matchers": [{"match": "type"}]}},
                        "query": {"baz": {"matchers": [{"match": "regex", "regex": "[a-z]+"}]}},
                        "body": {
                            "$.id": {"matchers": [{"match": "type"}]},
                            "$.tags": {"matchers": [{"match": "type", "min": 1}]},
                            "$.tags[*].label": {"matchers": [{"match": "type"}]}
                        }
                    }
                },
                "response": {
                    "status": 200,
                    "matchingRules": {
                        "body": {
                            "$.id": {"matchers": [{"match": "integer"}]},
                            "$.accountBalance": {"matchers": [{"match": "decimal"}]},
                            "$.itemsMinMax": {"matchers": [{"match": "type", "min": 3, "max": 5}]}
                        }
                    }
                }
            }]
        })
    );
}
