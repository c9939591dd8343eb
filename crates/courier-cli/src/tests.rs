//! End-to-end orchestration tests against a mock API server.

use httpmock::prelude::*;
use serde_json::json;

use courier_slack::ApiClient;

use crate::descriptor::{resolve, Descriptor, ResolvedRequest};
use crate::orchestrate::run_send;
use crate::output::emit_report;

fn request_from(descriptor_json: &str) -> ResolvedRequest {
    let descriptor: Descriptor =
        serde_json::from_str(descriptor_json).expect("descriptor should parse");
    resolve(descriptor, &|_| None).expect("descriptor should resolve")
}

#[tokio::test]
async fn functional_create_thread_sends_the_lead_block_then_the_threaded_remainder() {
    let server = MockServer::start();
    let lead = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"text\":\"three part update\"");
        then.status(200)
            .json_body(json!({ "ok": true, "channel": "C1", "ts": "7.7" }));
    });
    let remainder = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"thread_ts\":\"7.7\"");
        then.status(200)
            .json_body(json!({ "ok": true, "channel": "C1", "ts": "7.8" }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/chat.getPermalink");
        then.status(200)
            .json_body(json!({ "ok": true, "permalink": "https://acme.slack.com/p77" }));
    });

    let request = request_from(
        r#"{ "source": { "credential": "t" },
             "params": {
                "channel": "C1",
                "create_thread": "true",
                "text": "three part update",
                "blocks": [
                    { "header": { "text": "lead" } },
                    { "section": { "text": "detail one" } },
                    { "section": { "text": "detail two" } }
                ]
             } }"#,
    );
    let client = ApiClient::new(&server.base_url(), &request.credential).unwrap();
    let report = run_send(&client, &request).await.expect("threaded send");

    assert_eq!(lead.calls(), 1);
    assert_eq!(remainder.calls(), 1);
    assert_eq!(report.primary.ts.as_deref(), Some("7.7"));
    assert_eq!(report.block_count, 3);
}

#[tokio::test]
async fn functional_single_block_create_thread_is_a_plain_send() {
    let server = MockServer::start();
    let post = server.mock(|when, then| {
        when.method(POST).path("/chat.postMessage");
        then.status(200)
            .json_body(json!({ "ok": true, "channel": "C1", "ts": "9.9" }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/chat.getPermalink");
        then.status(200)
            .json_body(json!({ "ok": true, "permalink": "https://acme.slack.com/p99" }));
    });

    let request = request_from(
        r#"{ "source": { "credential": "t" },
             "params": {
                "channel": "C1",
                "create_thread": true,
                "blocks": [{ "section": { "text": "only one" } }]
             } }"#,
    );
    let client = ApiClient::new(&server.base_url(), &request.credential).unwrap();
    let report = run_send(&client, &request).await.expect("plain send");

    assert_eq!(post.calls(), 1);
    assert_eq!(report.primary.ts.as_deref(), Some("9.9"));
}

#[tokio::test]
async fn functional_crosspost_failures_are_isolated_per_channel() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"channel\":\"#main\"");
        then.status(200)
            .json_body(json!({ "ok": true, "channel": "#main", "ts": "1.1" }));
    });
    let broken = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"channel\":\"#a\"");
        then.status(200)
            .json_body(json!({ "ok": false, "error": "channel_not_found" }));
    });
    let second = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"channel\":\"#b\"");
        then.status(200)
            .json_body(json!({ "ok": true, "channel": "#b", "ts": "3.3" }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/chat.getPermalink");
        then.status(200)
            .json_body(json!({ "ok": true, "permalink": "https://acme.slack.com/p11" }));
    });

    let request = request_from(
        r##"{ "source": { "credential": "t" },
             "params": {
                "channel": "#main",
                "blocks": [{ "section": { "text": "hi" } }],
                "crosspost": { "channels": ["#a", "#b"] }
             } }"##,
    );
    let client = ApiClient::new(&server.base_url(), &request.credential).unwrap();
    let report = run_send(&client, &request)
        .await
        .expect("crosspost failures must not fail the run by default");

    assert_eq!(broken.calls(), 1, "fatal rejection, single attempt");
    assert_eq!(second.calls(), 1);
    assert_eq!(report.crossposts.len(), 2);
    assert_eq!(report.crossposts[0].channel, "#a");
    let failure = report.crossposts[0].result.as_ref().unwrap_err();
    assert!(failure.contains("channel_not_found"));
    let delivered = report.crossposts[1].result.as_ref().unwrap();
    assert_eq!(delivered.ts.as_deref(), Some("3.3"));
}

#[tokio::test]
async fn functional_crosspost_back_link_reaches_the_wire() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"channel\":\"#main\"");
        then.status(200)
            .json_body(json!({ "ok": true, "channel": "#main", "ts": "1.1" }));
    });
    let linked = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"channel\":\"#b\"")
            .body_includes("<https://acme.slack.com/p11|original message>");
        then.status(200)
            .json_body(json!({ "ok": true, "channel": "#b", "ts": "3.3" }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/chat.getPermalink");
        then.status(200)
            .json_body(json!({ "ok": true, "permalink": "https://acme.slack.com/p11" }));
    });

    let request = request_from(
        r##"{ "source": { "credential": "t" },
             "params": {
                "channel": "#main",
                "blocks": [{ "section": { "text": "hi" } }],
                "crosspost": { "channel": "#b" }
             } }"##,
    );
    let client = ApiClient::new(&server.base_url(), &request.credential).unwrap();
    let report = run_send(&client, &request).await.expect("crosspost run");

    assert_eq!(linked.calls(), 1, "the back-link must appear in the body");
    assert!(report.crossposts[0].result.is_ok());
}

#[tokio::test]
async fn functional_fail_on_error_flips_the_result_but_still_attempts_every_channel() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"channel\":\"#main\"");
        then.status(200)
            .json_body(json!({ "ok": true, "channel": "#main", "ts": "1.1" }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"channel\":\"#a\"");
        then.status(200)
            .json_body(json!({ "ok": false, "error": "not_in_channel" }));
    });
    let second = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .body_includes("\"channel\":\"#b\"");
        then.status(200)
            .json_body(json!({ "ok": true, "channel": "#b", "ts": "3.3" }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/chat.getPermalink");
        then.status(200)
            .json_body(json!({ "ok": true, "permalink": "https://acme.slack.com/p11" }));
    });

    let request = request_from(
        r##"{ "source": { "credential": "t" },
             "params": {
                "channel": "#main",
                "blocks": [{ "section": { "text": "hi" } }],
                "crosspost": { "channels": ["#a", "#b"], "fail_on_error": true }
             } }"##,
    );
    let client = ApiClient::new(&server.base_url(), &request.credential).unwrap();
    let error = run_send(&client, &request)
        .await
        .expect_err("fail_on_error must surface crosspost failures");

    assert_eq!(second.calls(), 1, "later channels are still attempted");
    assert!(error.to_string().contains("1 of 2"));
}

#[tokio::test]
async fn functional_dry_run_descriptor_touches_no_network_and_emits_a_version() {
    let server = MockServer::start();
    let any_post = server.mock(|when, then| {
        when.method(POST);
        then.status(200).json_body(json!({ "ok": true }));
    });

    let request = request_from(
        r##"{ "source": { "credential": "t" },
             "params": { "channel": "#c", "dry_run": "true",
                         "blocks": [{ "section": { "type": "text",
                             "text": { "type": "plain_text", "text": "hi" } } }] } }"##,
    );
    assert!(request.dry_run);
    let client = ApiClient::new(&server.base_url(), &request.credential).unwrap();
    let report = run_send(&client, &request).await.expect("dry run succeeds");

    assert_eq!(any_post.calls(), 0, "a dry run must not call out");

    let out = tempfile::NamedTempFile::new().unwrap();
    emit_report(&report, Some(out.path())).unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.path()).unwrap()).unwrap();
    assert!(written["version"]["timestamp"].is_string());
    assert!(!written["version"]["timestamp"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn functional_debug_flag_captures_the_payload_without_changing_the_send() {
    let server = MockServer::start();
    let post = server.mock(|when, then| {
        when.method(POST).path("/chat.postMessage");
        then.status(200)
            .json_body(json!({ "ok": true, "channel": "C1", "ts": "4.4" }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/chat.getPermalink");
        then.status(200)
            .json_body(json!({ "ok": true, "permalink": "https://acme.slack.com/p44" }));
    });

    let request = request_from(
        r#"{ "source": { "credential": "t" },
             "params": { "channel": "C1", "debug": true,
                         "blocks": [{ "section": { "text": "hi" } }] } }"#,
    );
    let client = ApiClient::new(&server.base_url(), &request.credential).unwrap();
    let report = run_send(&client, &request).await.expect("send succeeds");

    assert_eq!(post.calls(), 1);
    assert_eq!(report.primary.ts.as_deref(), Some("4.4"));
}
