//! HTTP server and one-shot identification tests

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::*;
use http_body_util::BodyExt;
use pedal_common::IdentificationResult;
use pedal_id::build_router;
use pedal_id::error::IDENTIFY_FAILED_MESSAGE;
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn root_route_serves_html() {
    let app = build_router(state_with(Arc::new(StubIdentifier::new(StubOutcome::Fail))));

    let response = app.oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.contains("text/html"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("/static/app.js"));
}

#[tokio::test]
async fn static_assets_have_content_types() {
    let app = build_router(state_with(Arc::new(StubIdentifier::new(StubOutcome::Fail))));

    let js = app.clone().oneshot(get("/static/app.js")).await.unwrap();
    assert_eq!(js.status(), StatusCode::OK);
    assert_eq!(js.headers()["content-type"], "application/javascript");

    let css = app.oneshot(get("/static/app.css")).await.unwrap();
    assert_eq!(css.status(), StatusCode::OK);
    assert_eq!(css.headers()["content-type"], "text/css");
}

#[tokio::test]
async fn health_reports_module_and_identifier() {
    let app = build_router(state_with(Arc::new(StubIdentifier::new(StubOutcome::Fail))));

    let (status, body) = json_body(app.oneshot(get("/health")).await.unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "pedal-id");
    assert_eq!(body["vision"]["model"], "stub");
    assert_eq!(body["vision"]["api_key_configured"], false);
    assert_eq!(body["active_sessions"], 0);
    assert!(body["started_at"].is_string());
    assert!(body.get("last_error").is_none());
}

#[tokio::test]
async fn identify_returns_result_report_and_view() {
    let app = build_router(state_with(Arc::new(StubIdentifier::new(StubOutcome::Result(
        sample_result(),
    )))));

    let (status, body) = json_body(
        app.oneshot(post_json(
            "/api/identify",
            json!({ "photoDataUri": PNG_DATA_URI }),
        ))
        .await
        .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["pedalIdentifications"].as_array().unwrap().len(), 3);
    assert_eq!(body["report"]["total"], 162.5);
    assert_eq!(body["report"]["formatted_total"], "$162.50");

    let chart = body["report"]["chart"].as_array().unwrap();
    assert_eq!(chart.len(), 1);
    assert_eq!(chart[0]["make"], "Boss");
    assert_eq!(chart[0]["percentage"], 100);

    assert_eq!(body["view"]["formattedTotal"], "$162.50");
    assert_eq!(body["view"]["cards"][1]["price"], "Price Unknown");
    assert_eq!(body["view"]["cards"][1]["advice"], "Buy If Cheap");
    assert_eq!(body["view"]["chart"][0]["tooltip"], "100% ($162.50)");
    assert!(body["view"]["emptyMessage"].is_null());
}

#[tokio::test]
async fn identify_with_no_pedals_keeps_assessment() {
    let empty = IdentificationResult {
        pedal_identifications: vec![],
        overall_assessment: Some("That is a photo of a cat.".to_string()),
    };
    let app = build_router(state_with(Arc::new(StubIdentifier::new(StubOutcome::Result(empty)))));

    let (status, body) = json_body(
        app.oneshot(post_json(
            "/api/identify",
            json!({ "photoDataUri": PNG_DATA_URI }),
        ))
        .await
        .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["total"], 0.0);
    assert!(body["report"]["chart"].as_array().unwrap().is_empty());
    assert_eq!(body["view"]["emptyMessage"], "No pedals were identified in the image.");
    assert_eq!(body["view"]["overallAssessment"], "That is a photo of a cat.");
    assert_eq!(body["view"]["notice"], "No pedals identified in the image.");
}

#[tokio::test]
async fn identify_rejects_malformed_data_uri() {
    let stub = Arc::new(StubIdentifier::new(StubOutcome::Result(sample_result())));
    let app = build_router(state_with(stub.clone()));

    for bad in [
        "not a data uri",
        "data:image/png,iVBORw0KGgo=",
        "data:image/png;base64,***",
        "data:text/plain;base64,aGVsbG8=",
    ] {
        let (status, body) = json_body(
            app.clone()
                .oneshot(post_json("/api/identify", json!({ "photoDataUri": bad })))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "input: {}", bad);
        assert!(body["error"]["message"].is_string());
    }

    assert_eq!(stub.calls(), 0, "invalid images never reach the identifier");
}

#[tokio::test]
async fn identify_provider_failure_is_generic_502() {
    let state = state_with(Arc::new(StubIdentifier::new(StubOutcome::Fail)));
    let app = build_router(state.clone());

    let (status, body) = json_body(
        app.clone()
            .oneshot(post_json(
                "/api/identify",
                json!({ "photoDataUri": PNG_DATA_URI }),
            ))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "IDENTIFICATION_FAILED");
    assert_eq!(body["error"]["message"], IDENTIFY_FAILED_MESSAGE);

    // Provider detail is kept for diagnostics only
    let (_, health) = json_body(app.oneshot(get("/health")).await.unwrap()).await;
    assert!(health["last_error"].as_str().unwrap().contains("quota"));
}
