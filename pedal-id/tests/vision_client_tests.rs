//! Vision client tests against a local fake provider

use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use pedal_common::config::VisionSettings;
use pedal_common::{Advice, DataUri};
use pedal_id::vision::{IdentifyError, PedalIdentifier, VisionClient};
use serde_json::{json, Value};

const IMAGE: &str = "data:image/png;base64,iVBORw0KGgo=";

/// How the fake provider behaves
#[derive(Clone)]
enum Behaviour {
    Reply(String),
    Status(StatusCode),
    Slow,
}

async fn chat_completions(
    State(behaviour): State<Behaviour>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer test-key") {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    // Image must arrive as a data URI content part
    if body["messages"][1]["content"][1]["image_url"]["url"] != IMAGE {
        return (StatusCode::BAD_REQUEST, "missing image").into_response();
    }

    match behaviour {
        Behaviour::Reply(content) => Json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        }))
        .into_response(),
        Behaviour::Status(status) => (status, "provider says no").into_response(),
        Behaviour::Slow => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK.into_response()
        }
    }
}

/// Start a fake provider and return a client pointed at it
async fn client_for(behaviour: Behaviour, api_key: Option<&str>) -> VisionClient {
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(behaviour);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    VisionClient::new(VisionSettings {
        api_base_url: format!("http://{}/v1", addr),
        model: "fake-vision".to_string(),
        api_key: api_key.map(str::to_string),
        request_timeout: Duration::from_millis(500),
    })
    .unwrap()
}

fn image() -> DataUri {
    DataUri::parse(IMAGE).unwrap()
}

#[tokio::test]
async fn parses_fenced_model_output() {
    let content = "```json\n{\"pedalIdentifications\":[{\"make\":\"Boss\",\"model\":\"DS-1\",\"confidence\":0.95,\"estimatedUsedPrice\":45,\"advice\":\"Keep\",\"reasoning\":\"Orange box of legend.\"},{\"make\":\"\",\"model\":\"Fuzz\",\"estimatedUsedPrice\":null,\"advice\":\"Consider Selling\",\"reasoning\":\"No badge, no provenance.\"}],\"overallAssessment\":\"Starter board.\"}\n```";
    let client = client_for(Behaviour::Reply(content.to_string()), Some("test-key")).await;

    let result = client.identify(&image()).await.unwrap();

    assert_eq!(result.identified_count(), 2);
    assert_eq!(result.pedal_identifications[0].estimated_used_price, Some(45.0));
    assert_eq!(result.pedal_identifications[1].make, "");
    assert_eq!(result.pedal_identifications[1].estimated_used_price, None);
    assert_eq!(
        result.pedal_identifications[1].advice,
        Some(Advice::ConsiderSelling)
    );
    assert_eq!(result.overall_assessment.as_deref(), Some("Starter board."));
}

#[tokio::test]
async fn wrong_key_is_auth_error() {
    let client = client_for(Behaviour::Reply("{}".to_string()), Some("other-key")).await;
    assert!(matches!(
        client.identify(&image()).await,
        Err(IdentifyError::Auth(_))
    ));
}

#[tokio::test]
async fn rate_limit_is_quota_error() {
    let client = client_for(Behaviour::Status(StatusCode::TOO_MANY_REQUESTS), Some("test-key")).await;
    assert!(matches!(
        client.identify(&image()).await,
        Err(IdentifyError::Quota(_))
    ));
}

#[tokio::test]
async fn server_error_is_api_error() {
    let client = client_for(
        Behaviour::Status(StatusCode::SERVICE_UNAVAILABLE),
        Some("test-key"),
    )
    .await;
    match client.identify(&image()).await {
        Err(IdentifyError::Api(503, body)) => assert_eq!(body, "provider says no"),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn prose_reply_is_malformed() {
    let client = client_for(
        Behaviour::Reply("Sorry, I can't help with that.".to_string()),
        Some("test-key"),
    )
    .await;
    assert!(matches!(
        client.identify(&image()).await,
        Err(IdentifyError::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn slow_provider_times_out() {
    let client = client_for(Behaviour::Slow, Some("test-key")).await;
    assert!(matches!(
        client.identify(&image()).await,
        Err(IdentifyError::Timeout)
    ));
}
