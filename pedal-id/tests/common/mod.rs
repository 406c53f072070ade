//! Shared helpers for pedal-id integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use pedal_common::config::ServiceConfig;
use pedal_common::{Advice, DataUri, IdentificationResult, PedalIdentification};
use pedal_id::vision::{IdentifyError, PedalIdentifier};
use pedal_id::AppState;
use serde_json::Value;
use tokio::sync::Semaphore;
use tower::ServiceExt;

pub const PNG_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// What the stub identifier answers with
#[derive(Clone)]
pub enum StubOutcome {
    Result(IdentificationResult),
    Fail,
}

/// Identifier that returns a canned outcome, optionally waiting on a gate
pub struct StubIdentifier {
    outcome: StubOutcome,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
}

impl StubIdentifier {
    pub fn new(outcome: StubOutcome) -> Self {
        Self {
            outcome,
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Calls block until a permit is added to `gate`
    pub fn gated(outcome: StubOutcome, gate: Arc<Semaphore>) -> Self {
        Self {
            outcome,
            gate: Some(gate),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PedalIdentifier for StubIdentifier {
    fn name(&self) -> &str {
        "stub"
    }

    async fn identify(&self, _image: &DataUri) -> Result<IdentificationResult, IdentifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.expect("gate closed");
            permit.forget();
        }
        match &self.outcome {
            StubOutcome::Result(result) => Ok(result.clone()),
            StubOutcome::Fail => Err(IdentifyError::Quota("quota exhausted".to_string())),
        }
    }
}

pub fn pedal(make: &str, model: &str, price: Option<f64>, advice: Advice) -> PedalIdentification {
    PedalIdentification {
        make: make.to_string(),
        model: model.to_string(),
        confidence: Some(0.85),
        estimated_used_price: price,
        advice: Some(advice),
        reasoning: format!("The {} {} is a known quantity.", make, model),
    }
}

pub fn sample_result() -> IdentificationResult {
    IdentificationResult {
        pedal_identifications: vec![
            pedal("Boss", "DS-1", Some(62.5), Advice::Keep),
            pedal("Electro-Harmonix", "Big Muff Pi", None, Advice::BuyIfCheap),
            pedal("Boss", "BD-2", Some(100.0), Advice::Sell),
        ],
        overall_assessment: Some("A sensible, Boss-heavy board.".to_string()),
    }
}

pub fn state_with(identifier: Arc<dyn PedalIdentifier>) -> AppState {
    AppState::new(ServiceConfig::default(), identifier)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Start a session the way a page load does; returns its id
pub async fn create_session(app: &Router) -> String {
    let (status, body) = json_body(app.clone().oneshot(post_empty("/api/session")).await.unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    body["session_id"].as_str().unwrap().to_string()
}
