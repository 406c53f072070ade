//! OpenAI-compatible chat completions client
//!
//! Sends the image as an `image_url` data URI part and asks for a
//! JSON-schema constrained response.

use pedal_common::config::VisionSettings;
use pedal_common::{DataUri, IdentificationResult};
use serde::Deserialize;
use serde_json::{json, Value};

use super::parse::parse_model_output;
use super::prompt::{response_schema, system_prompt, USER_INSTRUCTION};
use super::{IdentifyError, PedalIdentifier};

const USER_AGENT: &str = concat!("pedal-id/", env!("CARGO_PKG_VERSION"));

/// Upper bound on provider error bodies kept for logs
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Vision model client
pub struct VisionClient {
    http_client: reqwest::Client,
    settings: VisionSettings,
}

impl VisionClient {
    pub fn new(settings: VisionSettings) -> Result<Self, IdentifyError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| IdentifyError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            settings,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.api_base_url)
    }

    /// Request body for one identification call
    pub fn build_request_body(&self, image: &DataUri) -> Value {
        json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": system_prompt() },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": USER_INSTRUCTION },
                        { "type": "image_url", "image_url": { "url": image.to_string() } }
                    ]
                }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "pedal_identification",
                    "schema": response_schema()
                }
            }
        })
    }
}

/// Map a non-success provider status to an error
fn classify_status(status: reqwest::StatusCode, body: String) -> IdentifyError {
    let mut body = body;
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    match status.as_u16() {
        401 | 403 => IdentifyError::Auth(body),
        429 => IdentifyError::Quota(body),
        code => IdentifyError::Api(code, body),
    }
}

fn map_send_error(e: reqwest::Error) -> IdentifyError {
    if e.is_timeout() {
        IdentifyError::Timeout
    } else {
        IdentifyError::Network(e.to_string())
    }
}

#[async_trait::async_trait]
impl PedalIdentifier for VisionClient {
    fn name(&self) -> &str {
        &self.settings.model
    }

    async fn identify(&self, image: &DataUri) -> Result<IdentificationResult, IdentifyError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| IdentifyError::Auth("no API key configured".to_string()))?;

        let url = self.endpoint();
        tracing::debug!(
            url = %url,
            model = %self.settings.model,
            mime_type = %image.mime_type(),
            bytes = image.decoded_len(),
            "Sending identification request"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.build_request_body(image))
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let err = classify_status(status, error_text);
            tracing::warn!(status = status.as_u16(), error = %err, "Vision provider rejected request");
            return Err(err);
        }

        let completion: ChatCompletion = response.json().await.map_err(|e| {
            if e.is_timeout() {
                IdentifyError::Timeout
            } else {
                IdentifyError::MalformedResponse(e.to_string())
            }
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                IdentifyError::MalformedResponse("response has no message content".to_string())
            })?;

        let result = parse_model_output(&content)?;
        tracing::info!(
            pedals = result.identified_count(),
            "Identification response parsed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> VisionSettings {
        VisionSettings {
            api_base_url: "http://127.0.0.1:9/v1".to_string(),
            model: "test-model".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_request_body_shape() {
        let client = VisionClient::new(settings()).unwrap();
        let image = DataUri::parse("data:image/png;base64,iVBORw0KGgo=").unwrap();
        let body = client.build_request_body(&image);

        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(
            body["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/png;base64,iVBORw0KGgo="
        );
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(client.endpoint(), "http://127.0.0.1:9/v1/chat/completions");
    }

    #[test]
    fn test_classify_status() {
        use reqwest::StatusCode;

        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, String::new()),
            IdentifyError::Auth(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, String::new()),
            IdentifyError::Auth(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            IdentifyError::Quota(_)
        ));
        match classify_status(StatusCode::INTERNAL_SERVER_ERROR, "x".repeat(2000)) {
            IdentifyError::Api(500, body) => assert_eq!(body.len(), MAX_ERROR_BODY),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_api_key_is_auth_error() {
        let client = VisionClient::new(settings()).unwrap();
        let image = DataUri::parse("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert!(matches!(
            client.identify(&image).await,
            Err(IdentifyError::Auth(_))
        ));
    }
}
