//! Pedal identification via a hosted vision model
//!
//! The service only ever talks to the model through [`PedalIdentifier`], so
//! handlers and tests can swap the HTTP client for a stub.

mod client;
mod parse;
mod prompt;

pub use client::VisionClient;

use pedal_common::{DataUri, IdentificationResult};
use thiserror::Error;

/// Identification failures
///
/// Every variant means the whole request failed; there are no partial results.
#[derive(Debug, Error)]
pub enum IdentifyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Something that can identify pedals in an image
#[async_trait::async_trait]
pub trait PedalIdentifier: Send + Sync {
    /// Identifier name for logging
    fn name(&self) -> &str;

    /// Identify every pedal visible in `image`
    async fn identify(&self, image: &DataUri) -> Result<IdentificationResult, IdentifyError>;
}
