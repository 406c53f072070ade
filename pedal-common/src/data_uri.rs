//! Image data URIs
//!
//! Both capture paths (camera frame and file upload) end in a string of the
//! form `data:<mimetype>;base64,<payload>`. This module validates those
//! strings on the way in and produces them from raw image bytes.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::{Error, Result};

/// Image types the identifier accepts
pub const ACCEPTED_IMAGE_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/gif", "image/webp"];

/// Default limit on decoded image size (10 MiB)
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// A validated `data:<mime>;base64,<payload>` string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataUri {
    mime_type: String,
    payload: String,
}

impl DataUri {
    /// Parse and validate a data URI string
    pub fn parse(input: &str) -> Result<Self> {
        let rest = input
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| Error::InvalidInput("data URI must start with 'data:'".to_string()))?;

        let (header, payload) = rest.split_once(',').ok_or_else(|| {
            Error::InvalidInput("data URI is missing the ',' payload separator".to_string())
        })?;

        let mime_type = header.strip_suffix(";base64").ok_or_else(|| {
            Error::InvalidInput("data URI must use base64 encoding".to_string())
        })?;

        // Parameters such as ";charset=..." may precede ";base64"
        let mime_type = mime_type.split(';').next().unwrap_or_default().trim();
        if !is_valid_mime(mime_type) {
            return Err(Error::InvalidInput(format!(
                "data URI has an invalid MIME type: '{}'",
                mime_type
            )));
        }

        if payload.is_empty() {
            return Err(Error::InvalidInput("data URI payload is empty".to_string()));
        }

        general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| Error::InvalidInput(format!("data URI payload is not valid base64: {}", e)))?;

        Ok(Self {
            mime_type: mime_type.to_ascii_lowercase(),
            payload: payload.to_string(),
        })
    }

    /// Build a data URI from raw image bytes, sniffing the type from magic bytes
    pub fn from_image_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidInput("image is empty".to_string()));
        }

        let kind = infer::get(bytes).ok_or_else(|| {
            Error::InvalidInput("could not determine the image type".to_string())
        })?;

        let mime_type = kind.mime_type();
        if !ACCEPTED_IMAGE_TYPES.contains(&mime_type) {
            return Err(Error::InvalidInput(format!(
                "unsupported image type '{}' (accepted: {})",
                mime_type,
                ACCEPTED_IMAGE_TYPES.join(", ")
            )));
        }

        Ok(Self {
            mime_type: mime_type.to_string(),
            payload: general_purpose::STANDARD.encode(bytes),
        })
    }

    /// Read an image file and encode it
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Read image file");
        Self::from_image_bytes(&bytes)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 payload (without the header)
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Whether the declared type is one of [`ACCEPTED_IMAGE_TYPES`]
    pub fn is_accepted_image(&self) -> bool {
        ACCEPTED_IMAGE_TYPES.contains(&self.mime_type.as_str())
    }

    /// Size of the decoded payload in bytes
    pub fn decoded_len(&self) -> usize {
        let padding = self.payload.bytes().rev().take_while(|b| *b == b'=').count();
        (self.payload.len() / 4) * 3 - padding.min(2)
    }

    /// Decode the payload back into bytes
    pub fn decode(&self) -> Result<Vec<u8>> {
        general_purpose::STANDARD
            .decode(&self.payload)
            .map_err(|e| Error::InvalidInput(e.to_string()))
    }

    /// Reject images larger than `max_bytes` once decoded
    pub fn ensure_within(&self, max_bytes: usize) -> Result<()> {
        let len = self.decoded_len();
        if len > max_bytes {
            return Err(Error::InvalidInput(format!(
                "image is {} bytes; the limit is {} bytes",
                len, max_bytes
            )));
        }
        Ok(())
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.payload)
    }
}

impl TryFrom<String> for DataUri {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        DataUri::parse(&value)
    }
}

impl From<DataUri> for String {
    fn from(uri: DataUri) -> Self {
        uri.to_string()
    }
}

fn is_valid_mime(mime: &str) -> bool {
    let Some((kind, subtype)) = mime.split_once('/') else {
        return false;
    };
    let token = |s: &str| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.' | '_'))
    };
    token(kind) && token(subtype)
}
