//! Identification result schema
//!
//! One versioned schema for what the vision model returns. Decoding is
//! lenient: missing or mistyped fields resolve to documented defaults instead
//! of failing, so a single odd field never discards an otherwise usable
//! result.
//!
//! # Versions
//! - v1: `{ "pedalIdentification": { make, model, confidence? } }` (one pedal,
//!   no price or advice)
//! - v2 (current): `{ "pedalIdentifications": [...], "overallAssessment"? }`
//!
//! v1 payloads are migrated into a one-element v2 result on decode.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use crate::{Error, Result};

/// Current wire schema version
pub const SCHEMA_VERSION: u32 = 2;

/// Buy/sell recommendation for a single pedal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Advice {
    Keep,
    Sell,
    #[serde(rename = "Buy If Cheap")]
    BuyIfCheap,
    #[serde(rename = "Consider Selling")]
    ConsiderSelling,
}

impl Advice {
    /// All values, in the order they are presented to the model
    pub const ALL: [Advice; 4] = [
        Advice::Keep,
        Advice::Sell,
        Advice::BuyIfCheap,
        Advice::ConsiderSelling,
    ];

    /// Wire/display label
    pub fn label(&self) -> &'static str {
        match self {
            Advice::Keep => "Keep",
            Advice::Sell => "Sell",
            Advice::BuyIfCheap => "Buy If Cheap",
            Advice::ConsiderSelling => "Consider Selling",
        }
    }

    /// Parse a label, ignoring case and surrounding/internal spacing differences
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        Advice::ALL
            .into_iter()
            .find(|advice| advice.label().to_lowercase() == normalized)
    }
}

impl fmt::Display for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One identified pedal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PedalIdentification {
    /// Manufacturer (may be blank when the model could not tell)
    #[serde(default, deserialize_with = "lenient_string")]
    pub make: String,

    /// Model name
    #[serde(default, deserialize_with = "lenient_string")]
    pub model: String,

    /// Identification confidence in [0, 1]; absent when the model declined to score
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_confidence"
    )]
    pub confidence: Option<f64>,

    /// Estimated used price in USD; `None` means unknown and is excluded from totals
    #[serde(default, deserialize_with = "lenient_price")]
    pub estimated_used_price: Option<f64>,

    /// Keep/sell recommendation; `None` when missing or not one of the known values
    #[serde(default, deserialize_with = "lenient_advice")]
    pub advice: Option<Advice>,

    /// Persona-flavoured explanation, expected unique per pedal
    #[serde(default, deserialize_with = "lenient_string")]
    pub reasoning: String,
}

/// Full identification response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "WireResult")]
pub struct IdentificationResult {
    /// Pedals in model output order
    pub pedal_identifications: Vec<PedalIdentification>,

    /// Optional narrative summary of the whole collection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_assessment: Option<String>,
}

impl IdentificationResult {
    /// Decode a JSON document in any supported schema version
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::MalformedResult(e.to_string()))
    }

    /// Decode an already-parsed JSON value in any supported schema version
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::MalformedResult(e.to_string()))
    }

    /// Number of pedals identified
    pub fn identified_count(&self) -> usize {
        self.pedal_identifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pedal_identifications.is_empty()
    }

    /// User-facing notice shown after a successful identification
    pub fn completion_notice(&self) -> String {
        match self.identified_count() {
            0 => "No pedals identified in the image.".to_string(),
            1 => "Identified 1 pedal.".to_string(),
            n => format!("Identified {} pedals.", n),
        }
    }

    /// Reasoning strings that appear on more than one pedal
    ///
    /// Blank reasoning is ignored.
    pub fn duplicate_reasoning(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        let mut duplicates: Vec<&str> = Vec::new();

        for pedal in &self.pedal_identifications {
            let reasoning = pedal.reasoning.as_str();
            if reasoning.is_empty() {
                continue;
            }
            if seen.contains(&reasoning) {
                if !duplicates.contains(&reasoning) {
                    duplicates.push(reasoning);
                }
            } else {
                seen.push(reasoning);
            }
        }

        duplicates
    }
}

// ============================================================================
// Wire formats
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum WireResult {
    // Legacy is tried first: it requires `pedalIdentification`, which never
    // appears in the current shape.
    V1(WireResultV1),
    V2(WireResultV2),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResultV1 {
    pedal_identification: PedalIdentification,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResultV2 {
    pedal_identifications: Vec<PedalIdentification>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    overall_assessment: Option<String>,
}

impl From<WireResult> for IdentificationResult {
    fn from(wire: WireResult) -> Self {
        match wire {
            WireResult::V1(v1) => {
                tracing::debug!("Migrating v1 identification result to v{}", SCHEMA_VERSION);
                IdentificationResult {
                    pedal_identifications: vec![v1.pedal_identification],
                    overall_assessment: None,
                }
            }
            WireResult::V2(v2) => IdentificationResult {
                pedal_identifications: v2.pedal_identifications,
                overall_assessment: v2.overall_assessment,
            },
        }
    }
}

// ============================================================================
// Lenient field decoders
// ============================================================================

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_opt_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = lenient_string(deserializer)?;
    Ok(if s.is_empty() { None } else { Some(s) })
}

fn number_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        // Models occasionally quote prices as "$1,250.00"
        Value::String(s) => s
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .parse::<f64>()
            .ok(),
        _ => None,
    }
}

fn lenient_price<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(number_from)
        .filter(|price| price.is_finite() && *price >= 0.0))
}

fn lenient_confidence<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(number_from)
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0)))
}

fn lenient_advice<'de, D>(deserializer: D) -> std::result::Result<Option<Advice>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Advice::from_label(&s),
        _ => None,
    })
}
