//! Result aggregation
//!
//! Derives presentation-ready totals and chart data from an
//! [`IdentificationResult`]. Every function here is pure: the same input
//! always yields the same output, and nothing is cached between calls.
//!
//! Pipeline:
//! 1. [`compute_total`] sums known prices (unknown prices contribute 0)
//! 2. [`group_by_manufacturer`] sums prices per make, in first-encountered order
//! 3. [`build_chart_dataset`] drops non-positive groups, sorts descending
//!    (stable, so ties keep encounter order), then assigns colours by final
//!    position

use serde::{Deserialize, Serialize};

use crate::model::{IdentificationResult, PedalIdentification};

/// Display string for a pedal whose price could not be estimated
pub const PRICE_UNKNOWN: &str = "Price Unknown";

/// Make substituted when the model left it blank
pub const UNKNOWN_MAKE: &str = "Unknown";

/// Number of distinct chart colours; colour indices cycle modulo this
pub const PALETTE_SIZE: usize = 5;

/// Summed value for one manufacturer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturerAggregate {
    pub make: String,
    pub value: f64,
    /// Share of the grand total, rounded to a whole percent (0 when total is 0)
    pub percentage: u32,
    /// Pre-formatted value, e.g. "$62.50"
    pub formatted_value: String,
}

/// One bar in the manufacturer value chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartEntry {
    pub make: String,
    pub value: f64,
    pub percentage: u32,
    /// Palette slot, 0-based, assigned after sorting
    pub color_index: usize,
}

/// Everything the presentation layer needs from one identification result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    /// Sum of all known prices
    pub total: f64,
    /// `total` formatted for display
    pub formatted_total: String,
    /// Number of pedals in the result
    pub pedal_count: usize,
    /// Number of pedals with a known price
    pub priced_count: usize,
    /// Per-manufacturer sums in first-encountered order (zero sums included)
    pub manufacturers: Vec<ManufacturerAggregate>,
    /// Chart dataset: positive sums only, sorted by value descending
    pub chart: Vec<ChartEntry>,
}

/// Sum of `estimated_used_price` over all pedals; unknown prices count as 0
pub fn compute_total(pedals: &[PedalIdentification]) -> f64 {
    pedals
        .iter()
        .filter_map(|pedal| pedal.estimated_used_price)
        .sum()
}

/// Format a price for display
///
/// `None` yields [`PRICE_UNKNOWN`]; otherwise a dollar amount with exactly two
/// decimal places.
pub fn format_price(value: Option<f64>) -> String {
    match value {
        None => PRICE_UNKNOWN.to_string(),
        Some(v) => format!("${:.2}", v),
    }
}

/// Make used for grouping: the literal make, or [`UNKNOWN_MAKE`] when blank
pub fn display_make(pedal: &PedalIdentification) -> &str {
    if pedal.make.trim().is_empty() {
        UNKNOWN_MAKE
    } else {
        pedal.make.as_str()
    }
}

/// Sum prices per manufacturer
///
/// Returns `(make, value)` pairs in the order each make first appears.
/// Makes are compared literally; unknown prices contribute 0, so a make whose
/// pedals are all unpriced still appears with value 0.
pub fn group_by_manufacturer(pedals: &[PedalIdentification]) -> Vec<(String, f64)> {
    let mut groups: Vec<(String, f64)> = Vec::new();

    for pedal in pedals {
        let make = display_make(pedal);
        let price = pedal.estimated_used_price.unwrap_or(0.0);

        match groups.iter_mut().find(|(existing, _)| existing == make) {
            Some((_, value)) => *value += price,
            None => groups.push((make.to_string(), price)),
        }
    }

    groups
}

/// Percentage of `total`, rounded; 0 when `total` is not positive
pub fn percentage_of(value: f64, total: f64) -> u32 {
    if total > 0.0 {
        (value / total * 100.0).round().max(0.0) as u32
    } else {
        0
    }
}

/// Build the chart dataset from grouped values
///
/// Entries with value <= 0 are dropped. The rest are sorted by value
/// descending with a stable sort, so equal values keep their input order.
/// Colour indices come from the position in the sorted output.
pub fn build_chart_dataset(grouped: &[(String, f64)], total: f64) -> Vec<ChartEntry> {
    let mut entries: Vec<(&str, f64)> = grouped
        .iter()
        .filter(|(_, value)| *value > 0.0)
        .map(|(make, value)| (make.as_str(), *value))
        .collect();

    entries.sort_by(|a, b| b.1.total_cmp(&a.1));

    entries
        .into_iter()
        .enumerate()
        .map(|(index, (make, value))| ChartEntry {
            make: make.to_string(),
            value,
            percentage: percentage_of(value, total),
            color_index: index % PALETTE_SIZE,
        })
        .collect()
}

/// Run the full aggregation over one identification result
pub fn aggregate(result: &IdentificationResult) -> AggregateReport {
    let pedals = &result.pedal_identifications;
    let total = compute_total(pedals);
    let grouped = group_by_manufacturer(pedals);
    let chart = build_chart_dataset(&grouped, total);

    let manufacturers = grouped
        .iter()
        .map(|(make, value)| ManufacturerAggregate {
            make: make.clone(),
            value: *value,
            percentage: percentage_of(*value, total),
            formatted_value: format_price(Some(*value)),
        })
        .collect();

    AggregateReport {
        total,
        formatted_total: format_price(Some(total)),
        pedal_count: pedals.len(),
        priced_count: pedals
            .iter()
            .filter(|p| p.estimated_used_price.is_some())
            .count(),
        manufacturers,
        chart,
    }
}

// ============================================================================
// Confidence banding
// ============================================================================

/// Qualitative band for an identification confidence score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
    Unknown,
}

impl ConfidenceBand {
    pub fn from_score(score: Option<f64>) -> Self {
        match score {
            None => ConfidenceBand::Unknown,
            Some(s) if s >= 0.8 => ConfidenceBand::High,
            Some(s) if s >= 0.5 => ConfidenceBand::Medium,
            Some(_) => ConfidenceBand::Low,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceBand::High => "High Confidence",
            ConfidenceBand::Medium => "Medium Confidence",
            ConfidenceBand::Low => "Low Confidence",
            ConfidenceBand::Unknown => "Confidence Unknown",
        }
    }
}

/// Confidence as a whole-number percent string, e.g. "92%"
pub fn format_confidence(score: f64) -> String {
    format!("{:.0}%", score * 100.0)
}
