//! Results view model
//!
//! Everything the page (or the CLI) displays for one identification, derived
//! from the result and its aggregate. Holds no state of its own.

use pedal_common::aggregate::{format_confidence, format_price, ConfidenceBand, PALETTE_SIZE};
use pedal_common::{AggregateReport, IdentificationResult, PedalIdentification};
use serde::Serialize;
use std::fmt::Write as _;

pub const HEADING: &str = "Identification Results";
pub const TOTAL_LABEL: &str = "Total Estimated Value:";
pub const TOTAL_NOTE: &str = "Excludes pedals with unknown prices";
pub const ASSESSMENT_HEADING: &str = "Overall Assessment";
pub const CHART_HEADING: &str = "Manufacturer Value Distribution";
pub const CHART_SUBTITLE: &str = "Percentage of total value by manufacturer";
pub const EMPTY_MESSAGE: &str = "No pedals were identified in the image.";
pub const UNKNOWN_MAKE_LABEL: &str = "Unknown Make";
pub const UNKNOWN_MODEL_LABEL: &str = "Unknown Model";
pub const NO_ADVICE_LABEL: &str = "N/A";

/// Rendered results page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub heading: String,
    pub total_label: String,
    pub formatted_total: String,
    pub total_note: String,
    pub overall_assessment: Option<String>,
    pub chart_heading: String,
    pub chart_subtitle: String,
    /// Empty when there is nothing to chart
    pub chart: Vec<ChartBar>,
    pub cards: Vec<PedalCard>,
    /// Set only when no pedals were identified
    pub empty_message: Option<String>,
    pub notice: String,
}

/// One chart bar
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartBar {
    pub make: String,
    pub percentage: u32,
    /// "NN%"
    pub label: String,
    /// "NN% ($x.xx)"
    pub tooltip: String,
    /// CSS colour token, `chart-1` through `chart-5`
    pub color: String,
}

/// One pedal card
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PedalCard {
    pub make: String,
    pub model: String,
    /// e.g. "92% High Confidence"; absent when the model gave no score
    pub confidence_badge: Option<String>,
    pub confidence_band: ConfidenceBand,
    pub price: String,
    pub advice: String,
    pub reasoning: Option<String>,
}

impl PedalCard {
    fn from_pedal(pedal: &PedalIdentification) -> Self {
        let band = ConfidenceBand::from_score(pedal.confidence);
        Self {
            make: or_fallback(&pedal.make, UNKNOWN_MAKE_LABEL),
            model: or_fallback(&pedal.model, UNKNOWN_MODEL_LABEL),
            confidence_badge: pedal
                .confidence
                .map(|c| format!("{} {}", format_confidence(c), band.label())),
            confidence_band: band,
            price: format_price(pedal.estimated_used_price),
            advice: pedal
                .advice
                .map(|a| a.label().to_string())
                .unwrap_or_else(|| NO_ADVICE_LABEL.to_string()),
            reasoning: Some(pedal.reasoning.trim())
                .filter(|r| !r.is_empty())
                .map(str::to_string),
        }
    }
}

fn or_fallback(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

impl ResultView {
    pub fn build(result: &IdentificationResult, report: &AggregateReport) -> Self {
        let chart = if report.total > 0.0 {
            report
                .chart
                .iter()
                .map(|entry| {
                    let label = format!("{}%", entry.percentage);
                    ChartBar {
                        make: entry.make.clone(),
                        percentage: entry.percentage,
                        tooltip: format!("{} ({})", label, format_price(Some(entry.value))),
                        label,
                        color: format!("chart-{}", entry.color_index % PALETTE_SIZE + 1),
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            heading: HEADING.to_string(),
            total_label: TOTAL_LABEL.to_string(),
            formatted_total: report.formatted_total.clone(),
            total_note: TOTAL_NOTE.to_string(),
            overall_assessment: result.overall_assessment.clone(),
            chart_heading: CHART_HEADING.to_string(),
            chart_subtitle: CHART_SUBTITLE.to_string(),
            chart,
            cards: result
                .pedal_identifications
                .iter()
                .map(PedalCard::from_pedal)
                .collect(),
            empty_message: result.is_empty().then(|| EMPTY_MESSAGE.to_string()),
            notice: result.completion_notice(),
        }
    }

    /// Plain-text rendering for terminals
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "{}", self.heading);
        let _ = writeln!(out, "{}", "=".repeat(self.heading.len()));
        let _ = writeln!(
            out,
            "{} {} ({})",
            self.total_label, self.formatted_total, self.total_note
        );

        if let Some(assessment) = &self.overall_assessment {
            let _ = writeln!(out, "\n{}:\n  {}", ASSESSMENT_HEADING, assessment);
        }

        if !self.chart.is_empty() {
            let _ = writeln!(out, "\n{}:\n  {}", self.chart_heading, self.chart_subtitle);
            let width = self.chart.iter().map(|b| b.make.len()).max().unwrap_or(0);
            for bar in &self.chart {
                let _ = writeln!(
                    out,
                    "  {:<width$}  {:<20}  {}",
                    bar.make,
                    "#".repeat((bar.percentage as usize).div_ceil(5)),
                    bar.tooltip,
                    width = width
                );
            }
        }

        if let Some(message) = &self.empty_message {
            let _ = writeln!(out, "\n{}", message);
        }

        for card in &self.cards {
            let _ = writeln!(out, "\n{} {}", card.make, card.model);
            if let Some(badge) = &card.confidence_badge {
                let _ = writeln!(out, "  Confidence: {}", badge);
            }
            let _ = writeln!(out, "  Estimated used price: {}", card.price);
            let _ = writeln!(out, "  Advice: {}", card.advice);
            if let Some(reasoning) = &card.reasoning {
                let _ = writeln!(out, "  {}", reasoning);
            }
        }

        out
    }
}
