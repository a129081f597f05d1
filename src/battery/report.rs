//! Per-test outcomes, aggregated scores and the per-model report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::catalog::{Category, Difficulty};
use crate::error::SandboxFailure;
use crate::sandbox::CaseDetail;
use crate::utils::truncate_chars;

/// Outcome of one reasoning test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningOutcome {
    pub name: String,
    pub category: Category,
    pub points: u32,
    pub passed: bool,
    pub latency_s: f64,
    /// Model answer (500 chars) or the transport error when the call failed.
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReasoningOutcome {
    pub fn earned(&self) -> u32 {
        if self.passed {
            self.points
        } else {
            0
        }
    }

    /// `[MATH] Basic Arithmetic: ✓ PASS (10pts) - 45`
    pub fn display_line(&self) -> String {
        let status = if self.passed { "✓ PASS" } else { "✗ FAIL" };
        format!(
            "[{}] {}: {} ({}pts) - {}",
            self.category.as_str().to_uppercase(),
            self.name,
            status,
            self.points,
            truncate_chars(self.response.as_deref().unwrap_or(""), 100)
        )
    }
}

/// Outcome of one coding test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodingOutcome {
    pub name: String,
    pub difficulty: Difficulty,
    pub points: u32,
    pub earned: u32,
    pub passed_tests: usize,
    pub total_tests: usize,
    pub latency_s: f64,
    /// Extracted code, 500 chars.
    pub code: Option<String>,
    /// Raw model reply, 300 chars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    /// First five per-case details.
    #[serde(default)]
    pub test_results: Vec<CaseDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<SandboxFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CodingOutcome {
    /// `[EASY] Sum of List: ✓ 5/5 (25/25pts)` plus the error or a code preview.
    pub fn display_line(&self) -> String {
        let mark = if self.passed_tests > 0 { "✓" } else { "✗" };
        let mut line = format!(
            "[{}] {}: {} {}/{} ({}/{}pts)",
            self.difficulty.as_str().to_uppercase(),
            self.name,
            mark,
            self.passed_tests,
            self.total_tests,
            self.earned,
            self.points
        );

        if let Some(error) = &self.error {
            line.push_str(&format!(" - Error: {}", error));
        } else if let Some(code) = self.code.as_deref().filter(|c| !c.is_empty()) {
            line.push_str(&format!("\nCode: {}...", truncate_chars(code, 200)));
        }

        line
    }
}

/// Latency summary over every chat call for a model, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl LatencyStats {
    /// Summarizes `latencies`; every field is `None` when it is empty.
    pub fn from_latencies(latencies: &[f64]) -> Self {
        if latencies.is_empty() {
            return Self::default();
        }

        let mut sorted = latencies.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };

        Self {
            mean: Some(round_to(mean, 4)),
            median: Some(round_to(median, 4)),
            min: Some(round_to(sorted[0], 4)),
            max: Some(round_to(sorted[count - 1], 4)),
        }
    }
}

/// Score breakdown of the reasoning battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartnessDetails {
    pub score: f64,
    /// `"earned/total"`.
    pub points: String,
    pub categories: BTreeMap<String, f64>,
}

/// Score breakdown of the coding battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodingDetails {
    pub score: f64,
    pub points: String,
    pub difficulties: BTreeMap<String, f64>,
}

/// Display lines for one battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryLines {
    pub name: String,
    pub passes: Vec<DisplayLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayLine {
    pub latency_s: f64,
    pub response: String,
}

/// Everything measured for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub model: String,
    pub latency_stats: LatencyStats,
    pub smartness_score: f64,
    pub code_score: f64,
    pub smartness_details: SmartnessDetails,
    pub coding_details: CodingDetails,
    pub reasoning: Vec<ReasoningOutcome>,
    pub coding: Vec<CodingOutcome>,
    pub tests: Vec<BatteryLines>,
    /// How many times the batteries were actually executed.
    pub repeat: u32,
}

impl ModelReport {
    /// Mean latency, if any call was timed.
    pub fn mean_latency(&self) -> Option<f64> {
        self.latency_stats.mean
    }
}

/// `round(100 * earned / total, 1)`, or 0 when `total` is 0.
pub fn percentage(earned: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to(f64::from(earned) / f64::from(total) * 100.0, 1)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
