//! Coding battery: function-writing tasks scored in the sandbox.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::catalog::{CodingTest, Difficulty};
use super::chat_with_model;
use super::report::{percentage, CodingOutcome};
use crate::llm::ChatClient;
use crate::metrics::MetricsCollector;
use crate::sandbox::{partial_credit, SandboxRunner};
use crate::utils::{extract_code, truncate_chars};

/// How many per-case details are kept on each outcome.
const DETAIL_LIMIT: usize = 5;

/// Aggregated result of one pass over the coding tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodingResult {
    pub score: f64,
    pub earned_points: u32,
    pub total_points: u32,
    pub difficulty_scores: BTreeMap<String, f64>,
    pub tests: Vec<CodingOutcome>,
}

/// Ask `model` to solve every task in `tests` and run each answer in `sandbox`.
pub async fn run_coding_battery(
    client: &dyn ChatClient,
    model: &str,
    tests: &[CodingTest],
    sandbox: &SandboxRunner,
    metrics: &MetricsCollector,
) -> CodingResult {
    let mut outcomes = Vec::with_capacity(tests.len());
    let mut totals: BTreeMap<Difficulty, (u32, u32)> =
        Difficulty::ALL.iter().map(|d| (*d, (0, 0))).collect();

    for test in tests {
        let (latency, reply) = chat_with_model(client, model, &test.prompt, metrics).await;

        let outcome = match reply {
            Err(e) => CodingOutcome {
                name: test.name.clone(),
                difficulty: test.difficulty,
                points: test.points,
                earned: 0,
                passed_tests: 0,
                total_tests: test.cases.len(),
                latency_s: latency,
                code: None,
                raw_response: None,
                test_results: Vec::new(),
                failure: None,
                error: Some(e.to_string()),
            },
            Ok(response) => {
                let code = extract_code(&response);
                let report = sandbox.run_tests(&code, &test.cases).await;
                let earned = partial_credit(test.points, report.passed, report.total);

                CodingOutcome {
                    name: test.name.clone(),
                    difficulty: test.difficulty,
                    points: test.points,
                    earned,
                    passed_tests: report.passed,
                    total_tests: report.total,
                    latency_s: latency,
                    code: (!code.is_empty()).then(|| truncate_chars(&code, 500)),
                    raw_response: (!response.is_empty()).then(|| truncate_chars(&response, 300)),
                    test_results: report.details.into_iter().take(DETAIL_LIMIT).collect(),
                    failure: report.failure,
                    error: None,
                }
            }
        };

        debug!(
            model = model,
            test = %test.name,
            earned = outcome.earned,
            points = outcome.points,
            latency_s = latency,
            "Coding test finished"
        );

        let bucket = totals.entry(test.difficulty).or_insert((0, 0));
        bucket.0 += outcome.earned;
        bucket.1 += test.points;
        outcomes.push(outcome);
    }

    let earned_points = totals.values().map(|(earned, _)| earned).sum();
    let total_points = totals.values().map(|(_, total)| total).sum();

    CodingResult {
        score: percentage(earned_points, total_points),
        earned_points,
        total_points,
        difficulty_scores: totals
            .iter()
            .map(|(difficulty, (earned, total))| {
                (difficulty.as_str().to_string(), percentage(*earned, *total))
            })
            .collect(),
        tests: outcomes,
    }
}
