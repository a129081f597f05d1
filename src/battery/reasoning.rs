//! Reasoning battery: math, logic and knowledge questions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::catalog::{Category, ReasoningTest};
use super::chat_with_model;
use super::report::{percentage, ReasoningOutcome};
use crate::llm::ChatClient;
use crate::metrics::MetricsCollector;
use crate::utils::truncate_chars;

/// Aggregated result of one pass over the reasoning tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningResult {
    pub score: f64,
    pub earned_points: u32,
    pub total_points: u32,
    pub category_scores: BTreeMap<String, f64>,
    pub tests: Vec<ReasoningOutcome>,
}

/// Ask `model` every question in `tests`, one at a time.
///
/// A failed chat call fails that test only.
pub async fn run_reasoning_battery(
    client: &dyn ChatClient,
    model: &str,
    tests: &[ReasoningTest],
    metrics: &MetricsCollector,
) -> ReasoningResult {
    let mut outcomes = Vec::with_capacity(tests.len());
    let mut totals: BTreeMap<Category, (u32, u32)> =
        Category::ALL.iter().map(|c| (*c, (0, 0))).collect();

    for test in tests {
        let (latency, reply) = chat_with_model(client, model, &test.prompt, metrics).await;

        let outcome = match reply {
            Ok(answer) => ReasoningOutcome {
                name: test.name.clone(),
                category: test.category,
                points: test.points,
                passed: !answer.is_empty() && test.check.matches(&answer),
                latency_s: latency,
                response: Some(truncate_chars(&answer, 500)),
                error: None,
            },
            Err(e) => ReasoningOutcome {
                name: test.name.clone(),
                category: test.category,
                points: test.points,
                passed: false,
                latency_s: latency,
                response: Some(e.to_string()),
                error: Some(e.to_string()),
            },
        };

        debug!(
            model = model,
            test = %test.name,
            passed = outcome.passed,
            latency_s = latency,
            "Reasoning test finished"
        );

        let bucket = totals.entry(test.category).or_insert((0, 0));
        bucket.0 += outcome.earned();
        bucket.1 += test.points;
        outcomes.push(outcome);
    }

    let earned_points = totals.values().map(|(earned, _)| earned).sum();
    let total_points = totals.values().map(|(_, total)| total).sum();

    ReasoningResult {
        score: percentage(earned_points, total_points),
        earned_points,
        total_points,
        category_scores: totals
            .iter()
            .map(|(category, (earned, total))| {
                (category.as_str().to_string(), percentage(*earned, *total))
            })
            .collect(),
        tests: outcomes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battery::catalog::AnswerCheck;
    use crate::battery::testing::ScriptedClient;

    fn question(name: &str, category: Category, points: u32, check: AnswerCheck) -> ReasoningTest {
        ReasoningTest {
            name: name.to_string(),
            prompt: format!("prompt for {}", name),
            category,
            points,
            check,
        }
    }

    #[tokio::test]
    async fn test_scores_and_category_breakdown() {
        let tests = vec![
            question("add", Category::Math, 10, AnswerCheck::number(45)),
            question("capital", Category::Knowledge, 10, AnswerCheck::contains("paris")),
        ];
        let client = ScriptedClient::new(vec![Ok("45"), Ok("London")]);

        let result =
            run_reasoning_battery(&client, "etch:1b", &tests, &MetricsCollector::new()).await;

        assert_eq!(result.earned_points, 10);
        assert_eq!(result.total_points, 20);
        assert_eq!(result.score, 50.0);
        assert_eq!(result.category_scores["math"], 100.0);
        assert_eq!(result.category_scores["knowledge"], 0.0);
        assert_eq!(result.category_scores["logic"], 0.0);
        assert!(result.tests[0].passed);
        assert!(!result.tests[1].passed);
    }

    #[tokio::test]
    async fn test_transport_error_fails_only_that_test() {
        let tests = vec![
            question("first", Category::Logic, 15, AnswerCheck::contains("no")),
            question("second", Category::Logic, 15, AnswerCheck::contains("no")),
        ];
        let client = ScriptedClient::new(vec![Err("connection refused"), Ok("No.")]);

        let result =
            run_reasoning_battery(&client, "etch:1b", &tests, &MetricsCollector::new()).await;

        assert!(!result.tests[0].passed);
        assert!(result.tests[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("connection refused")));
        assert!(result.tests[1].passed);
        assert_eq!(result.score, 50.0);
    }

    #[tokio::test]
    async fn test_response_is_truncated() {
        let tests = vec![question("long", Category::Math, 10, AnswerCheck::number(1))];
        let long = "x".repeat(800);
        let client = ScriptedClient::new(vec![Ok(long.as_str())]);

        let result =
            run_reasoning_battery(&client, "etch:1b", &tests, &MetricsCollector::new()).await;

        assert_eq!(result.tests[0].response.as_ref().map(|r| r.len()), Some(500));
    }
}
