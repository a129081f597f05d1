//! Full evaluation of one model against both batteries.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::catalog::Battery;
use super::coding::{run_coding_battery, CodingResult};
use super::reasoning::{run_reasoning_battery, ReasoningResult};
use super::report::{
    round_to, BatteryLines, CodingDetails, DisplayLine, LatencyStats, ModelReport,
    SmartnessDetails,
};
use crate::llm::ChatClient;
use crate::metrics::MetricsCollector;
use crate::sandbox::SandboxRunner;

/// What to do with a run's `repeat` count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Run each battery once; `repeat` is recorded but not acted on.
    #[default]
    Single,
    /// Run both batteries `repeat` times and average the scores.
    Aggregate,
}

/// Drives the reasoning and coding batteries against a model.
#[derive(Debug, Clone)]
pub struct BatteryEvaluator {
    battery: Arc<Battery>,
    sandbox: SandboxRunner,
    repeat_mode: RepeatMode,
    metrics: MetricsCollector,
}

impl Default for BatteryEvaluator {
    fn default() -> Self {
        Self::new(Battery::builtin(), SandboxRunner::default())
    }
}

impl BatteryEvaluator {
    pub fn new(battery: Battery, sandbox: SandboxRunner) -> Self {
        Self {
            battery: Arc::new(battery),
            sandbox,
            repeat_mode: RepeatMode::default(),
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_repeat_mode(mut self, repeat_mode: RepeatMode) -> Self {
        self.repeat_mode = repeat_mode;
        self
    }

    pub fn battery(&self) -> &Battery {
        &self.battery
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    /// Number of passes actually executed for a requested `repeat`.
    pub fn passes_for(&self, repeat: u32) -> u32 {
        match self.repeat_mode {
            RepeatMode::Single => 1,
            RepeatMode::Aggregate => repeat.max(1),
        }
    }

    /// Runs both batteries against `model` and builds its report.
    pub async fn test_model(&self, client: &dyn ChatClient, model: &str, repeat: u32) -> ModelReport {
        let passes = self.passes_for(repeat);
        let mut reasoning_runs = Vec::with_capacity(passes as usize);
        let mut coding_runs = Vec::with_capacity(passes as usize);

        for pass in 1..=passes {
            if passes > 1 {
                info!(model = model, pass = pass, passes = passes, "Starting battery pass");
            }
            reasoning_runs.push(
                run_reasoning_battery(client, model, &self.battery.reasoning, &self.metrics).await,
            );
            coding_runs.push(
                run_coding_battery(
                    client,
                    model,
                    &self.battery.coding,
                    &self.sandbox,
                    &self.metrics,
                )
                .await,
            );
        }

        let report = build_report(model, passes, reasoning_runs, coding_runs);
        self.metrics.record_score("smartness", report.smartness_score);
        self.metrics.record_score("code", report.code_score);
        report
    }
}

fn build_report(
    model: &str,
    passes: u32,
    reasoning_runs: Vec<ReasoningResult>,
    coding_runs: Vec<CodingResult>,
) -> ModelReport {
    let smartness_score = average(reasoning_runs.iter().map(|r| r.score));
    let code_score = average(coding_runs.iter().map(|r| r.score));

    let smartness_details = SmartnessDetails {
        score: smartness_score,
        points: format!(
            "{}/{}",
            reasoning_runs.iter().map(|r| r.earned_points).sum::<u32>(),
            reasoning_runs.iter().map(|r| r.total_points).sum::<u32>()
        ),
        categories: average_buckets(reasoning_runs.iter().map(|r| &r.category_scores)),
    };
    let coding_details = CodingDetails {
        score: code_score,
        points: format!(
            "{}/{}",
            coding_runs.iter().map(|r| r.earned_points).sum::<u32>(),
            coding_runs.iter().map(|r| r.total_points).sum::<u32>()
        ),
        difficulties: average_buckets(coding_runs.iter().map(|r| &r.difficulty_scores)),
    };

    let reasoning: Vec<_> = reasoning_runs.into_iter().flat_map(|r| r.tests).collect();
    let coding: Vec<_> = coding_runs.into_iter().flat_map(|r| r.tests).collect();

    let latencies: Vec<f64> = reasoning
        .iter()
        .map(|t| t.latency_s)
        .chain(coding.iter().map(|t| t.latency_s))
        .collect();

    let tests = vec![
        BatteryLines {
            name: "smartness".to_string(),
            passes: reasoning
                .iter()
                .map(|t| DisplayLine {
                    latency_s: t.latency_s,
                    response: t.display_line(),
                })
                .collect(),
        },
        BatteryLines {
            name: "coding".to_string(),
            passes: coding
                .iter()
                .map(|t| DisplayLine {
                    latency_s: t.latency_s,
                    response: t.display_line(),
                })
                .collect(),
        },
    ];

    ModelReport {
        model: model.to_string(),
        latency_stats: LatencyStats::from_latencies(&latencies),
        smartness_score,
        code_score,
        smartness_details,
        coding_details,
        reasoning,
        coding,
        tests,
        repeat: passes,
    }
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return 0.0;
    }
    round_to(sum / f64::from(count), 1)
}

fn average_buckets<'a>(
    runs: impl Iterator<Item = &'a BTreeMap<String, f64>>,
) -> BTreeMap<String, f64> {
    let mut collected: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for run in runs {
        for (bucket, score) in run {
            collected.entry(bucket.clone()).or_default().push(*score);
        }
    }
    collected
        .into_iter()
        .map(|(bucket, scores)| (bucket, average(scores.into_iter())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battery::catalog::{AnswerCheck, Category, ReasoningTest};
    use crate::battery::testing::ScriptedClient;

    fn one_question_battery() -> Battery {
        Battery {
            reasoning: vec![ReasoningTest {
                name: "Basic Arithmetic".to_string(),
                prompt: "What is 17 + 28?".to_string(),
                category: Category::Math,
                points: 10,
                check: AnswerCheck::number(45),
            }],
            coding: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_single_mode_ignores_repeat() {
        let evaluator = BatteryEvaluator::new(one_question_battery(), SandboxRunner::default());
        let client = ScriptedClient::new(vec![Ok("45"), Ok("44"), Ok("43")]);

        let report = evaluator.test_model(&client, "etch:1b", 3).await;

        assert_eq!(report.repeat, 1);
        assert_eq!(report.reasoning.len(), 1);
        assert_eq!(report.smartness_score, 100.0);
        assert_eq!(report.smartness_details.points, "10/10");
        assert_eq!(report.code_score, 0.0);
        assert_eq!(report.coding_details.points, "0/0");
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_aggregate_mode_averages_passes() {
        let evaluator = BatteryEvaluator::new(one_question_battery(), SandboxRunner::default())
            .with_repeat_mode(RepeatMode::Aggregate);
        let client = ScriptedClient::new(vec![Ok("45"), Ok("no idea")]);

        let report = evaluator.test_model(&client, "etch:1b", 2).await;

        assert_eq!(report.repeat, 2);
        assert_eq!(report.reasoning.len(), 2);
        assert_eq!(report.smartness_score, 50.0);
        assert_eq!(report.smartness_details.points, "10/20");
        assert_eq!(report.smartness_details.categories["math"], 50.0);
        assert_eq!(report.tests[0].passes.len(), 2);
    }

    #[tokio::test]
    async fn test_report_lines_and_latency() {
        let evaluator = BatteryEvaluator::new(one_question_battery(), SandboxRunner::default());
        let client = ScriptedClient::new(vec![Ok("45")]);

        let report = evaluator.test_model(&client, "etch:1b", 1).await;

        assert_eq!(report.tests[0].name, "smartness");
        assert_eq!(
            report.tests[0].passes[0].response,
            "[MATH] Basic Arithmetic: ✓ PASS (10pts) - 45"
        );
        assert!(report.tests[1].passes.is_empty());
        assert!(report.latency_stats.mean.is_some());
    }

    #[test]
    fn test_passes_for() {
        let evaluator = BatteryEvaluator::default();
        assert_eq!(evaluator.passes_for(5), 1);
        let evaluator = evaluator.with_repeat_mode(RepeatMode::Aggregate);
        assert_eq!(evaluator.passes_for(5), 5);
        assert_eq!(evaluator.passes_for(0), 1);
    }
}
