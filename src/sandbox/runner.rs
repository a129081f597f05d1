//! Screening, execution and scoring of generated code.

use std::process::Stdio;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::config::SandboxConfig;
use super::harness::{build_harness, parse_output, HarnessCaseResult, HarnessOutput, TestCase};
use crate::error::SandboxFailure;
use crate::metrics::MetricsCollector;
use crate::utils::truncate_chars;

/// Result of one test case as seen by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseDetail {
    pub input: Value,
    pub expected: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub got: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub passed: bool,
}

/// Aggregate result of running a source against its test cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxReport {
    pub passed: usize,
    pub total: usize,
    pub details: Vec<CaseDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<SandboxFailure>,
}

impl SandboxReport {
    fn failed(total: usize, failure: SandboxFailure) -> Self {
        Self {
            passed: 0,
            total,
            details: Vec::new(),
            failure: Some(failure),
        }
    }

    /// Returns true when every case passed.
    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }
}

/// `floor(points * passed / total)`, or 0 when there are no cases.
pub fn partial_credit(points: u32, passed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let passed = passed.min(total) as u64;
    (u64::from(points) * passed / total as u64) as u32
}

/// Runs generated Python in a short-lived subprocess.
///
/// The deny list is a lexical screen only. Isolation comes from the fresh
/// interpreter process, closed stdin and the hard timeout.
#[derive(Debug, Clone, Default)]
pub struct SandboxRunner {
    config: SandboxConfig,
    metrics: MetricsCollector,
}

impl SandboxRunner {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Rejects empty sources and sources containing a deny-listed substring.
    pub fn screen(&self, source: &str) -> Result<(), SandboxFailure> {
        if source.trim().is_empty() {
            return Err(SandboxFailure::NoCode);
        }
        if let Some(pattern) = self
            .config
            .deny_patterns
            .iter()
            .find(|pattern| source.contains(pattern.as_str()))
        {
            return Err(SandboxFailure::Violation {
                pattern: pattern.clone(),
            });
        }
        Ok(())
    }

    /// Executes `source` against `cases` and reports how many passed.
    ///
    /// Never returns an error: every way the code can fail is recorded on
    /// the report's `failure` with zero cases passed.
    pub async fn run_tests(&self, source: &str, cases: &[TestCase]) -> SandboxReport {
        let total = cases.len();
        let start = Instant::now();

        if let Err(failure) = self.screen(source) {
            debug!(failure = %failure, "Source rejected before execution");
            self.metrics.record_sandbox(outcome_label(&failure), 0.0);
            return SandboxReport::failed(total, failure);
        }

        let report = match self.execute(source, cases).await {
            Ok(results) => collect_details(cases, results),
            Err(failure) => SandboxReport::failed(total, failure),
        };

        let outcome = report
            .failure
            .as_ref()
            .map(outcome_label)
            .unwrap_or("completed");
        self.metrics
            .record_sandbox(outcome, start.elapsed().as_secs_f64());
        debug!(
            passed = report.passed,
            total = report.total,
            outcome = outcome,
            "Sandbox execution finished"
        );

        report
    }

    async fn execute(
        &self,
        source: &str,
        cases: &[TestCase],
    ) -> Result<Vec<HarnessCaseResult>, SandboxFailure> {
        let harness = build_harness(source, cases, &self.config.entry_points);

        // Deleted when the guard drops, whichever way this function returns.
        let script = tempfile::Builder::new()
            .prefix("etch-sandbox-")
            .suffix(".py")
            .tempfile()
            .map_err(|e| fault(format!("Failed to create harness file: {}", e)))?;
        tokio::fs::write(script.path(), harness)
            .await
            .map_err(|e| fault(format!("Failed to write harness file: {}", e)))?;

        let timeout = self.config.timeout();
        let output = tokio::time::timeout(
            timeout,
            tokio::process::Command::new(&self.config.interpreter)
                .args(&self.config.interpreter_args)
                .arg(script.path())
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let output = match output {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(
                    interpreter = %self.config.interpreter,
                    error = %e,
                    "Failed to start interpreter"
                );
                return Err(fault(format!("Failed to start interpreter: {}", e)));
            }
            // The child future was dropped here, which kills the process.
            Err(_) => {
                return Err(SandboxFailure::Timeout {
                    seconds: self.config.timeout_secs,
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if stdout.trim().is_empty() {
            return Err(fault(format!(
                "No output. Stderr: {}",
                truncate_chars(stderr.trim(), self.config.stderr_preview_chars)
            )));
        }

        match parse_output(&stdout) {
            Some(Ok(HarnessOutput::Completed { results, .. })) => Ok(results),
            Some(Ok(HarnessOutput::Failed { error })) => Err(fault(error)),
            Some(Err(_)) | None => Err(fault(format!(
                "Invalid JSON: {}",
                truncate_chars(stdout.trim(), self.config.stdout_preview_chars)
            ))),
        }
    }
}

fn collect_details(cases: &[TestCase], results: Vec<HarnessCaseResult>) -> SandboxReport {
    let details: Vec<CaseDetail> = cases
        .iter()
        .zip(results)
        .map(|(case, result)| CaseDetail {
            input: case.input.to_value(),
            expected: case.expected.clone(),
            got: result.got,
            error: result.error,
            passed: result.passed,
        })
        .collect();

    let passed = details.iter().filter(|d| d.passed).count();

    SandboxReport {
        passed: passed.min(cases.len()),
        total: cases.len(),
        details,
        failure: None,
    }
}

fn fault(diagnostic: impl Into<String>) -> SandboxFailure {
    SandboxFailure::Fault {
        diagnostic: diagnostic.into(),
    }
}

fn outcome_label(failure: &SandboxFailure) -> &'static str {
    match failure {
        SandboxFailure::NoCode => "no_code",
        SandboxFailure::Violation { .. } => "violation",
        SandboxFailure::Timeout { .. } => "timeout",
        SandboxFailure::Fault { .. } => "fault",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_credit_floors() {
        assert_eq!(partial_credit(25, 5, 5), 25);
        assert_eq!(partial_credit(30, 2, 4), 15);
        assert_eq!(partial_credit(25, 2, 3), 16);
        assert_eq!(partial_credit(40, 1, 3), 13);
        assert_eq!(partial_credit(40, 0, 3), 0);
    }

    #[test]
    fn test_partial_credit_without_cases() {
        assert_eq!(partial_credit(25, 0, 0), 0);
    }

    #[test]
    fn test_partial_credit_clamps_passed() {
        assert_eq!(partial_credit(30, 7, 4), 30);
    }

    #[test]
    fn test_screen_rejects_empty_source() {
        let runner = SandboxRunner::default();
        assert_eq!(runner.screen("   \n"), Err(SandboxFailure::NoCode));
    }

    #[test]
    fn test_screen_rejects_denied_patterns() {
        let runner = SandboxRunner::default();
        let source = "import socket\ndef solve(x):\n    return x";
        assert_eq!(
            runner.screen(source),
            Err(SandboxFailure::Violation {
                pattern: "socket".to_string()
            })
        );
        assert!(matches!(
            runner.screen("def solve(p):\n    return open(p).read()"),
            Err(SandboxFailure::Violation { .. })
        ));
    }

    #[test]
    fn test_screen_uses_configured_patterns() {
        let runner = SandboxRunner::new(SandboxConfig::default().with_deny_pattern("shutil"));
        assert!(runner.screen("import shutil").is_err());
        assert!(runner.screen("def solve(x):\n    return x").is_ok());
    }

    #[tokio::test]
    async fn test_violation_short_circuits_execution() {
        let runner = SandboxRunner::new(SandboxConfig::new("definitely-not-an-interpreter"));
        let cases = vec![TestCase::single(json!(1), json!(1))];
        let report = runner
            .run_tests("def solve(x):\n    return eval('x')", &cases)
            .await;

        assert_eq!(report.passed, 0);
        assert_eq!(report.total, 1);
        assert_eq!(
            report.failure,
            Some(SandboxFailure::Violation {
                pattern: "eval(".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_a_fault() {
        let runner = SandboxRunner::new(SandboxConfig::new("definitely-not-an-interpreter"));
        let cases = vec![TestCase::single(json!(1), json!(1))];
        let report = runner.run_tests("def solve(x):\n    return x", &cases).await;

        assert_eq!(report.passed, 0);
        assert!(matches!(report.failure, Some(SandboxFailure::Fault { .. })));
    }

    #[test]
    fn test_collect_details_pairs_cases_with_results() {
        let cases = vec![
            TestCase::single(json!([1, 2]), json!(3)),
            TestCase::args(vec![json!(2), json!(3)], json!(8)),
        ];
        let results = vec![
            HarnessCaseResult {
                passed: true,
                got: Some(json!(3)),
                error: None,
            },
            HarnessCaseResult {
                passed: false,
                got: None,
                error: Some("TypeError: bad".to_string()),
            },
        ];

        let report = collect_details(&cases, results);
        assert_eq!(report.passed, 1);
        assert_eq!(report.total, 2);
        assert_eq!(report.details[1].input, json!([2, 3]));
        assert_eq!(report.details[1].error.as_deref(), Some("TypeError: bad"));
        assert!(!report.all_passed());
    }
}
