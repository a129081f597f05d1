//! Sandboxed execution of model-generated Python.
//!
//! Generated code is screened against a deny list, wrapped in a harness that
//! calls the solution once per test case, and executed in a fresh interpreter
//! process with a hard wall-clock timeout.
//!
//! ```ignore
//! use etch_bench::sandbox::{SandboxRunner, TestCase, partial_credit};
//! use serde_json::json;
//!
//! let runner = SandboxRunner::default();
//! let cases = vec![TestCase::single(json!([1, 2, 3]), json!(6))];
//! let report = runner.run_tests("def solve(nums):\n    return sum(nums)", &cases).await;
//! let earned = partial_credit(25, report.passed, report.total);
//! ```

pub mod config;
pub mod harness;
pub mod runner;

pub use config::{SandboxConfig, DEFAULT_DENY_PATTERNS, DEFAULT_ENTRY_POINTS};
pub use harness::{build_harness, CaseInput, TestCase, RESULT_MARKER};
pub use runner::{partial_credit, CaseDetail, SandboxReport, SandboxRunner};
