//! Python harness that wraps generated code and runs it against test cases.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Prefix of the stdout line carrying the harness result.
///
/// Generated code may print freely; only the marked line is parsed.
pub const RESULT_MARKER: &str = "__ETCH_RESULT__";

/// How a test input is passed to the function under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseInput {
    /// A scalar, string or sequence passed as the only positional argument.
    Single(Value),
    /// A tuple of values unpacked into positional arguments.
    Args(Vec<Value>),
}

impl CaseInput {
    /// Positional arguments for the call.
    pub fn arguments(&self) -> Vec<Value> {
        match self {
            CaseInput::Single(value) => vec![value.clone()],
            CaseInput::Args(values) => values.clone(),
        }
    }

    /// Display form of the input, as recorded on case details.
    pub fn to_value(&self) -> Value {
        match self {
            CaseInput::Single(value) => value.clone(),
            CaseInput::Args(values) => Value::Array(values.clone()),
        }
    }
}

/// One (input, expected output) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: CaseInput,
    pub expected: Value,
}

impl TestCase {
    /// A case whose input is passed as a single argument.
    pub fn single(input: Value, expected: Value) -> Self {
        Self {
            input: CaseInput::Single(input),
            expected,
        }
    }

    /// A case whose inputs are unpacked into several arguments.
    pub fn args(inputs: Vec<Value>, expected: Value) -> Self {
        Self {
            input: CaseInput::Args(inputs),
            expected,
        }
    }
}

/// Per-case result line reported by the harness.
#[derive(Debug, Clone, Deserialize)]
pub struct HarnessCaseResult {
    pub passed: bool,
    #[serde(default)]
    pub got: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Parsed harness output.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HarnessOutput {
    Completed {
        passed: usize,
        results: Vec<HarnessCaseResult>,
    },
    Failed {
        error: String,
    },
}

const HARNESS_TEMPLATE: &str = r#"# -*- coding: utf-8 -*-
import json as _etch_json
import math as _etch_math

{source}


def _etch_find_callable():
    namespace = globals()
    for name in _etch_json.loads({entry_points}):
        candidate = namespace.get(name)
        if callable(candidate):
            return candidate
    for name, candidate in list(namespace.items()):
        if name.startswith("_") or not callable(candidate):
            continue
        if getattr(candidate, "__module__", None) == "__main__":
            return candidate
    return None


def _etch_matches(got, expected):
    if got == expected:
        return True
    if isinstance(got, tuple) and list(got) == expected:
        return True
    if isinstance(got, str) and isinstance(expected, str):
        return got.strip() == expected.strip()
    return False


def _etch_clean(value):
    if isinstance(value, float) and not _etch_math.isfinite(value):
        return repr(value)
    if isinstance(value, (list, tuple)):
        return [_etch_clean(item) for item in value]
    if isinstance(value, dict):
        return {
            key if isinstance(key, str) else repr(key): _etch_clean(item)
            for key, item in value.items()
        }
    return value


def _etch_emit(payload):
    try:
        line = _etch_json.dumps(payload, default=repr, allow_nan=False)
    except (TypeError, ValueError):
        line = _etch_json.dumps(_etch_clean(payload), default=repr, allow_nan=False)
    print({marker} + line, flush=True)


def _etch_run():
    cases = _etch_json.loads({cases})
    fn = _etch_find_callable()
    if fn is None:
        _etch_emit({"error": "No function found"})
        return
    passed = 0
    results = []
    for case in cases:
        try:
            got = fn(*case["args"])
            ok = _etch_matches(got, case["expected"])
            if ok:
                passed += 1
            results.append({"passed": ok, "got": got})
        except Exception as exc:
            results.append({"passed": False, "error": "%s: %s" % (type(exc).__name__, exc)})
    _etch_emit({"passed": passed, "total": len(cases), "results": results})


if __name__ == "__main__":
    _etch_run()
"#;

/// Render the harness script for `source` and `cases`.
pub fn build_harness(source: &str, cases: &[TestCase], entry_points: &[String]) -> String {
    let payload: Vec<Value> = cases
        .iter()
        .map(|case| json!({"args": case.input.arguments(), "expected": case.expected}))
        .collect();

    let entry_points = python_string_literal(&json!(entry_points).to_string());
    let marker = python_string_literal(RESULT_MARKER);
    let cases = python_string_literal(&Value::Array(payload).to_string());

    fill_placeholders(
        HARNESS_TEMPLATE,
        &[
            ("{source}", source),
            ("{entry_points}", entry_points.as_str()),
            ("{marker}", marker.as_str()),
            ("{cases}", cases.as_str()),
        ],
    )
}

/// Substitute every placeholder in one left-to-right pass.
///
/// Inserted values are never rescanned, so placeholder text inside the
/// source or the cases stays as written.
fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some((index, key, value)) = values
        .iter()
        .filter_map(|(key, value)| rest.find(key).map(|index| (index, *key, *value)))
        .min_by_key(|(index, _, _)| *index)
    {
        out.push_str(&rest[..index]);
        out.push_str(value);
        rest = &rest[index + key.len()..];
    }

    out.push_str(rest);
    out
}

/// Find and parse the marked result line in harness stdout.
pub fn parse_output(stdout: &str) -> Option<Result<HarnessOutput, serde_json::Error>> {
    stdout
        .lines()
        .rev()
        .find_map(|line| line.trim().strip_prefix(RESULT_MARKER))
        .map(|payload| serde_json::from_str(payload))
}

/// A JSON string literal is also a valid Python string literal.
fn python_string_literal(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_points() -> Vec<String> {
        vec!["solve".to_string(), "solution".to_string()]
    }

    #[test]
    fn test_case_input_arguments() {
        assert_eq!(
            CaseInput::Single(json!([1, 2, 3])).arguments(),
            vec![json!([1, 2, 3])]
        );
        assert_eq!(
            CaseInput::Args(vec![json!(1), json!("a")]).arguments(),
            vec![json!(1), json!("a")]
        );
    }

    #[test]
    fn test_harness_embeds_source_and_cases() {
        let cases = vec![TestCase::single(json!([1, 2, 3]), json!(6))];
        let harness = build_harness("def solve(nums): return sum(nums)", &cases, &entry_points());

        assert!(harness.contains("def solve(nums): return sum(nums)"));
        assert!(harness.contains(r#"\"args\":[[1,2,3]]"#));
        assert!(harness.contains(r#"\"expected\":6"#));
        assert!(harness.contains(r#""[\"solve\",\"solution\"]""#));
        assert!(!harness.contains("{cases}"));
    }

    #[test]
    fn test_source_placeholders_are_not_substituted() {
        let source = "def solve(x):\n    return '{cases}'";
        let harness = build_harness(source, &[], &entry_points());
        assert!(harness.contains("return '{cases}'"));
    }

    #[test]
    fn test_case_placeholders_are_not_substituted() {
        let cases = vec![TestCase::single(json!("{source}"), json!("{marker}"))];
        let source = "def solve(x):\n    return x";
        let harness = build_harness(source, &cases, &entry_points());

        assert_eq!(harness.matches(source).count(), 1);
        assert!(harness.contains(r#"\"args\":[\"{source}\"]"#));
        assert!(harness.contains(r#"\"expected\":\"{marker}\""#));
    }

    #[test]
    fn test_fill_placeholders_single_pass() {
        let filled = fill_placeholders("{a}-{b}-{a}", &[("{a}", "{b}"), ("{b}", "x")]);
        assert_eq!(filled, "{b}-x-{b}");
    }

    #[test]
    fn test_harness_emits_non_finite_values_as_text() {
        let harness = build_harness("def solve(x):\n    return x", &[], &entry_points());
        assert!(harness.contains("allow_nan=False"));
        assert!(harness.contains("_etch_math.isfinite"));
    }

    #[test]
    fn test_parse_output_ignores_user_prints() {
        let stdout = format!(
            "debug line\n{}{{\"passed\": 1, \"total\": 1, \"results\": [{{\"passed\": true, \"got\": 6}}]}}\n",
            RESULT_MARKER
        );
        let parsed = parse_output(&stdout).unwrap().unwrap();
        match parsed {
            HarnessOutput::Completed { passed, results } => {
                assert_eq!(passed, 1);
                assert_eq!(results[0].got, Some(json!(6)));
            }
            HarnessOutput::Failed { .. } => panic!("expected completed output"),
        }
    }

    #[test]
    fn test_parse_output_error_payload() {
        let stdout = format!("{}{{\"error\": \"No function found\"}}", RESULT_MARKER);
        assert!(matches!(
            parse_output(&stdout),
            Some(Ok(HarnessOutput::Failed { .. }))
        ));
    }

    #[test]
    fn test_parse_output_missing_marker() {
        assert!(parse_output("6\n").is_none());
    }
}
