//! Test tables for the reasoning and coding batteries.
//!
//! The built-in tables are the defaults. A YAML battery file with the same
//! shape can replace them:
//!
//! ```yaml
//! reasoning:
//!   - name: Basic Arithmetic
//!     prompt: "What is 17 + 28? Reply with just the number."
//!     category: math
//!     points: 10
//!     check: { type: number, value: 45 }
//! coding:
//!   - name: Sum of List
//!     difficulty: easy
//!     prompt: "Write a Python function called `solve(nums)` ..."
//!     points: 25
//!     cases:
//!       - input: { single: [1, 2, 3] }
//!         expected: 6
//! ```

use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ConfigError;
use crate::sandbox::TestCase;

/// Knowledge area of a reasoning test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Math,
    Logic,
    Knowledge,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Math, Category::Logic, Category::Knowledge];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Math => "math",
            Category::Logic => "logic",
            Category::Knowledge => "knowledge",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Difficulty tier of a coding test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicate deciding whether a reasoning answer is correct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerCheck {
    /// The answer contains `value` as a whole word.
    Number { value: i64 },
    /// The answer contains `word`, ignoring case.
    Contains { word: String },
    /// The answer contains `yes` and does not contain `no`, ignoring case.
    Affirmative { yes: String, no: String },
}

impl AnswerCheck {
    pub fn number(value: i64) -> Self {
        AnswerCheck::Number { value }
    }

    pub fn contains(word: impl Into<String>) -> Self {
        AnswerCheck::Contains { word: word.into() }
    }

    pub fn affirmative(yes: impl Into<String>, no: impl Into<String>) -> Self {
        AnswerCheck::Affirmative {
            yes: yes.into(),
            no: no.into(),
        }
    }

    /// Returns true if `answer` satisfies this check.
    pub fn matches(&self, answer: &str) -> bool {
        match self {
            AnswerCheck::Number { value } => {
                let pattern = format!(r"\b{}\b", regex::escape(&value.to_string()));
                Regex::new(&pattern)
                    .map(|re| re.is_match(answer))
                    .unwrap_or(false)
            }
            AnswerCheck::Contains { word } => {
                answer.to_lowercase().contains(&word.to_lowercase())
            }
            AnswerCheck::Affirmative { yes, no } => {
                let lowered = answer.to_lowercase();
                lowered.contains(&yes.to_lowercase()) && !lowered.contains(&no.to_lowercase())
            }
        }
    }
}

/// A single-prompt question with a checkable answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningTest {
    pub name: String,
    pub prompt: String,
    pub category: Category,
    pub points: u32,
    pub check: AnswerCheck,
}

/// A function-writing task scored against input/output cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodingTest {
    pub name: String,
    pub difficulty: Difficulty,
    pub prompt: String,
    pub points: u32,
    pub cases: Vec<TestCase>,
}

/// The complete set of tests a model is evaluated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    #[serde(default)]
    pub reasoning: Vec<ReasoningTest>,
    #[serde(default)]
    pub coding: Vec<CodingTest>,
}

impl Default for Battery {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Battery {
    /// The built-in battery: 8 reasoning tests (100 points) and 5 coding
    /// tests (150 points).
    pub fn builtin() -> Self {
        Self {
            reasoning: builtin_reasoning_tests(),
            coding: builtin_coding_tests(),
        }
    }

    /// Load a battery from a YAML file and validate it.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse a battery from YAML text and validate it.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let battery: Battery = serde_yaml::from_str(content)?;
        battery.validate()?;
        Ok(battery)
    }

    /// Checks that every test has a name, a prompt and positive points.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reasoning.is_empty() && self.coding.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "battery contains no tests".to_string(),
            ));
        }

        let entries = self
            .reasoning
            .iter()
            .map(|t| (&t.name, &t.prompt, t.points))
            .chain(self.coding.iter().map(|t| (&t.name, &t.prompt, t.points)));

        for (name, prompt, points) in entries {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "test name cannot be empty".to_string(),
                ));
            }
            if prompt.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "test '{}' has an empty prompt",
                    name
                )));
            }
            if points == 0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "test '{}' must be worth at least one point",
                    name
                )));
            }
        }

        Ok(())
    }

    pub fn reasoning_points(&self) -> u32 {
        self.reasoning.iter().map(|t| t.points).sum()
    }

    pub fn coding_points(&self) -> u32 {
        self.coding.iter().map(|t| t.points).sum()
    }
}

fn reasoning(
    name: &str,
    prompt: &str,
    category: Category,
    points: u32,
    check: AnswerCheck,
) -> ReasoningTest {
    ReasoningTest {
        name: name.to_string(),
        prompt: prompt.to_string(),
        category,
        points,
        check,
    }
}

fn builtin_reasoning_tests() -> Vec<ReasoningTest> {
    vec![
        reasoning(
            "Basic Arithmetic",
            "What is 17 + 28? Reply with just the number.",
            Category::Math,
            10,
            AnswerCheck::number(45),
        ),
        reasoning(
            "Multiplication",
            "What is 12 × 15? Reply with just the number.",
            Category::Math,
            10,
            AnswerCheck::number(180),
        ),
        reasoning(
            "Word Problem",
            "A store sells apples for $2 each. If you buy 7 apples and pay with a $20 bill, \
             how much change do you get? Just the number.",
            Category::Math,
            10,
            AnswerCheck::number(6),
        ),
        reasoning(
            "Sequence Pattern",
            "What comes next in this sequence: 2, 6, 12, 20, 30, ? Reply with just the number.",
            Category::Logic,
            15,
            AnswerCheck::number(42),
        ),
        reasoning(
            "Logical Deduction",
            "All roses are flowers. Some flowers fade quickly. Can we conclude that some roses \
             fade quickly? Answer yes or no only.",
            Category::Logic,
            15,
            AnswerCheck::contains("no"),
        ),
        reasoning(
            "Comparison Logic",
            "If A > B, B > C, and C > D, is A > D? Answer yes or no only.",
            Category::Logic,
            15,
            AnswerCheck::affirmative("yes", "no"),
        ),
        reasoning(
            "Factual Knowledge",
            "What is the capital of France? Reply with just the city name.",
            Category::Knowledge,
            10,
            AnswerCheck::contains("paris"),
        ),
        reasoning(
            "Reading Comprehension",
            "Read this: 'The blue car is faster than the red car. The green car is slower than \
             the red car.' Which car is the slowest? Reply with just the color.",
            Category::Knowledge,
            15,
            AnswerCheck::contains("green"),
        ),
    ]
}

fn coding(
    name: &str,
    difficulty: Difficulty,
    prompt: &str,
    points: u32,
    cases: Vec<(Value, Value)>,
) -> CodingTest {
    CodingTest {
        name: name.to_string(),
        difficulty,
        prompt: prompt.to_string(),
        points,
        cases: cases
            .into_iter()
            .map(|(input, expected)| TestCase::single(input, expected))
            .collect(),
    }
}

fn builtin_coding_tests() -> Vec<CodingTest> {
    vec![
        coding(
            "Sum of List",
            Difficulty::Easy,
            "Write a Python function called `solve(nums)` that returns the sum of all numbers in the list.\n\
             Example: solve([1, 2, 3]) should return 6\n\
             Return ONLY the function definition, no explanations.",
            25,
            vec![
                (json!([1, 2, 3]), json!(6)),
                (json!([0, 0, 0]), json!(0)),
                (json!([-1, 1, 5]), json!(5)),
                (json!([10]), json!(10)),
                (json!([]), json!(0)),
            ],
        ),
        coding(
            "Find Maximum",
            Difficulty::Easy,
            "Write a Python function called `solve(nums)` that returns the maximum number in the list.\n\
             Example: solve([1, 5, 3]) should return 5\n\
             Return ONLY the function definition, no explanations.",
            25,
            vec![
                (json!([1, 5, 3]), json!(5)),
                (json!([-1, -5, -3]), json!(-1)),
                (json!([7]), json!(7)),
                (json!([0, 0, 1]), json!(1)),
            ],
        ),
        coding(
            "Count Vowels",
            Difficulty::Medium,
            "Write a Python function called `solve(text)` that returns the count of vowels (a, e, i, o, u) in the string.\n\
             Example: solve(\"hello\") should return 2\n\
             Return ONLY the function definition, no explanations.",
            30,
            vec![
                (json!("hello"), json!(2)),
                (json!("AEIOU"), json!(5)),
                (json!("xyz"), json!(0)),
                (json!("Programming"), json!(3)),
                (json!(""), json!(0)),
            ],
        ),
        coding(
            "Reverse Words",
            Difficulty::Medium,
            "Write a Python function called `solve(text)` that reverses the order of words in a string.\n\
             Example: solve(\"hello world\") should return \"world hello\"\n\
             Return ONLY the function definition, no explanations.",
            30,
            vec![
                (json!("hello world"), json!("world hello")),
                (json!("a b c"), json!("c b a")),
                (json!("single"), json!("single")),
                (json!("  spaced  "), json!("spaced")),
            ],
        ),
        coding(
            "Fibonacci Sequence",
            Difficulty::Hard,
            "Write a Python function called `solve(n)` that returns the nth Fibonacci number (0-indexed).\n\
             F(0)=0, F(1)=1, F(n)=F(n-1)+F(n-2)\n\
             Example: solve(6) should return 8 (sequence: 0,1,1,2,3,5,8)\n\
             Return ONLY the function definition, no explanations.",
            40,
            vec![
                (json!(0), json!(0)),
                (json!(1), json!(1)),
                (json!(6), json!(8)),
                (json!(10), json!(55)),
                (json!(15), json!(610)),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_point_totals() {
        let battery = Battery::builtin();
        assert_eq!(battery.reasoning.len(), 8);
        assert_eq!(battery.coding.len(), 5);
        assert_eq!(battery.reasoning_points(), 100);
        assert_eq!(battery.coding_points(), 150);
        assert!(battery.validate().is_ok());
    }

    #[test]
    fn test_number_check_is_whole_word() {
        let check = AnswerCheck::number(45);
        assert!(check.matches("45"));
        assert!(check.matches("The answer is 45."));
        assert!(!check.matches("145"));
        assert!(!check.matches("4 5"));
        assert!(!check.matches("forty-five"));
    }

    #[test]
    fn test_basic_arithmetic_needs_digits() {
        let battery = Battery::builtin();
        let arithmetic = battery
            .reasoning
            .iter()
            .find(|t| t.name == "Basic Arithmetic")
            .unwrap();
        assert!(arithmetic.check.matches("The answer is 45."));
        assert!(!arithmetic.check.matches("forty-five"));
    }

    #[test]
    fn test_contains_check_ignores_case() {
        assert!(AnswerCheck::contains("paris").matches("PARIS"));
        assert!(!AnswerCheck::contains("green").matches("blue"));
    }

    #[test]
    fn test_affirmative_check() {
        let check = AnswerCheck::affirmative("yes", "no");
        assert!(check.matches("Yes"));
        assert!(!check.matches("yes and no"));
        assert!(!check.matches("No"));
    }

    #[test]
    fn test_battery_yaml_roundtrip_fields() {
        let yaml = r#"
reasoning:
  - name: Sum
    prompt: "What is 2 + 2?"
    category: math
    points: 5
    check: { type: number, value: 4 }
coding:
  - name: Add
    difficulty: easy
    prompt: "Write solve(a, b)"
    points: 10
    cases:
      - input: { args: [1, 2] }
        expected: 3
"#;
        let battery = Battery::from_yaml_str(yaml).unwrap();
        assert_eq!(battery.reasoning[0].check, AnswerCheck::number(4));
        assert_eq!(
            battery.coding[0].cases[0],
            TestCase::args(vec![json!(1), json!(2)], json!(3))
        );
    }

    #[test]
    fn test_battery_validation_rejects_zero_points() {
        let yaml = r#"
reasoning:
  - name: Free
    prompt: "Anything"
    category: logic
    points: 0
    check: { type: contains, word: "x" }
"#;
        assert!(matches!(
            Battery::from_yaml_str(yaml),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_empty_battery_is_invalid() {
        let battery = Battery {
            reasoning: Vec::new(),
            coding: Vec::new(),
        };
        assert!(battery.validate().is_err());
    }
}
