//! Shared utility functions for etch-bench.
//!
//! Extraction of answers and source code from model responses, plus small
//! text helpers used when recording outcomes.

pub mod answer_extraction;
pub mod code_extraction;

pub use answer_extraction::extract_answer;
pub use code_extraction::{extract_code, extract_from_fenced_block, extract_function};

/// Return at most `max_chars` characters of `text`, respecting char boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
