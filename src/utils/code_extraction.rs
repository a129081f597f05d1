//! Source code extraction from free-form model responses.
//!
//! # Extraction Strategies
//!
//! 1. The first fenced code block (```` ```python ```` or a bare fence)
//! 2. The first `def name(...):` line plus the lines that belong to it
//!
//! If neither matches, the result is an empty string, which callers treat as
//! "no code" rather than an execution error.
//!
//! # Example
//!
//! ```
//! use etch_bench::utils::code_extraction::extract_code;
//!
//! let response = "```python\ndef solve(nums): return sum(nums)\n```";
//! assert_eq!(extract_code(response), "def solve(nums): return sum(nums)");
//! ```

use std::sync::LazyLock;

use regex::Regex;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)```(?:python)?\s*([\s\S]*?)```").expect("fenced block pattern is valid")
});

static FUNCTION_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"def\s+\w+\s*\([^)]*\):").expect("function pattern is valid")
});

/// Extract Python source from a model response.
pub fn extract_code(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let code = if let Some(block) = extract_from_fenced_block(text) {
        block
    } else if let Some(function) = extract_function(text) {
        function
    } else {
        return String::new();
    };

    if looks_escaped(&code) {
        unescape(&code).trim().to_string()
    } else {
        code
    }
}

/// Return the trimmed body of the first fenced code block.
pub fn extract_from_fenced_block(text: &str) -> Option<String> {
    FENCED_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Return the first function definition and the lines belonging to it.
///
/// Collection stops at a second `def` at the same or shallower indent, or at
/// a dedented non-blank line that is neither a comment nor a string
/// continuation. A `return` at the base indent is still kept.
pub fn extract_function(text: &str) -> Option<String> {
    let start = FUNCTION_DEF.find(text)?.start();

    let mut collected: Vec<&str> = Vec::new();
    let mut base_indent: Option<usize> = None;

    for line in text[start..].split('\n') {
        let stripped = line.trim();
        if stripped.is_empty() {
            if base_indent.is_some() {
                collected.push(line);
            }
            continue;
        }

        let indent = line.len() - line.trim_start().len();

        let Some(base) = base_indent else {
            if stripped.starts_with("def ") {
                base_indent = Some(indent);
                collected.push(line);
            }
            continue;
        };

        if stripped.starts_with("def ") {
            if indent <= base {
                break;
            }
            collected.push(line);
            continue;
        }

        let continuation = stripped.starts_with('#')
            || stripped.starts_with('"')
            || stripped.starts_with('\'');
        let dedented = indent < base || (indent == base && !stripped.starts_with("return"));
        if dedented && !continuation {
            break;
        }
        collected.push(line);
    }

    let code = collected.join("\n").trim().to_string();
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}

/// True when the code is a single line carrying literal `\n` or `\t`
/// escapes outside of any string literal.
fn looks_escaped(code: &str) -> bool {
    if code.contains('\n') {
        return false;
    }

    let mut quote: Option<char> = None;
    let mut chars = code.chars();
    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(_), '\\') => {
                chars.next();
            }
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\\') => match chars.next() {
                Some('n') | Some('t') => return true,
                _ => {}
            },
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, _) => {}
        }
    }
    false
}

/// Replace the common backslash escapes with the characters they stand for.
fn unescape(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut chars = code.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            _ => {
                out.push('\\');
                continue;
            }
        }
        chars.next();
    }

    out
}
