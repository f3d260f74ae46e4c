//! Post-processing for generated docstrings.
//!
//! Generated text arrives in whatever shape the generator produced
//! (bare text, a quoted literal, a fenced code block, a whole function).
//! [`parse_docstring`] recovers the docstring body and
//! [`format_docstring`] turns it into an indented literal ready to be
//! inserted under a definition header.

use std::sync::LazyLock;

use regex::Regex;

use crate::entity::{split_lines_keep_ends, INDENT_WIDTH};

mod edit;

pub use edit::{plan_docstring_edit, DocstringEdit, EditError};

const QUOTES: &str = "\"\"\"";

static TRIPLE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)"""(.+?)""""#).expect("valid docstring pattern"));

static EDGE_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:[\s`'"]*[\r\n]+)+|[\s`'"]*$"#).expect("valid edge pattern")
});

/// Extract the docstring body from generated text.
///
/// Takes the contents of the first `"""` pair when there is one, drops
/// leading blank or quote-only lines and trailing whitespace, quotes and
/// backticks, then removes the first line's indentation from every line
/// that carries it.
pub fn parse_docstring(raw: &str) -> String {
    let body = TRIPLE_QUOTED
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map_or(raw, |body| body.as_str());

    let body = EDGE_NOISE.replace_all(body, "");

    let lines = split_lines_keep_ends(&body);
    let indent = lines
        .first()
        .map(|line| line.len() - line.trim_start_matches(' ').len())
        .unwrap_or(0);
    if indent == 0 {
        return body.into_owned();
    }

    let prefix = " ".repeat(indent);
    lines
        .into_iter()
        .map(|line| line.strip_prefix(prefix.as_str()).unwrap_or(line))
        .collect()
}

/// Wrap a docstring body in triple quotes, indented `indent_level`
/// levels, followed by a newline.
///
/// Multi-line bodies get a newline before the closing quotes, and one
/// after the opening quotes when `on_new_line` is set.
pub fn format_docstring(text: &str, indent_level: u32, on_new_line: bool) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let body = if lines.len() > 1 {
        let joined = lines.join("\n");
        if on_new_line {
            format!("\n{joined}\n")
        } else {
            format!("{joined}\n")
        }
    } else {
        text.to_string()
    };

    let literal = format!("{QUOTES}{body}{QUOTES}");
    let indent = " ".repeat(indent_level as usize * INDENT_WIDTH);
    let mut formatted: String = split_lines_keep_ends(&literal)
        .into_iter()
        .map(|line| format!("{indent}{line}"))
        .collect();
    formatted.push('\n');
    formatted
}

/// Line terminator used by `text`, judged from its first line.
pub fn line_ending(text: &str) -> &'static str {
    match text.split_once('\n') {
        Some((first, _)) if first.ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

/// Rewrite `text` to use the same line terminator as `document`.
pub fn match_line_endings(document: &str, text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    match line_ending(document) {
        "\n" => normalized,
        ending => normalized.replace('\n', ending),
    }
}
