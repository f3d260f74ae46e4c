//! Cleaning pipeline: reduce an entity's code before it goes into a prompt.
//!
//! Every method decides which original lines to drop (or how to reshape
//! them) against the entity's untouched `code_lines`, then a single pass
//! builds the output. No method ever sees another method's result.

use std::collections::BTreeSet;
use std::fmt;

use crate::entity::{split_lines_keep_ends, strip_line_ending, CodeEntity, INDENT_WIDTH};

/// A named cleaning transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CleaningMethod {
    Docstring,
    Comments,
    BlankLines,
    Indentation,
}

impl CleaningMethod {
    pub const ALL: [CleaningMethod; 4] = [
        CleaningMethod::Docstring,
        CleaningMethod::Comments,
        CleaningMethod::BlankLines,
        CleaningMethod::Indentation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CleaningMethod::Docstring => "docstring",
            CleaningMethod::Comments => "comments",
            CleaningMethod::BlankLines => "blank_lines",
            CleaningMethod::Indentation => "indentation",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.as_str() == name)
    }
}

impl fmt::Display for CleaningMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CleanError {
    /// Names in the skip list that are not cleaning methods of the entity.
    #[error("unsupported cleaning methods: {}", .0.join(", "))]
    UnknownMethods(Vec<String>),
}

/// Methods applicable to `entity`. Indentation only applies to classes
/// and functions.
pub fn supported_methods(entity: &CodeEntity) -> Vec<CleaningMethod> {
    CleaningMethod::ALL
        .into_iter()
        .filter(|method| *method != CleaningMethod::Indentation || entity.as_named().is_some())
        .collect()
}

/// Apply every supported method except those named in `skip`.
pub fn clean<S: AsRef<str>>(entity: &CodeEntity, skip: &[S]) -> Result<String, CleanError> {
    let supported = supported_methods(entity);

    let mut unknown = BTreeSet::new();
    let mut skipped = BTreeSet::new();
    for name in skip {
        let name = name.as_ref();
        match CleaningMethod::from_name(name).filter(|method| supported.contains(method)) {
            Some(method) => {
                skipped.insert(method);
            }
            None => {
                unknown.insert(name.to_string());
            }
        }
    }
    if !unknown.is_empty() {
        return Err(CleanError::UnknownMethods(unknown.into_iter().collect()));
    }

    let enabled: BTreeSet<CleaningMethod> = supported
        .into_iter()
        .filter(|method| !skipped.contains(method))
        .collect();
    tracing::debug!(
        kind = %entity.kind(),
        methods = ?enabled.iter().map(CleaningMethod::as_str).collect::<Vec<_>>(),
        "cleaning entity"
    );

    let lines = entity.code_lines();
    let mut keep = vec![true; lines.len()];

    if enabled.contains(&CleaningMethod::Docstring) {
        if let Some(range) = entity.docstring_range() {
            let first = entity.to_relative_position(range.start).line as usize;
            let last = entity.to_relative_position(range.end).line as usize;
            for flag in keep.iter_mut().take(last + 1).skip(first) {
                *flag = false;
            }
        }
    }
    if enabled.contains(&CleaningMethod::Comments) {
        for (flag, line) in keep.iter_mut().zip(&lines) {
            if line.trim_start().starts_with('#') {
                *flag = false;
            }
        }
    }
    if enabled.contains(&CleaningMethod::BlankLines) {
        for (flag, line) in keep.iter_mut().zip(&lines) {
            if line.trim().is_empty() {
                *flag = false;
            }
        }
    }

    let strip_width = match entity.as_named() {
        Some(named) if enabled.contains(&CleaningMethod::Indentation) => {
            named.indent_level() as usize * INDENT_WIDTH
        }
        _ => 0,
    };

    let mut cleaned: String = lines
        .iter()
        .zip(&keep)
        .filter(|(_, keep)| **keep)
        .map(|(line, _)| strip_indentation(line, strip_width))
        .collect();

    let code = entity.code();
    if !code.ends_with('\n') {
        let trimmed = strip_line_ending(&cleaned).len();
        cleaned.truncate(trimmed);
    }
    Ok(cleaned)
}

/// Remove up to `width` leading whitespace characters, leaving the line
/// terminator and any non-whitespace text alone.
fn strip_indentation(line: &str, width: usize) -> &str {
    let start = line
        .char_indices()
        .take(width)
        .find(|(_, c)| !c.is_whitespace() || matches!(c, '\n' | '\r'))
        .map(|(index, _)| index)
        .unwrap_or_else(|| {
            line.char_indices()
                .nth(width)
                .map(|(index, _)| index)
                .unwrap_or(line.len())
        });
    &line[start..]
}

/// Lines of a cleaned snippet, without terminators.
pub fn cleaned_lines(cleaned: &str) -> Vec<&str> {
    split_lines_keep_ends(cleaned)
        .into_iter()
        .map(strip_line_ending)
        .collect()
}
