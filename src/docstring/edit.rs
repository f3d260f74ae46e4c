use serde::{Deserialize, Serialize};

use crate::docstring::{format_docstring, match_line_endings, parse_docstring};
use crate::entity::{split_lines_keep_ends, strip_line_ending, CodeEntity, NamedEntity};
use crate::models::{ProtocolPosition, ProtocolRange};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("docstrings can only be written for classes and functions, not a {0}")]
    NotNamed(String),
    #[error("position {line}:{character} is outside the document")]
    OutOfBounds { line: u32, character: u32 },
    #[error("insertion point {0} falls inside the removed range")]
    Overlap(ProtocolPosition),
    #[error("`{0}` has its body on the header line; move the body to its own line first")]
    InlineBody(String),
}

/// Text edits that replace or add the docstring of one entity.
///
/// All positions are protocol coordinates in the original document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocstringEdit {
    /// Whole lines of the existing docstring, if there is one.
    pub removal: Option<ProtocolRange>,
    pub insert_at: ProtocolPosition,
    /// Formatted docstring, terminated by a newline.
    pub text: String,
}

/// Plan the edits that put `generated` in place as the docstring of
/// `entity`, formatted one level deeper than the entity itself.
pub fn plan_docstring_edit(
    entity: &CodeEntity,
    generated: &str,
    on_new_line: bool,
    document: &str,
) -> Result<DocstringEdit, EditError> {
    let named = entity
        .as_named()
        .ok_or_else(|| EditError::NotNamed(entity.kind().to_string()))?;

    if has_inline_body(named) {
        return Err(EditError::InlineBody(named.name().to_string()));
    }

    let body = parse_docstring(generated);
    let text = match_line_endings(
        document,
        &format_docstring(&body, named.indent_level() + 1, on_new_line),
    );

    let (removal, insert_at) = match named.docstring_range() {
        Some(existing) => {
            let range = existing.to_protocol();
            let start = ProtocolPosition::new(range.start.line, 0);
            let end = ProtocolPosition::new(range.end.line + 1, 0);
            (Some(ProtocolRange { start, end }), start)
        }
        None => {
            let header_end = named.signature_end().to_protocol();
            (None, ProtocolPosition::new(header_end.line + 1, 0))
        }
    };

    tracing::debug!(
        entity = named.name(),
        replaces_existing = removal.is_some(),
        %insert_at,
        "planned docstring edit"
    );
    Ok(DocstringEdit {
        removal,
        insert_at,
        text,
    })
}

/// Whether code follows the header colon on the same line, as in
/// `def f(): return 1`. A trailing comment does not count.
fn has_inline_body(named: &NamedEntity) -> bool {
    let signature_end = named.signature_end();
    let row = named.to_relative_position(signature_end).line as usize;
    named
        .code_lines()
        .get(row)
        .and_then(|line| strip_line_ending(line).get(signature_end.column()..))
        .is_some_and(|rest| {
            let rest = rest.trim_start();
            !rest.is_empty() && !rest.starts_with('#')
        })
}

impl DocstringEdit {
    /// Apply the edit to `source`, which must be the document the edit
    /// was planned against.
    pub fn apply(&self, source: &str) -> Result<String, EditError> {
        let mut insert = byte_offset(source, self.insert_at)?;
        let mut patched = source.to_string();

        if let Some(removal) = self.removal {
            let start = byte_offset(source, removal.start)?;
            let end = byte_offset(source, removal.end)?;
            if insert > start && insert < end {
                return Err(EditError::Overlap(self.insert_at));
            }
            if insert >= end {
                insert -= end - start;
            }
            patched.replace_range(start..end, "");
        }

        patched.insert_str(insert, &self.text);
        Ok(patched)
    }
}

/// Byte offset of a protocol position. The line just past the last one
/// is valid at column 0.
fn byte_offset(source: &str, position: ProtocolPosition) -> Result<usize, EditError> {
    let out_of_bounds = || EditError::OutOfBounds {
        line: position.line,
        character: position.character,
    };

    let mut offset = 0;
    for (row, line) in split_lines_keep_ends(source).into_iter().enumerate() {
        if row == position.line as usize {
            let column = position.character as usize;
            if column > line.len() || !line.is_char_boundary(column) {
                return Err(out_of_bounds());
            }
            return Ok(offset + column);
        }
        offset += line.len();
    }

    if position.character == 0 {
        Ok(source.len())
    } else {
        Err(out_of_bounds())
    }
}
