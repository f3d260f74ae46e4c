//! Code entities returned by the analyzers.
//!
//! An entity is a module, class or function together with its verbatim
//! source text and the positions a caller needs to edit its docstring.
//! Entities are built once per resolution and never change afterwards;
//! cleaning produces a new string rather than a new entity.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cleaner::{self, CleanError};
use crate::models::{DocumentPosition, DocumentRange, LocalPosition};

/// Columns per indentation level.
pub const INDENT_WIDTH: usize = 4;

/// Kind of a code entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Module,
    Class,
    Function,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Module => "module",
            EntityKind::Class => "class",
            EntityKind::Function => "function",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn empty_source() -> Arc<str> {
    Arc::from("")
}

/// The module entity: the whole source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleEntity {
    code: String,
    docstring_range: Option<DocumentRange>,
}

impl ModuleEntity {
    pub(crate) fn new(code: String, docstring_range: Option<DocumentRange>) -> Self {
        Self {
            code,
            docstring_range,
        }
    }
}

/// A class or function entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedEntity {
    name: String,
    /// Verbatim text, first line padded back to its original column.
    code: String,
    /// Absolute position of the definition in the source.
    code_range: DocumentRange,
    /// Position just past the header colon, or the end of the header
    /// line when a comment follows the colon.
    signature_end: DocumentPosition,
    docstring_range: Option<DocumentRange>,
    indent_level: u32,
    /// The originating source text. Never mutated.
    #[serde(skip, default = "empty_source")]
    source: Arc<str>,
}

impl NamedEntity {
    pub(crate) fn new(
        name: String,
        code: String,
        code_range: DocumentRange,
        signature_end: DocumentPosition,
        docstring_range: Option<DocumentRange>,
        source: Arc<str>,
    ) -> Self {
        let indent_level = split_lines_keep_ends(&code)
            .first()
            .map(|line| crate::analyzer::indent_level(line))
            .unwrap_or(0);
        Self {
            name,
            code,
            code_range,
            signature_end,
            docstring_range,
            indent_level,
            source,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn code_lines(&self) -> Vec<&str> {
        split_lines_keep_ends(&self.code)
    }

    pub fn code_range(&self) -> DocumentRange {
        self.code_range
    }

    pub fn signature_end(&self) -> DocumentPosition {
        self.signature_end
    }

    pub fn docstring_range(&self) -> Option<DocumentRange> {
        self.docstring_range
    }

    pub fn indent_level(&self) -> u32 {
        self.indent_level
    }

    /// Source text the entity was resolved from. Empty for entities
    /// received over the wire.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn to_relative_position(&self, position: DocumentPosition) -> LocalPosition {
        LocalPosition::new(
            position.line.saturating_sub(self.code_range.start.line),
            position.character,
        )
    }
}

/// A function, class or module resolved at a cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CodeEntity {
    Module(ModuleEntity),
    Class(NamedEntity),
    Function(NamedEntity),
}

impl CodeEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            CodeEntity::Module(_) => EntityKind::Module,
            CodeEntity::Class(_) => EntityKind::Class,
            CodeEntity::Function(_) => EntityKind::Function,
        }
    }

    /// Class or function payload, `None` for the module.
    pub fn as_named(&self) -> Option<&NamedEntity> {
        match self {
            CodeEntity::Module(_) => None,
            CodeEntity::Class(named) | CodeEntity::Function(named) => Some(named),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.as_named().map(NamedEntity::name)
    }

    pub fn code(&self) -> &str {
        match self {
            CodeEntity::Module(module) => &module.code,
            CodeEntity::Class(named) | CodeEntity::Function(named) => &named.code,
        }
    }

    /// Code split into lines, each keeping its terminator, so that
    /// `code_lines().concat() == code()`.
    pub fn code_lines(&self) -> Vec<&str> {
        split_lines_keep_ends(self.code())
    }

    pub fn docstring_range(&self) -> Option<DocumentRange> {
        match self {
            CodeEntity::Module(module) => module.docstring_range,
            CodeEntity::Class(named) | CodeEntity::Function(named) => named.docstring_range,
        }
    }

    /// Rebase an absolute position onto the entity's own lines.
    pub fn to_relative_position(&self, position: DocumentPosition) -> LocalPosition {
        match self {
            CodeEntity::Module(_) => {
                LocalPosition::new(position.line.saturating_sub(1), position.character)
            }
            CodeEntity::Class(named) | CodeEntity::Function(named) => {
                named.to_relative_position(position)
            }
        }
    }

    /// Apply every cleaning method except those named in `skip`.
    pub fn clean<S: AsRef<str>>(&self, skip: &[S]) -> Result<String, CleanError> {
        cleaner::clean(self, skip)
    }
}

/// Split text into lines at `\n`, keeping terminators.
///
/// `\r\n` stays attached to its line; a lone `\r`, form feed or other
/// control character never starts a new line.
pub fn split_lines_keep_ends(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// Remove a trailing `\n` or `\r\n`.
pub fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|rest| rest.strip_suffix('\r').unwrap_or(rest))
        .unwrap_or(line)
}

/// Replace every character of a line prefix with a space, except tabs
/// and form feeds, so that padded text keeps its original columns.
pub(crate) fn pad_whitespace(prefix: &str) -> String {
    prefix
        .chars()
        .map(|c| if matches!(c, '\t' | '\x0c') { c } else { ' ' })
        .collect()
}
