//! Coordinate types shared by the analyzers, entities and callers.
//!
//! Three conventions coexist and each has its own type so that a raw
//! `(line, character)` pair never crosses a boundary untagged:
//!
//! - [`ProtocolPosition`]: 0-based line, used by editors and the
//!   public request/response payloads.
//! - [`DocumentPosition`]: 1-based line, used by the analyzers and
//!   by every position stored on a `CodeEntity`.
//! - [`LocalPosition`]: 0-based line relative to the first line of a
//!   single entity's code.
//!
//! In every convention `character` is a 0-based UTF-8 byte column,
//! which is the unit tree-sitter reports.

use std::fmt;

use serde::{Deserialize, Serialize};
use tree_sitter::Point;

/// Position in editor-protocol coordinates (0-based line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProtocolPosition {
    pub line: u32,
    pub character: u32,
}

/// Position in document coordinates (1-based line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPosition")]
pub struct DocumentPosition {
    pub line: u32,
    pub character: u32,
}

/// Wire shape of a document position before line validation.
#[derive(Deserialize)]
struct RawPosition {
    line: u32,
    character: u32,
}

impl TryFrom<RawPosition> for DocumentPosition {
    type Error = InvalidPosition;

    fn try_from(raw: RawPosition) -> Result<Self, Self::Error> {
        if raw.line == 0 {
            return Err(InvalidPosition::ZeroLine);
        }
        Ok(Self {
            line: raw.line,
            character: raw.character,
        })
    }
}

/// A position that has no counterpart in another convention.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPosition {
    #[error("line {0} is out of range")]
    LineOutOfRange(u32),
    #[error("document lines start at 1")]
    ZeroLine,
}

/// Position relative to the first line of an entity (0-based line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalPosition {
    pub line: u32,
    pub character: u32,
}

impl ProtocolPosition {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl DocumentPosition {
    /// Create a document position.
    ///
    /// Document lines start at 1; a zero line is clamped to 1 so the
    /// value stays convertible to protocol coordinates.
    pub fn new(line: u32, character: u32) -> Self {
        Self {
            line: line.max(1),
            character,
        }
    }

    /// Fails for the last representable protocol line, which has no
    /// document line.
    pub fn from_protocol(position: ProtocolPosition) -> Result<Self, InvalidPosition> {
        let line = position
            .line
            .checked_add(1)
            .ok_or(InvalidPosition::LineOutOfRange(position.line))?;
        Ok(Self {
            line,
            character: position.character,
        })
    }

    pub fn to_protocol(self) -> ProtocolPosition {
        ProtocolPosition {
            line: self.line.saturating_sub(1),
            character: self.character,
        }
    }

    /// Convert a tree-sitter point (0-based row, byte column).
    pub(crate) fn from_point(point: Point) -> Self {
        Self {
            line: point.row as u32 + 1,
            character: point.column as u32,
        }
    }

    /// 0-based row index into the source lines.
    pub(crate) fn row(self) -> usize {
        self.line.saturating_sub(1) as usize
    }

    pub(crate) fn column(self) -> usize {
        self.character as usize
    }
}

impl LocalPosition {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl fmt::Display for ProtocolPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}

impl fmt::Display for DocumentPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}

/// Error returned when a range would end before it starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("range end {end} precedes start {start}")]
pub struct InvalidRange {
    pub start: String,
    pub end: String,
}

/// Ordered pair of protocol positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolRange {
    pub start: ProtocolPosition,
    pub end: ProtocolPosition,
}

/// Ordered pair of document positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRange {
    pub start: DocumentPosition,
    pub end: DocumentPosition,
}

impl ProtocolRange {
    pub fn new(start: ProtocolPosition, end: ProtocolPosition) -> Result<Self, InvalidRange> {
        if start > end {
            return Err(InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Empty range at a single position, used for insertions.
    pub fn empty(at: ProtocolPosition) -> Self {
        Self { start: at, end: at }
    }
}

impl DocumentRange {
    pub fn new(start: DocumentPosition, end: DocumentPosition) -> Result<Self, InvalidRange> {
        if start > end {
            return Err(InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Build a range from tree-sitter points, which are ordered by
    /// construction for any single node.
    pub(crate) fn from_points(start: Point, end: Point) -> Self {
        let start = DocumentPosition::from_point(start);
        let end = DocumentPosition::from_point(end);
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn from_protocol(range: ProtocolRange) -> Result<Self, InvalidPosition> {
        Ok(Self {
            start: DocumentPosition::from_protocol(range.start)?,
            end: DocumentPosition::from_protocol(range.end)?,
        })
    }

    pub fn to_protocol(self) -> ProtocolRange {
        ProtocolRange {
            start: self.start.to_protocol(),
            end: self.end.to_protocol(),
        }
    }

    /// Whether `position` lies inside the range (both ends inclusive).
    pub fn contains(&self, position: DocumentPosition) -> bool {
        self.start <= position && position <= self.end
    }
}

impl fmt::Display for DocumentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
