//! Analyzer backend trait, registry and shared syntax helpers.
//!
//! Two backends resolve the entity under a cursor:
//!
//! - `structural` walks the tree-sitter syntax tree with a
//!   cursor-pruned visitor and rebuilds entity text by slicing the
//!   original source lines.
//! - `symbols` builds a lexical scope table once per source and answers
//!   queries by locating the innermost scope and following parent links.
//!
//! Both must agree on name, kind, code, docstring range and signature
//! end for any `(source, cursor)` pair. The helpers in this module are
//! the pieces of tree knowledge they share (docstring shape, logical
//! end of a definition, cursor containment).

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::{Arc, OnceLock};

use tree_sitter::{Node, Parser, Point, Tree};

use crate::entity::{split_lines_keep_ends, strip_line_ending, CodeEntity, EntityKind};
use crate::models::{DocumentPosition, DocumentRange, InvalidPosition};

pub mod structural;
pub mod symbols;
mod tokenize;

/// Errors raised while creating an analyzer or resolving an entity.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// The requested backend name is not registered.
    #[error("\"{0}\" analyzer is not supported")]
    UnsupportedBackend(String),
    /// The source failed to parse.
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: u32,
        column: u32,
        message: String,
    },
    /// An invariant that holds for any source the parser accepted was
    /// violated. This is a defect, not a recoverable condition.
    #[error("internal analyzer error: {0}")]
    Internal(String),
    #[error("failed to load the Python grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),
    /// The cursor cannot be expressed in document coordinates.
    #[error("invalid cursor: {0}")]
    Position(#[from] InvalidPosition),
}

impl AnalyzerError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(reason = %message, "analyzer invariant violated");
        AnalyzerError::Internal(message)
    }
}

/// Convenience result type used throughout the analyzer layer.
pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

/// Capability contract implemented by every backend.
///
/// Cursors are document positions (1-based lines). Each instance owns
/// its parsed source and never mutates it, so independent instances
/// can be used from different threads at the same time.
pub trait CodeAnalyzer: Send + Sync {
    /// Canonical registry name of this backend.
    fn name(&self) -> &'static str;

    /// Innermost function, class or module enclosing the cursor.
    fn get_context(&self, cursor: DocumentPosition) -> AnalyzerResult<CodeEntity>;

    /// Innermost function enclosing the cursor, if any.
    fn get_function(&self, cursor: DocumentPosition) -> AnalyzerResult<Option<CodeEntity>>;

    /// Innermost class enclosing the cursor, if any.
    fn get_class(&self, cursor: DocumentPosition) -> AnalyzerResult<Option<CodeEntity>>;

    /// The module entity for the whole source.
    fn get_module(&self, cursor: DocumentPosition) -> AnalyzerResult<CodeEntity>;
}

/// Constructor stored in the registry for each backend.
pub type AnalyzerConstructor = fn(&str) -> AnalyzerResult<Box<dyn CodeAnalyzer>>;

/// Name-keyed table of backend constructors.
#[derive(Default)]
pub struct AnalyzerRegistry {
    constructors: BTreeMap<String, AnalyzerConstructor>,
    aliases: BTreeMap<String, String>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend constructor under `name`. Re-registering a
    /// name replaces the previous constructor.
    pub fn register(&mut self, name: &str, constructor: AnalyzerConstructor) {
        self.constructors
            .insert(name.to_ascii_lowercase(), constructor);
    }

    /// Register an alternative name that resolves to `target`.
    pub fn register_alias(&mut self, alias: &str, target: &str) {
        self.aliases
            .insert(alias.to_ascii_lowercase(), target.to_ascii_lowercase());
    }

    /// Names of all registered backends, sorted.
    pub fn available_names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Canonical name for `name`, following aliases. Lookups are
    /// case-insensitive.
    pub fn canonical_name(&self, name: &str) -> Option<String> {
        let lower = name.to_ascii_lowercase();
        let canonical = self.aliases.get(&lower).cloned().unwrap_or(lower);
        self.constructors
            .contains_key(&canonical)
            .then_some(canonical)
    }

    /// Instantiate the backend registered under `name` for `source`.
    pub fn create(&self, name: &str, source: &str) -> AnalyzerResult<Box<dyn CodeAnalyzer>> {
        let canonical = self
            .canonical_name(name)
            .ok_or_else(|| AnalyzerError::UnsupportedBackend(name.to_string()))?;
        let constructor = self.constructors[&canonical];
        tracing::debug!(backend = %canonical, bytes = source.len(), "creating analyzer");
        constructor(source)
    }
}

/// Process-wide registry holding the built-in backends.
///
/// It is populated on first use and read-only afterwards.
pub fn registry() -> &'static AnalyzerRegistry {
    static REGISTRY: OnceLock<AnalyzerRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = AnalyzerRegistry::new();
        structural::register(&mut registry);
        symbols::register(&mut registry);
        registry
    })
}

/// Shorthand for `registry().create(name, source)`.
pub fn create_analyzer(name: &str, source: &str) -> AnalyzerResult<Box<dyn CodeAnalyzer>> {
    registry().create(name, source)
}

/// A parsed Python source shared by the backends.
#[derive(Debug)]
pub(crate) struct ParsedSource {
    source: Arc<str>,
    tree: Tree,
    /// Byte range of every line, terminator included. Only `\n`
    /// separates lines, which matches how tree-sitter counts rows.
    lines: Vec<Range<usize>>,
}

impl ParsedSource {
    /// Parse `source`, rejecting trees that contain syntax errors.
    pub(crate) fn parse(source: &str) -> AnalyzerResult<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_python::LANGUAGE.into();
        parser.set_language(&language)?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| AnalyzerError::internal("tree-sitter did not produce a tree"))?;

        if let Some(node) = first_error_node(tree.root_node()) {
            let position = DocumentPosition::from_point(node.start_position());
            let message = if node.is_missing() {
                format!("missing `{}`", node.kind())
            } else {
                "invalid syntax".to_string()
            };
            tracing::debug!(%position, reason = %message, "rejecting source with syntax errors");
            return Err(AnalyzerError::Syntax {
                line: position.line,
                column: position.character,
                message,
            });
        }

        let mut lines = Vec::new();
        let mut offset = 0;
        for line in split_lines_keep_ends(source) {
            lines.push(offset..offset + line.len());
            offset += line.len();
        }

        let parsed = Self {
            source: Arc::from(source),
            tree,
            lines,
        };
        if let Some((point, message)) = parsed.first_rejected_statement() {
            let position = DocumentPosition::from_point(point);
            tracing::debug!(%position, reason = message, "rejecting source the grammar accepted");
            return Err(AnalyzerError::Syntax {
                line: position.line,
                column: position.character,
                message: message.to_string(),
            });
        }
        Ok(parsed)
    }

    /// Earliest statement that the grammar accepts but Python 3 does not:
    /// Python 2 `print`/`exec` statements and statements whose
    /// indentation differs from their siblings.
    fn first_rejected_statement(&self) -> Option<(Point, &'static str)> {
        let mut rejected = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "print_statement" if !has_child_of_kind(node, "chevron") => {
                    rejected.push((node.start_position(), "Python 2 print statement"));
                }
                "exec_statement" => {
                    rejected.push((node.start_position(), "Python 2 exec statement"));
                }
                "module" | "block" => rejected.extend(self.misindented_statement(node)),
                _ => {}
            }
            let mut cursor = node.walk();
            stack.extend(node.named_children(&mut cursor));
        }
        rejected
            .into_iter()
            .min_by_key(|(point, _)| (point.row, point.column))
    }

    /// First statement of `container` starting a line at a column other
    /// than its siblings'. Module statements start at column 0.
    fn misindented_statement(&self, container: Node<'_>) -> Option<(Point, &'static str)> {
        let mut expected = (container.kind() == "module").then_some(0);
        let mut cursor = container.walk();
        for statement in container.named_children(&mut cursor) {
            if statement.kind() == "comment" {
                continue;
            }
            let start = statement.start_position();
            let before = self.line_text(start.row).get(..start.column).unwrap_or_default();
            if !before.trim().is_empty() {
                // Shares its line with a header or a previous statement.
                continue;
            }
            match expected {
                None => expected = Some(start.column),
                Some(column) if column == start.column => {}
                Some(_) => return Some((start, "indentation does not match the enclosing block")),
            }
        }
        None
    }

    pub(crate) fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn shared_source(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }

    pub(crate) fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub(crate) fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Line `row` (0-based) including its terminator; empty past the end.
    pub(crate) fn line(&self, row: usize) -> &str {
        self.lines
            .get(row)
            .map(|range| &self.source[range.clone()])
            .unwrap_or_default()
    }

    /// Line `row` without its terminator.
    pub(crate) fn line_text(&self, row: usize) -> &str {
        strip_line_ending(self.line(row))
    }

    pub(crate) fn node_text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or_default()
    }
}

fn first_error_node(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error_node(child) {
            return Some(found);
        }
    }
    // `has_error` was set but no child carries it: blame the node.
    Some(node)
}

fn has_child_of_kind(node: Node<'_>, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|child| child.kind() == kind);
    found
}

/// Entity kind of a definition node, if it is one.
pub(crate) fn definition_kind(node: Node<'_>) -> Option<EntityKind> {
    match node.kind() {
        "module" => Some(EntityKind::Module),
        "class_definition" => Some(EntityKind::Class),
        "function_definition" => Some(EntityKind::Function),
        _ => None,
    }
}

/// Name of a class or function definition.
pub(crate) fn definition_name<'s>(parsed: &'s ParsedSource, node: Node<'_>) -> AnalyzerResult<&'s str> {
    let name = node
        .child_by_field_name("name")
        .ok_or_else(|| AnalyzerError::internal(format!("{} has no name", node.kind())))?;
    Ok(parsed.node_text(name))
}

/// First statement of a definition body (or of the module), skipping
/// comments.
pub(crate) fn first_statement(node: Node<'_>) -> Option<Node<'_>> {
    let container = if node.kind() == "module" {
        node
    } else {
        node.child_by_field_name("body")?
    };
    let mut cursor = container.walk();
    let first = container
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment");
    first
}

/// Range of the docstring literal of a module, class or function.
///
/// A docstring exists iff the first body statement is a bare string
/// expression. Byte strings, f-strings and t-strings do not count.
pub(crate) fn docstring_range(parsed: &ParsedSource, node: Node<'_>) -> Option<DocumentRange> {
    let statement = first_statement(node)?;
    if statement.kind() != "expression_statement" || statement.named_child_count() != 1 {
        return None;
    }

    let mut literal = statement.named_child(0)?;
    while literal.kind() == "parenthesized_expression" && literal.named_child_count() == 1 {
        literal = literal.named_child(0)?;
    }

    let is_docstring = match literal.kind() {
        "string" => is_text_string(parsed, literal),
        "concatenated_string" => {
            let mut cursor = literal.walk();
            let all_text = literal
                .named_children(&mut cursor)
                .filter(|part| part.kind() != "comment")
                .all(|part| part.kind() == "string" && is_text_string(parsed, part));
            all_text
        }
        _ => false,
    };

    is_docstring.then(|| DocumentRange::from_points(literal.start_position(), literal.end_position()))
}

fn is_text_string(parsed: &ParsedSource, node: Node<'_>) -> bool {
    parsed
        .node_text(node)
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .all(|c| !matches!(c.to_ascii_lowercase(), 'b' | 'f' | 't'))
}

/// End of the last real token of `node`.
///
/// Trailing comments that tree-sitter attaches to a block are not part
/// of a definition.
pub(crate) fn logical_end(node: Node<'_>) -> Point {
    let mut current = node;
    loop {
        let mut cursor = current.walk();
        let last = current
            .children(&mut cursor)
            .filter(|child| child.kind() != "comment" && child.end_byte() > child.start_byte())
            .last();
        match last {
            Some(child) => current = child,
            None => return current.end_position(),
        }
    }
}

/// Whether `cursor` falls inside a node spanning `start..=end`.
///
/// The line span is inclusive on both ends. On the node's first line
/// the cursor must be strictly past the starting column.
pub(crate) fn cursor_within(start: DocumentPosition, end: DocumentPosition, cursor: DocumentPosition) -> bool {
    if cursor.line < start.line || cursor.line > end.line {
        return false;
    }
    cursor.line != start.line || cursor.character > start.character
}

/// Count of leading whitespace characters divided by the indent unit.
pub(crate) fn indent_level(first_line: &str) -> u32 {
    let width = first_line
        .chars()
        .take_while(|c| c.is_whitespace() && *c != '\n' && *c != '\r')
        .count();
    (width / crate::entity::INDENT_WIDTH) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentPosition as Pos;

    #[test]
    fn registry_lists_builtin_backends() {
        let names = registry().available_names();
        assert_eq!(names, vec!["structural".to_string(), "symbols".to_string()]);
    }

    #[test]
    fn registry_resolves_aliases_case_insensitively() {
        assert_eq!(registry().canonical_name("AST").as_deref(), Some("structural"));
        assert_eq!(registry().canonical_name("scopes").as_deref(), Some("symbols"));
        assert_eq!(registry().canonical_name("Symbols").as_deref(), Some("symbols"));
        assert!(registry().canonical_name("jedi").is_none());
    }

    #[test]
    fn registry_rejects_unknown_backend() {
        let err = create_analyzer("nope", "x = 1\n").err().expect("error");
        match err {
            AnalyzerError::UnsupportedBackend(name) => assert_eq!(name, "nope"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn custom_registry_accepts_new_backends() {
        fn build(source: &str) -> AnalyzerResult<Box<dyn CodeAnalyzer>> {
            Ok(Box::new(structural::StructuralAnalyzer::new(source)?))
        }

        let mut registry = AnalyzerRegistry::new();
        registry.register("Custom", build);
        assert_eq!(registry.available_names(), vec!["custom".to_string()]);

        let analyzer = registry.create("custom", "x = 1\n").expect("analyzer");
        assert_eq!(analyzer.name(), "structural");
    }

    #[test]
    fn parse_reports_syntax_error_location() {
        let err = ParsedSource::parse("def broken(:\n    pass\n").expect_err("syntax error");
        match err {
            AnalyzerError::Syntax { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    fn syntax_error(source: &str) -> (u32, u32, String) {
        match ParsedSource::parse(source).expect_err("syntax error") {
            AnalyzerError::Syntax {
                line,
                column,
                message,
            } => (line, column, message),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn python2_statements_are_rejected() {
        let (line, column, message) = syntax_error("print 'hello'\nexec 'x'\n");
        assert_eq!((line, column), (1, 0));
        assert_eq!(message, "Python 2 print statement");

        let (line, _, message) = syntax_error("x = 1\nexec 'x'\n");
        assert_eq!(line, 2);
        assert_eq!(message, "Python 2 exec statement");

        let (line, column, _) = syntax_error("def f():\n    return 1\nprint 'x'\n");
        assert_eq!((line, column), (3, 0));
    }

    #[test]
    fn python3_print_and_exec_calls_are_accepted() {
        for source in [
            "print('hello')\n",
            "print('a', 'b', sep='')\n",
            "exec('x = 1')\n",
            "print = 1\n",
        ] {
            assert!(ParsedSource::parse(source).is_ok(), "{source:?}");
        }
    }

    #[test]
    fn dedent_to_unknown_column_is_rejected() {
        let (line, column, message) = syntax_error("def f():\n        return 1\n    x = 2\n");
        assert_eq!((line, column), (3, 4));
        assert_eq!(message, "indentation does not match the enclosing block");

        let source = "class A:\n    def f(self):\n            return 1\n        x = 2\n";
        let (line, column, _) = syntax_error(source);
        assert_eq!((line, column), (4, 8));
    }

    #[test]
    fn consistent_indentation_is_accepted() {
        for source in [
            "class A:\n    def f(self):\n        x = (1,\n  2)\n        return x\n\n    # note\n    y = 1\n",
            "if x: a = 1; b = 2\nelse:\n\tpass\n",
            "def f(): return 1\n",
            "s = '''\n  text\n'''\nt = 1\n",
        ] {
            assert!(ParsedSource::parse(source).is_ok(), "{source:?}");
        }
    }

    #[test]
    fn lines_split_only_on_newlines() {
        let parsed = ParsedSource::parse("a = 1\r\nb = '\x0c'\n").expect("parsed");
        assert_eq!(parsed.line_count(), 2);
        assert_eq!(parsed.line(0), "a = 1\r\n");
        assert_eq!(parsed.line_text(0), "a = 1");
        assert_eq!(parsed.line_text(1), "b = '\x0c'");
        assert_eq!(parsed.line(7), "");
    }

    #[test]
    fn cursor_column_only_matters_on_first_line() {
        let start = Pos::new(2, 4);
        let end = Pos::new(5, 10);
        assert!(!cursor_within(start, end, Pos::new(2, 4)));
        assert!(cursor_within(start, end, Pos::new(2, 5)));
        assert!(cursor_within(start, end, Pos::new(3, 0)));
        assert!(cursor_within(start, end, Pos::new(5, 99)));
        assert!(!cursor_within(start, end, Pos::new(6, 5)));
        assert!(!cursor_within(start, end, Pos::new(1, 5)));
    }

    #[test]
    fn docstring_requires_plain_string_statement() {
        let source = "def a():\n    \"\"\"doc\"\"\"\n\ndef b():\n    b\"raw\"\n\ndef c():\n    f\"{x}\"\n\ndef d():\n    x = 'no'\n";
        let parsed = ParsedSource::parse(source).expect("parsed");
        let root = parsed.root();
        let mut cursor = root.walk();
        let functions: Vec<Node> = root
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "function_definition")
            .collect();
        assert_eq!(functions.len(), 4);

        let range = docstring_range(&parsed, functions[0]).expect("docstring");
        assert_eq!(range.start, Pos::new(2, 4));
        assert_eq!(range.end, Pos::new(2, 13));
        assert!(docstring_range(&parsed, functions[1]).is_none());
        assert!(docstring_range(&parsed, functions[2]).is_none());
        assert!(docstring_range(&parsed, functions[3]).is_none());
    }

    #[test]
    fn logical_end_skips_trailing_comments() {
        let source = "def f():\n    return 1\n    # trailing\n";
        let parsed = ParsedSource::parse(source).expect("parsed");
        let function = parsed.root().named_child(0).expect("function");
        let end = logical_end(function);
        assert_eq!(end, Point { row: 1, column: 12 });
    }

    #[test]
    fn indent_level_counts_whole_units() {
        assert_eq!(indent_level("def f():"), 0);
        assert_eq!(indent_level("    def f():"), 1);
        assert_eq!(indent_level("      def f():"), 1);
        assert_eq!(indent_level("        class A:"), 2);
    }
}
