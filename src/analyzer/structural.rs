use tree_sitter::Node;

use crate::analyzer::tokenize::top_level_colons;
use crate::analyzer::{
    cursor_within, definition_kind, definition_name, docstring_range, first_statement,
    logical_end, AnalyzerError, AnalyzerRegistry, AnalyzerResult, CodeAnalyzer, ParsedSource,
};
use crate::entity::{
    pad_whitespace, split_lines_keep_ends, strip_line_ending, CodeEntity, EntityKind,
    ModuleEntity, NamedEntity,
};
use crate::models::{DocumentPosition, DocumentRange};

/// Syntax-tree backend.
///
/// Resolves the enclosing entity with a depth-first walk that only
/// enters nodes containing the cursor, and rebuilds entity text by
/// slicing the original source lines.
pub struct StructuralAnalyzer {
    parsed: ParsedSource,
}

pub const NAME: &str = "structural";

fn construct(source: &str) -> AnalyzerResult<Box<dyn CodeAnalyzer>> {
    Ok(Box::new(StructuralAnalyzer::new(source)?))
}

pub(crate) fn register(registry: &mut AnalyzerRegistry) {
    registry.register(NAME, construct);
    registry.register_alias("ast", NAME);
}

impl StructuralAnalyzer {
    pub fn new(source: &str) -> AnalyzerResult<Self> {
        Ok(Self {
            parsed: ParsedSource::parse(source)?,
        })
    }

    fn resolve(&self, cursor: DocumentPosition) -> ContextResolver<'_> {
        ContextResolver::resolve(cursor, self.parsed.root())
    }

    fn entity_for(&self, node: Node<'_>) -> AnalyzerResult<CodeEntity> {
        match definition_kind(node) {
            Some(EntityKind::Module) => Ok(CodeEntity::Module(ModuleEntity::new(
                self.parsed.source().to_string(),
                docstring_range(&self.parsed, node),
            ))),
            Some(EntityKind::Class) => Ok(CodeEntity::Class(self.named_entity(node)?)),
            Some(EntityKind::Function) => Ok(CodeEntity::Function(self.named_entity(node)?)),
            None => Err(AnalyzerError::internal(format!(
                "{} is not a context node",
                node.kind()
            ))),
        }
    }

    fn named_entity(&self, node: Node<'_>) -> AnalyzerResult<NamedEntity> {
        let code_range = DocumentRange::from_points(node.start_position(), logical_end(node));
        let code = self.segment(code_range, true)?;
        let signature_end = signature_end(node, code_range, &code)?;

        Ok(NamedEntity::new(
            definition_name(&self.parsed, node)?.to_string(),
            code,
            code_range,
            signature_end,
            docstring_range(&self.parsed, node),
            self.parsed.shared_source(),
        ))
    }

    /// Source text covered by `range`, sliced from the original lines.
    ///
    /// With `padded`, the first line is left-padded up to the start
    /// column so columns inside the segment match the source.
    fn segment(&self, range: DocumentRange, padded: bool) -> AnalyzerResult<String> {
        let (start_row, start_col) = (range.start.row(), range.start.column());
        let (end_row, end_col) = (range.end.row(), range.end.column());
        let out_of_bounds = || AnalyzerError::internal(format!("segment {range} is out of bounds"));

        let first = self.parsed.line(start_row);
        let mut segment = if padded {
            pad_whitespace(first.get(..start_col).ok_or_else(out_of_bounds)?)
        } else {
            String::new()
        };

        if start_row == end_row {
            segment.push_str(first.get(start_col..end_col).ok_or_else(out_of_bounds)?);
            return Ok(segment);
        }

        segment.push_str(first.get(start_col..).ok_or_else(out_of_bounds)?);
        for row in start_row + 1..end_row {
            segment.push_str(self.parsed.line(row));
        }
        let last = self.parsed.line(end_row);
        segment.push_str(last.get(..end_col).ok_or_else(out_of_bounds)?);
        Ok(segment)
    }
}

/// Signature end of a definition whose padded code is `code`.
///
/// The header (code up to where the body starts) is tokenized on its
/// own and the last top-level colon wins. A comment right after the
/// colon pushes the end to the end of that line.
fn signature_end(
    node: Node<'_>,
    code_range: DocumentRange,
    code: &str,
) -> AnalyzerResult<DocumentPosition> {
    let body = first_statement(node).ok_or_else(|| {
        AnalyzerError::internal(format!("{} at {} has no body", node.kind(), code_range.start))
    })?;
    let body_start = DocumentPosition::from_point(body.start_position());
    let header_rows = (body_start.line - code_range.start.line) as usize;

    let lines = split_lines_keep_ends(code);
    let mut header: Vec<&str> = lines.iter().take(header_rows + 1).copied().collect();
    if let Some(last) = header.last_mut() {
        let text = strip_line_ending(last);
        *last = text.get(..body_start.column()).unwrap_or(text);
    }

    let colon = top_level_colons(&header.concat())
        .last()
        .copied()
        .ok_or_else(|| {
            AnalyzerError::internal(format!(
                "colon not found in header of {} at {}",
                node.kind(),
                code_range.start
            ))
        })?;

    let colon_line = strip_line_ending(header.get(colon.line).copied().unwrap_or_default());
    let mut end = DocumentPosition::new(
        code_range.start.line + colon.line as u32,
        colon.end_column as u32,
    );
    let rest = colon_line.get(colon.end_column..).unwrap_or_default();
    if rest.trim_start().starts_with('#') {
        end.character = colon_line.len() as u32;
    }
    Ok(end)
}

impl CodeAnalyzer for StructuralAnalyzer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn get_context(&self, cursor: DocumentPosition) -> AnalyzerResult<CodeEntity> {
        let resolver = self.resolve(cursor);
        let node = resolver
            .current_context()
            .ok_or_else(|| AnalyzerError::internal("module node was not visited"))?;
        tracing::debug!(%cursor, kind = node.kind(), backend = NAME, "resolved context");
        self.entity_for(node)
    }

    fn get_function(&self, cursor: DocumentPosition) -> AnalyzerResult<Option<CodeEntity>> {
        self.resolve(cursor)
            .find_last(EntityKind::Function)
            .map(|node| self.entity_for(node))
            .transpose()
    }

    fn get_class(&self, cursor: DocumentPosition) -> AnalyzerResult<Option<CodeEntity>> {
        self.resolve(cursor)
            .find_last(EntityKind::Class)
            .map(|node| self.entity_for(node))
            .transpose()
    }

    fn get_module(&self, cursor: DocumentPosition) -> AnalyzerResult<CodeEntity> {
        let node = self
            .resolve(cursor)
            .find_last(EntityKind::Module)
            .unwrap_or_else(|| self.parsed.root());
        self.entity_for(node)
    }
}

/// Node visitor with one hook per context kind.
trait SyntaxVisitor<'t> {
    fn visit_module(&mut self, node: Node<'t>);
    fn visit_class(&mut self, node: Node<'t>);
    fn visit_function(&mut self, node: Node<'t>);
    fn visit_default(&mut self, node: Node<'t>);
}

/// Tracks the module, class and function nodes enclosing a cursor.
struct ContextResolver<'t> {
    cursor: DocumentPosition,
    stack: Vec<Node<'t>>,
}

impl<'t> ContextResolver<'t> {
    fn resolve(cursor: DocumentPosition, root: Node<'t>) -> Self {
        let mut resolver = Self {
            cursor,
            stack: Vec::new(),
        };
        resolver.visit(root);
        resolver
    }

    /// Whether the walk should enter `node`.
    ///
    /// The module has no meaningful position and is always entered.
    fn should_visit(&self, node: Node<'t>) -> bool {
        let end = match definition_kind(node) {
            Some(EntityKind::Module) => return true,
            Some(_) => logical_end(node),
            None => node.end_position(),
        };
        cursor_within(
            DocumentPosition::from_point(node.start_position()),
            DocumentPosition::from_point(end),
            self.cursor,
        )
    }

    fn visit(&mut self, node: Node<'t>) {
        if !self.should_visit(node) {
            return;
        }
        match definition_kind(node) {
            Some(EntityKind::Module) => self.visit_module(node),
            Some(EntityKind::Class) => self.visit_class(node),
            Some(EntityKind::Function) => self.visit_function(node),
            None => self.visit_default(node),
        }
    }

    fn visit_children(&mut self, node: Node<'t>) {
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    fn find_last(&self, kind: EntityKind) -> Option<Node<'t>> {
        self.stack
            .iter()
            .rev()
            .copied()
            .find(|node| definition_kind(*node) == Some(kind))
    }

    fn current_context(&self) -> Option<Node<'t>> {
        self.stack.last().copied()
    }
}

impl<'t> SyntaxVisitor<'t> for ContextResolver<'t> {
    fn visit_module(&mut self, node: Node<'t>) {
        self.stack.push(node);
        self.visit_children(node);
    }

    fn visit_class(&mut self, node: Node<'t>) {
        self.stack.push(node);
        self.visit_children(node);
    }

    fn visit_function(&mut self, node: Node<'t>) {
        self.stack.push(node);
        self.visit_children(node);
    }

    fn visit_default(&mut self, node: Node<'t>) {
        self.visit_children(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(source: &str, line: u32, character: u32) -> CodeEntity {
        let analyzer = StructuralAnalyzer::new(source).expect("analyzer");
        analyzer
            .get_context(DocumentPosition::new(line, character))
            .expect("context")
    }

    #[test]
    fn resolves_innermost_nested_function() {
        let source = "def outer():\n    def inner():\n        pass\n    return None\n";
        let inner = context(source, 3, 8);
        assert_eq!(inner.name(), Some("inner"));
        assert_eq!(inner.code(), "    def inner():\n        pass");

        let outer = context(source, 4, 6);
        assert_eq!(outer.name(), Some("outer"));
    }

    #[test]
    fn cursor_before_definition_column_stays_outside() {
        let source = "class A:\n    def m(self):\n        pass\n";
        let entity = context(source, 2, 4);
        assert_eq!(entity.kind(), EntityKind::Class);
        let entity = context(source, 2, 5);
        assert_eq!(entity.kind(), EntityKind::Function);
    }

    #[test]
    fn decorated_function_starts_at_def() {
        let source = "@decorator\ndef f():\n    return 1\n";
        let entity = context(source, 2, 3);
        let named = entity.as_named().expect("named");
        assert_eq!(named.code(), "def f():\n    return 1");
        assert_eq!(named.code_range().start, DocumentPosition::new(2, 0));
    }

    #[test]
    fn trailing_comment_is_not_part_of_function() {
        let source = "def f():\n    return 1\n    # done\n";
        let entity = context(source, 2, 6);
        assert_eq!(entity.code(), "def f():\n    return 1");
        assert_eq!(context(source, 3, 6).kind(), EntityKind::Module);
    }

    #[test]
    fn unpadded_segment_starts_at_column() {
        let source = "class A:\n    def m(self):\n        pass\n";
        let analyzer = StructuralAnalyzer::new(source).expect("analyzer");
        let range = DocumentRange::new(DocumentPosition::new(2, 4), DocumentPosition::new(3, 12))
            .expect("range");
        assert_eq!(
            analyzer.segment(range, false).expect("segment"),
            "def m(self):\n        pass"
        );
        assert_eq!(
            analyzer.segment(range, true).expect("segment"),
            "    def m(self):\n        pass"
        );
    }

    #[test]
    fn tab_indentation_is_preserved_when_padding() {
        let source = "class A:\n\tdef m(self):\n\t\tpass\n";
        let entity = context(source, 2, 3);
        assert_eq!(entity.code(), "\tdef m(self):\n\t\tpass");
    }

    #[test]
    fn signature_end_skips_colons_in_defaults() {
        let source = "def f(a={'k': 1},\n      b=lambda: 2) -> dict:\n    return a\n";
        let entity = context(source, 1, 3);
        let named = entity.as_named().expect("named");
        assert_eq!(named.signature_end(), DocumentPosition::new(2, 27));
    }

    #[test]
    fn get_function_and_class_walk_the_stack() {
        let source = "class A:\n    def m(self):\n        x = 1\n";
        let analyzer = StructuralAnalyzer::new(source).expect("analyzer");
        let cursor = DocumentPosition::new(3, 9);

        let function = analyzer.get_function(cursor).expect("ok").expect("function");
        assert_eq!(function.name(), Some("m"));
        let class = analyzer.get_class(cursor).expect("ok").expect("class");
        assert_eq!(class.name(), Some("A"));
        let module = analyzer.get_module(cursor).expect("module");
        assert_eq!(module.kind(), EntityKind::Module);

        let top = DocumentPosition::new(1, 0);
        assert!(analyzer.get_function(top).expect("ok").is_none());
        assert!(analyzer.get_class(top).expect("ok").is_none());
    }

    #[test]
    fn syntax_errors_propagate() {
        let err = StructuralAnalyzer::new("def f(:\n").err().expect("error");
        assert!(matches!(err, AnalyzerError::Syntax { .. }));
    }
}
