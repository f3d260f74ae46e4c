use tree_sitter::{Node, TreeCursor};

use crate::analyzer::{
    cursor_within, definition_kind, definition_name, docstring_range, logical_end,
    AnalyzerError, AnalyzerRegistry, AnalyzerResult, CodeAnalyzer, ParsedSource,
};
use crate::entity::{CodeEntity, EntityKind, ModuleEntity, NamedEntity};
use crate::models::{DocumentPosition, DocumentRange};

pub const NAME: &str = "symbols";

const MODULE_SCOPE: usize = 0;

/// A lexical scope: the module, a class or a function.
#[derive(Debug, Clone)]
struct Scope {
    kind: EntityKind,
    name: String,
    parent: Option<usize>,
    children: Vec<usize>,
    range: DocumentRange,
    signature_end: Option<DocumentPosition>,
    docstring: Option<DocumentRange>,
}

/// Scope-table backend.
///
/// The table is built once when the analyzer is created. Queries find
/// the innermost scope containing the cursor and walk parent links;
/// entity text is taken line by line from the source.
pub struct SymbolTableAnalyzer {
    parsed: ParsedSource,
    scopes: Vec<Scope>,
}

fn construct(source: &str) -> AnalyzerResult<Box<dyn CodeAnalyzer>> {
    Ok(Box::new(SymbolTableAnalyzer::new(source)?))
}

pub(crate) fn register(registry: &mut AnalyzerRegistry) {
    registry.register(NAME, construct);
    registry.register_alias("scopes", NAME);
}

impl SymbolTableAnalyzer {
    pub fn new(source: &str) -> AnalyzerResult<Self> {
        let parsed = ParsedSource::parse(source)?;
        let scopes = ScopeTableBuilder::new(&parsed).build()?;
        tracing::debug!(scopes = scopes.len(), backend = NAME, "built scope table");
        Ok(Self { parsed, scopes })
    }

    fn scope(&self, index: usize) -> AnalyzerResult<&Scope> {
        self.scopes
            .get(index)
            .ok_or_else(|| AnalyzerError::internal(format!("scope {index} does not exist")))
    }

    /// Index of the innermost scope containing `cursor`.
    fn innermost(&self, cursor: DocumentPosition) -> AnalyzerResult<usize> {
        let mut current = MODULE_SCOPE;
        'descend: loop {
            for &child in &self.scope(current)?.children {
                let range = self.scope(child)?.range;
                if cursor_within(range.start, range.end, cursor) {
                    current = child;
                    continue 'descend;
                }
            }
            return Ok(current);
        }
    }

    /// Nearest scope of `kind` at or above the innermost scope.
    fn enclosing(&self, cursor: DocumentPosition, kind: EntityKind) -> AnalyzerResult<Option<usize>> {
        let mut current = Some(self.innermost(cursor)?);
        while let Some(index) = current {
            let scope = self.scope(index)?;
            if scope.kind == kind {
                return Ok(Some(index));
            }
            current = scope.parent;
        }
        Ok(None)
    }

    fn entity_for(&self, index: usize) -> AnalyzerResult<CodeEntity> {
        let scope = self.scope(index)?;
        if scope.kind == EntityKind::Module {
            return Ok(CodeEntity::Module(ModuleEntity::new(
                self.parsed.source().to_string(),
                scope.docstring,
            )));
        }

        let signature_end = scope.signature_end.ok_or_else(|| {
            AnalyzerError::internal(format!("{} `{}` has no signature", scope.kind, scope.name))
        })?;
        let named = NamedEntity::new(
            scope.name.clone(),
            self.lines_text(scope.range)?,
            scope.range,
            signature_end,
            scope.docstring,
            self.parsed.shared_source(),
        );
        Ok(match scope.kind {
            EntityKind::Class => CodeEntity::Class(named),
            _ => CodeEntity::Function(named),
        })
    }

    /// Whole lines from the start of `range`, the last one cut at the
    /// end column.
    fn lines_text(&self, range: DocumentRange) -> AnalyzerResult<String> {
        let (start_row, end_row) = (range.start.row(), range.end.row());
        let mut text = String::new();
        for row in start_row..end_row {
            text.push_str(self.parsed.line(row));
        }
        let last = self.parsed.line_text(end_row);
        let tail = last.get(..range.end.column()).ok_or_else(|| {
            AnalyzerError::internal(format!(
                "column {} is past the end of line {}",
                range.end.character, range.end.line
            ))
        })?;
        text.push_str(tail);
        Ok(text)
    }
}

impl CodeAnalyzer for SymbolTableAnalyzer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn get_context(&self, cursor: DocumentPosition) -> AnalyzerResult<CodeEntity> {
        let index = self.innermost(cursor)?;
        tracing::debug!(%cursor, scope = index, backend = NAME, "resolved context");
        self.entity_for(index)
    }

    fn get_function(&self, cursor: DocumentPosition) -> AnalyzerResult<Option<CodeEntity>> {
        self.enclosing(cursor, EntityKind::Function)?
            .map(|index| self.entity_for(index))
            .transpose()
    }

    fn get_class(&self, cursor: DocumentPosition) -> AnalyzerResult<Option<CodeEntity>> {
        self.enclosing(cursor, EntityKind::Class)?
            .map(|index| self.entity_for(index))
            .transpose()
    }

    fn get_module(&self, _cursor: DocumentPosition) -> AnalyzerResult<CodeEntity> {
        self.entity_for(MODULE_SCOPE)
    }
}

struct ScopeTableBuilder<'p> {
    parsed: &'p ParsedSource,
    scopes: Vec<Scope>,
}

impl<'p> ScopeTableBuilder<'p> {
    fn new(parsed: &'p ParsedSource) -> Self {
        Self {
            parsed,
            scopes: Vec::new(),
        }
    }

    fn build(mut self) -> AnalyzerResult<Vec<Scope>> {
        let root = self.parsed.root();
        self.scopes.push(Scope {
            kind: EntityKind::Module,
            name: String::new(),
            parent: None,
            children: Vec::new(),
            range: DocumentRange::from_points(root.start_position(), root.end_position()),
            signature_end: None,
            docstring: docstring_range(self.parsed, root),
        });

        let mut cursor = root.walk();
        self.collect(&mut cursor, MODULE_SCOPE)?;
        Ok(self.scopes)
    }

    fn collect(&mut self, cursor: &mut TreeCursor<'p>, parent: usize) -> AnalyzerResult<()> {
        if !cursor.goto_first_child() {
            return Ok(());
        }
        loop {
            let node = cursor.node();
            let scope = match definition_kind(node) {
                Some(EntityKind::Class | EntityKind::Function) => self.push(node, parent)?,
                _ => parent,
            };
            self.collect(cursor, scope)?;
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
        Ok(())
    }

    fn push(&mut self, node: Node<'p>, parent: usize) -> AnalyzerResult<usize> {
        let kind = definition_kind(node)
            .ok_or_else(|| AnalyzerError::internal(format!("{} is not a scope", node.kind())))?;
        let index = self.scopes.len();
        self.scopes.push(Scope {
            kind,
            name: definition_name(self.parsed, node)?.to_string(),
            parent: Some(parent),
            children: Vec::new(),
            range: DocumentRange::from_points(node.start_position(), logical_end(node)),
            signature_end: Some(self.signature_end(node)?),
            docstring: docstring_range(self.parsed, node),
        });
        self.scopes[parent].children.push(index);
        Ok(index)
    }

    /// Position after the `:` token closing the header, or the end of
    /// its line when a comment follows the colon.
    fn signature_end(&self, node: Node<'p>) -> AnalyzerResult<DocumentPosition> {
        let mut cursor = node.walk();
        let colon = node
            .children(&mut cursor)
            .filter(|child| child.kind() == ":")
            .last()
            .ok_or_else(|| {
                AnalyzerError::internal(format!(
                    "{} at {} has no header colon",
                    node.kind(),
                    DocumentPosition::from_point(node.start_position())
                ))
            })?;

        let mut end = DocumentPosition::from_point(colon.end_position());
        let source = self.parsed.source().as_bytes();
        let next = source[colon.end_byte()..]
            .iter()
            .position(|b| !matches!(b, b' ' | b'\t' | b'\x0c'))
            .map(|offset| colon.end_byte() + offset);

        if let Some(byte) = next.filter(|&b| !matches!(source[b], b'\n' | b'\r')) {
            let is_comment = self
                .parsed
                .root()
                .descendant_for_byte_range(byte, byte + 1)
                .is_some_and(|found| found.kind() == "comment");
            if is_comment {
                end.character = self.parsed.line_text(end.row()).len() as u32;
            }
        }
        Ok(end)
    }
}
